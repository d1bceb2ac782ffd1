//! The paged crawl loop.
//!
//! [`Crawler::run`] walks list pages one at a time:
//!
//! ```text
//! Init ──▶ Fetching ──▶ Extracting ──▶ Paginating ──┐
//!   │          ▲            │                         │
//!   │          └────────────┼─────────────────────────┘ next page loaded
//!   ▼                       ▼
//! failed                  done (page limit, list missing, no next link,
//! (start page             or the page turn failed)
//!  did not load)
//! ```
//!
//! Only a failure to load the start page, or a failure to write results,
//! ends the run with an error. Everything later stops the crawl early and
//! keeps the pages already saved. A list item that cannot be read is logged
//! and skipped without affecting the rest of its page.

use crate::config::CrawlConfig;
use crate::error::{
    CrawlError, ItemExtractionError, NavigationError, NotReadyError, PaginationError,
};
use crate::models::{CandidateItem, NewsRecord, ResultBatch};
use crate::outputs::json::ResultStore;
use crate::scrapers::PageSource;
use crate::utils::truncate_for_log;
use futures::future::join_all;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// `true` if `candidate` should be kept for `keywords`.
///
/// An empty keyword list keeps everything. Otherwise some keyword must occur
/// verbatim (case-sensitive) in the title or in the summary.
pub fn matches(candidate: &CandidateItem, keywords: &[String]) -> bool {
    keywords.is_empty()
        || keywords.iter().any(|keyword| {
            candidate.title.contains(keyword.as_str())
                || candidate.summary.contains(keyword.as_str())
        })
}

/// Why the crawl stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `max_pages` was 0; nothing was fetched.
    NoPagesRequested,
    /// The configured page limit was reached.
    PageLimit,
    /// The list container did not appear on the current page.
    ListNotReady,
    /// The current page has no next-page link.
    NoNextPage,
    /// Following the next-page link failed or timed out.
    PaginationFailed,
}

/// Summary of a finished crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub pages_processed: u32,
    pub records_written: usize,
    pub stop_reason: StopReason,
    /// The finalized document, if any batch was written.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrawlState {
    Init,
    Fetching,
    Extracting,
    Paginating,
}

/// Drives a [`PageSource`] page by page and saves matches to a [`ResultStore`].
#[derive(Debug)]
pub struct Crawler<S> {
    source: S,
    store: ResultStore,
    keywords: Vec<String>,
    max_pages: u32,
    start_url: String,
    timeout: Duration,
}

impl<S: PageSource> Crawler<S> {
    pub fn new(source: S, store: ResultStore, config: &CrawlConfig) -> Self {
        Self {
            source,
            store,
            keywords: config.keywords.clone(),
            max_pages: config.max_pages,
            start_url: config.start_url.clone(),
            timeout: config.timeout,
        }
    }

    /// Crawl until a stop condition, then finalize the output document.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Navigation`] if the start page does not load (no document
    /// is written), [`CrawlError::Persistence`] if saving a batch or
    /// finalizing the document fails.
    #[instrument(level = "info", skip_all, fields(start_url = %self.start_url, max_pages = self.max_pages))]
    pub async fn run(mut self) -> Result<CrawlReport, CrawlError> {
        let mut page: u32 = 1;
        let mut pages_processed: u32 = 0;
        let mut state = CrawlState::Init;

        let stop_reason = loop {
            state = match state {
                CrawlState::Init => {
                    if self.max_pages == 0 {
                        info!("max_pages is 0; nothing to crawl");
                        break StopReason::NoPagesRequested;
                    }
                    self.open_start_page().await?;
                    CrawlState::Fetching
                }
                CrawlState::Fetching => match self.wait_for_list(page).await {
                    Ok(()) => CrawlState::Extracting,
                    Err(e) => {
                        warn!(page, error = %e, "List did not load; stopping crawl");
                        break StopReason::ListNotReady;
                    }
                },
                CrawlState::Extracting => {
                    let batch = match self.extract_page(page).await {
                        Ok(batch) => batch,
                        Err(e) => {
                            warn!(page, error = %e, "Could not list items; stopping crawl");
                            break StopReason::ListNotReady;
                        }
                    };
                    pages_processed += 1;
                    if batch.is_empty() {
                        info!(page, "No matching news on this page");
                    } else {
                        info!(page, count = batch.len(), "Saving matches");
                    }
                    self.store.append_batch(batch).await?;
                    CrawlState::Paginating
                }
                CrawlState::Paginating => {
                    if page >= self.max_pages {
                        info!(page, "Reached page limit");
                        break StopReason::PageLimit;
                    }
                    match self.next_page_available().await {
                        Ok(true) => {}
                        Ok(false) => {
                            info!(page, "No next-page link; crawl finished");
                            break StopReason::NoNextPage;
                        }
                        Err(e) => {
                            warn!(page, error = %e, "Could not look for next page; stopping crawl");
                            break StopReason::PaginationFailed;
                        }
                    }
                    match self.turn_page().await {
                        Ok(()) => {
                            page += 1;
                            CrawlState::Fetching
                        }
                        Err(e) => {
                            warn!(page, error = %e, "Could not open next page; stopping crawl");
                            break StopReason::PaginationFailed;
                        }
                    }
                }
            };
        };

        let finalized = self.store.finalize().await?;
        let report = CrawlReport {
            pages_processed,
            records_written: self.store.records_written(),
            stop_reason,
            output: finalized.map(|_| self.store.path().to_path_buf()),
        };
        info!(
            pages = report.pages_processed,
            records = report.records_written,
            ?stop_reason,
            "Crawl finished"
        );
        Ok(report)
    }

    async fn open_start_page(&mut self) -> Result<(), NavigationError> {
        info!(url = %self.start_url, "Opening start page");
        match timeout(self.timeout, self.source.navigate(&self.start_url, self.timeout)).await {
            Ok(result) => result,
            Err(_) => Err(NavigationError::Timeout {
                url: self.start_url.clone(),
                timeout: self.timeout,
            }),
        }
    }

    async fn wait_for_list(&mut self, page: u32) -> Result<(), NotReadyError> {
        debug!(page, "Waiting for list");
        match timeout(self.timeout, self.source.wait_for_list_ready(self.timeout)).await {
            Ok(result) => result,
            Err(_) => Err(NotReadyError::Timeout {
                timeout: self.timeout,
            }),
        }
    }

    async fn next_page_available(&self) -> Result<bool, PaginationError> {
        timeout(self.timeout, self.source.has_next_page())
            .await
            .map_err(|_| PaginationError::Timeout {
                timeout: self.timeout,
            })
    }

    async fn turn_page(&mut self) -> Result<(), PaginationError> {
        match timeout(self.timeout, self.source.go_to_next_page(self.timeout)).await {
            Ok(result) => result,
            Err(_) => Err(PaginationError::Timeout {
                timeout: self.timeout,
            }),
        }
    }

    async fn extract_item(&self, item: S::Item) -> Result<CandidateItem, ItemExtractionError> {
        match timeout(self.timeout, self.source.extract_candidate(item, self.timeout)).await {
            Ok(result) => result,
            Err(_) => Err(ItemExtractionError::Timeout {
                timeout: self.timeout,
            }),
        }
    }

    /// Read every item of the current page concurrently and keep the matches.
    async fn extract_page(&self, page: u32) -> Result<ResultBatch, NotReadyError> {
        let items = timeout(self.timeout, self.source.candidate_elements())
            .await
            .map_err(|_| NotReadyError::Timeout {
                timeout: self.timeout,
            })?;
        info!(page, count = items.len(), "Found list items");

        let outcomes = join_all(items.into_iter().map(|item| self.extract_item(item))).await;

        let mut batch = ResultBatch::new(page);
        for (index, outcome) in outcomes.into_iter().enumerate() {
            let candidate = match outcome {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(page, index, error = %e, "Skipping unreadable list item");
                    continue;
                }
            };
            if !matches(&candidate, &self.keywords) {
                continue;
            }
            match NewsRecord::from_candidate(candidate, page) {
                Some(record) => {
                    info!(page, title = %truncate_for_log(&record.title, 60), "Matched news item");
                    batch.records.push(record);
                }
                None => debug!(page, index, "Matched item has no title or link; skipping"),
            }
        }
        Ok(batch)
    }
}
