//! Page sources the crawler reads list pages from.
//!
//! The crawl loop only talks to the [`PageSource`] trait. A source owns the
//! "current page": it loads a URL, reports whether the list is there, hands
//! out the list's items and moves on to the next page.
//!
//! # Sources
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | Sina rolling news | [`sina`] | HTTP fetch + HTML selectors |

use crate::error::{ItemExtractionError, NavigationError, NotReadyError, PaginationError};
use crate::models::CandidateItem;
use std::time::Duration;

pub mod sina;

/// A stateful view onto one list page at a time.
///
/// Every fallible call receives the run's step timeout. Implementations should
/// honor it, but the crawler also bounds each call on its side.
pub trait PageSource {
    /// Handle to one list element, extracted later by
    /// [`extract_candidate`](Self::extract_candidate).
    type Item;

    /// Load `url` and wait until it has finished loading.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), NavigationError>;

    /// Wait for the list container on the current page.
    async fn wait_for_list_ready(&mut self, timeout: Duration) -> Result<(), NotReadyError>;

    /// All list elements on the current page, in page order. May be empty.
    async fn candidate_elements(&self) -> Vec<Self::Item>;

    /// Read title, summary and link out of one list element.
    async fn extract_candidate(
        &self,
        item: Self::Item,
        timeout: Duration,
    ) -> Result<CandidateItem, ItemExtractionError>;

    /// Whether the current page offers a link to the next page.
    async fn has_next_page(&self) -> bool;

    /// Follow the next-page link and wait for the new page to load.
    async fn go_to_next_page(&mut self, timeout: Duration) -> Result<(), PaginationError>;
}
