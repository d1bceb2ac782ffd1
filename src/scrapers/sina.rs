//! Sina rolling-news list scraper.
//!
//! Fetches list pages over HTTP and reads them with CSS selectors. The page
//! body is kept as text and re-parsed on demand, so no parsed DOM is held
//! across an `.await`.
//!
//! # Markup
//!
//! With the default selectors an item looks like:
//!
//! ```html
//! <ul class="news-list">
//!   <li><a href="/c/2025-05-06/doc-1.shtml">Headline</a><p>Teaser</p></li>
//! </ul>
//! <a class="next" href="?page=2">下一页</a>
//! ```
//!
//! Relative links are resolved against the URL the page was served from.

use crate::config::{ConfigError, CrawlConfig, SelectorConfig};
use crate::error::{ItemExtractionError, NavigationError, NotReadyError, PaginationError};
use crate::models::CandidateItem;
use crate::scrapers::PageSource;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

/// Compiled form of [`SelectorConfig`].
#[derive(Debug, Clone)]
struct PageSelectors {
    list: Selector,
    list_raw: String,
    item: Selector,
    title: Selector,
    title_raw: String,
    summary: Selector,
    next: Selector,
}

impl PageSelectors {
    fn compile(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            list: parse_selector(&config.list)?,
            list_raw: config.list.clone(),
            item: parse_selector(&config.item)?,
            title: parse_selector(&config.title)?,
            title_raw: config.title.clone(),
            summary: parse_selector(&config.summary)?,
            next: parse_selector(&config.next)?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// A fetched page: the URL it was served from plus its raw body.
#[derive(Debug, Clone)]
struct LoadedPage {
    url: Url,
    body: String,
}

/// One `<li>` of the news list, detached from its page.
#[derive(Debug, Clone)]
pub struct ListItem {
    base: Url,
    html: String,
}

/// HTTP-backed [`PageSource`] for the Sina rolling news list.
#[derive(Debug)]
pub struct SinaRollPage {
    client: Client,
    selectors: PageSelectors,
    current: Option<LoadedPage>,
}

impl SinaRollPage {
    /// Build a source from the run configuration.
    ///
    /// # Errors
    ///
    /// Fails if a configured selector does not parse or the HTTP client
    /// cannot be built.
    pub fn new(config: &CrawlConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            selectors: PageSelectors::compile(&config.selectors)?,
            current: None,
        })
    }

    fn document(&self) -> Option<Html> {
        self.current
            .as_ref()
            .map(|page| Html::parse_document(&page.body))
    }

    fn next_href(&self) -> Option<String> {
        let document = self.document()?;
        document
            .select(&self.selectors.next)
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .find(|href| !href.is_empty() && !href.starts_with("javascript:"))
            .map(str::to_string)
    }

    fn list_items(&self) -> Vec<ListItem> {
        let (Some(page), Some(document)) = (self.current.as_ref(), self.document()) else {
            return Vec::new();
        };
        document
            .select(&self.selectors.item)
            .map(|element| ListItem {
                base: page.url.clone(),
                html: element.html(),
            })
            .collect()
    }

    fn read_item(&self, item: &ListItem) -> Result<CandidateItem, ItemExtractionError> {
        let fragment = Html::parse_fragment(&item.html);
        let link = fragment.select(&self.selectors.title).next().ok_or_else(|| {
            ItemExtractionError::MissingElement {
                selector: self.selectors.title_raw.clone(),
            }
        })?;
        let title = collapse_whitespace(link.text());
        let summary = fragment
            .select(&self.selectors.summary)
            .next()
            .map(|p| collapse_whitespace(p.text()))
            .unwrap_or_default();

        let href = link
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .ok_or(ItemExtractionError::MissingLink)?;
        let url = item
            .base
            .join(href)
            .map_err(|source| ItemExtractionError::InvalidLink {
                href: href.to_string(),
                source,
            })?;

        Ok(CandidateItem {
            title,
            summary,
            url: url.to_string(),
        })
    }

    #[cfg(test)]
    fn load_html(&mut self, url: &str, body: &str) {
        self.current = Some(LoadedPage {
            url: Url::parse(url).unwrap(),
            body: body.to_string(),
        });
    }
}

/// Join text nodes and collapse runs of whitespace into single spaces.
fn collapse_whitespace<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl PageSource for SinaRollPage {
    type Item = ListItem;

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), NavigationError> {
        let parsed = Url::parse(url).map_err(|source| NavigationError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let request_error = |source| NavigationError::Request {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(NavigationError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(request_error)?;
        info!(bytes = body.len(), final_url = %final_url, "Loaded page");
        self.current = Some(LoadedPage {
            url: final_url,
            body,
        });
        Ok(())
    }

    async fn wait_for_list_ready(&mut self, _timeout: Duration) -> Result<(), NotReadyError> {
        let document = self.document().ok_or(NotReadyError::NoPage)?;
        if document.select(&self.selectors.list).next().is_none() {
            return Err(NotReadyError::Missing {
                selector: self.selectors.list_raw.clone(),
            });
        }
        Ok(())
    }

    async fn candidate_elements(&self) -> Vec<ListItem> {
        let items = self.list_items();
        debug!(count = items.len(), "Collected list items");
        items
    }

    async fn extract_candidate(
        &self,
        item: ListItem,
        _timeout: Duration,
    ) -> Result<CandidateItem, ItemExtractionError> {
        self.read_item(&item)
    }

    async fn has_next_page(&self) -> bool {
        self.next_href().is_some()
    }

    async fn go_to_next_page(&mut self, timeout: Duration) -> Result<(), PaginationError> {
        let href = self.next_href().ok_or(PaginationError::NoNextLink)?;
        let base = self
            .current
            .as_ref()
            .map(|page| page.url.clone())
            .ok_or(PaginationError::NoNextLink)?;
        let next = base
            .join(&href)
            .map_err(|source| NavigationError::InvalidUrl {
                url: href.clone(),
                source,
            })?;
        debug!(%next, "Following next-page link");
        self.navigate(next.as_str(), timeout).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    const LIST_PAGE: &str = r#"
        <html><body>
          <ul class="news-list">
            <li><a href="/c/2025-05-06/doc-1.shtml">  Market   rally </a><p>Stocks rose</p></li>
            <li><a href="https://finance.sina.com.cn/doc-2.shtml">Weather</a></li>
            <li><span>no link here</span></li>
            <li><a>Headline without href</a><p>teaser</p></li>
          </ul>
          <a class="next" href="?page=2">下一页</a>
        </body></html>
    "#;

    fn source() -> SinaRollPage {
        let cli = Cli::parse_from(["sina_news_crawler", "--keywords", "x"]);
        let config = CrawlConfig::resolve(cli, None);
        SinaRollPage::new(&config).unwrap()
    }

    fn loaded() -> SinaRollPage {
        let mut source = source();
        source.load_html("https://news.sina.com.cn/roll/", LIST_PAGE);
        source
    }

    #[tokio::test]
    async fn test_list_ready() {
        let mut source = loaded();
        assert!(source.wait_for_list_ready(Duration::from_secs(1)).await.is_ok());

        source.load_html("https://news.sina.com.cn/roll/", "<html><body></body></html>");
        let err = source
            .wait_for_list_ready(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, NotReadyError::Missing { .. }));
    }

    #[tokio::test]
    async fn test_not_ready_before_navigation() {
        let mut source = source();
        let err = source
            .wait_for_list_ready(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, NotReadyError::NoPage));
        assert!(source.candidate_elements().await.is_empty());
    }

    #[tokio::test]
    async fn test_extract_candidates() {
        let source = loaded();
        let items = source.candidate_elements().await;
        assert_eq!(items.len(), 4);

        let timeout = Duration::from_secs(1);
        let mut results = Vec::new();
        for item in items {
            results.push(source.extract_candidate(item, timeout).await);
        }

        let first = results[0].as_ref().unwrap();
        assert_eq!(first.title, "Market rally");
        assert_eq!(first.summary, "Stocks rose");
        assert_eq!(first.url, "https://news.sina.com.cn/c/2025-05-06/doc-1.shtml");

        let second = results[1].as_ref().unwrap();
        assert_eq!(second.summary, "");
        assert_eq!(second.url, "https://finance.sina.com.cn/doc-2.shtml");

        assert!(matches!(
            results[2],
            Err(ItemExtractionError::MissingElement { .. })
        ));
        assert!(matches!(results[3], Err(ItemExtractionError::MissingLink)));
    }

    #[tokio::test]
    async fn test_next_page_link() {
        let mut source = loaded();
        assert!(source.has_next_page().await);
        assert_eq!(source.next_href().as_deref(), Some("?page=2"));

        source.load_html(
            "https://news.sina.com.cn/roll/",
            r#"<ul class="news-list"></ul><a class="next" href="javascript:void(0)">下一页</a>"#,
        );
        assert!(!source.has_next_page().await);
        let err = source
            .go_to_next_page(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PaginationError::NoNextLink));
    }

    #[test]
    fn test_invalid_selector() {
        let selectors = SelectorConfig {
            item: "li[".to_string(),
            ..SelectorConfig::default()
        };
        let err = PageSelectors::compile(&selectors).unwrap_err();
        assert!(matches!(err, ConfigError::Selector { .. }));
    }
}
