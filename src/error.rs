//! Error types for the crawl and the result store.
//!
//! Only [`NavigationError`] (on the first page) and [`PersistenceError`] stop a
//! run with a failure. The rest end the crawl early or skip a single item.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The start page could not be loaded.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("loading {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

/// The list container never showed up on the current page.
#[derive(Debug, Error)]
pub enum NotReadyError {
    #[error("no page has been loaded")]
    NoPage,
    #[error("list container `{selector}` not found")]
    Missing { selector: String },
    #[error("list container not ready after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Moving to the next list page failed.
#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("no next-page link on the current page")]
    NoNextLink,
    #[error("next page could not be loaded: {0}")]
    Navigation(#[from] NavigationError),
    #[error("pagination timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// A single list item could not be read.
#[derive(Debug, Error)]
pub enum ItemExtractionError {
    #[error("item has no `{selector}` element")]
    MissingElement { selector: String },
    #[error("item link has no href")]
    MissingLink,
    #[error("item link `{href}` is not a valid url: {source}")]
    InvalidLink {
        href: String,
        #[source]
        source: url::ParseError,
    },
    #[error("item extraction timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// The output document could not be written or read back.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{path} is not a well-formed record array: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A failure that aborts the whole run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("initial navigation failed: {0}")]
    Navigation(#[from] NavigationError),
    #[error("writing results failed: {0}")]
    Persistence(#[from] PersistenceError),
}
