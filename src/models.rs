//! Data models for list items and the records persisted from them.
//!
//! - [`CandidateItem`]: a raw item read off a list page, before filtering
//! - [`NewsRecord`]: a filtered, page-tagged match written to disk
//! - [`ResultBatch`]: every match from one page, handed to the store as a unit

use serde::{Deserialize, Serialize};

/// A raw news item as extracted from a list page.
///
/// Candidates are never persisted directly; they either become a
/// [`NewsRecord`] or are dropped by the keyword filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    /// The headline text, whitespace-trimmed.
    pub title: String,
    /// The teaser paragraph, empty when the item has none.
    pub summary: String,
    /// The absolute article link.
    pub url: String,
}

/// A news item that passed keyword filtering, tagged with its list page.
///
/// Invariants: `title` and `url` are non-empty and `page >= 1`. Use
/// [`NewsRecord::from_candidate`] to build one from page data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewsRecord {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub page: u32,
}

impl NewsRecord {
    /// Tag a candidate with its page number.
    ///
    /// Returns `None` when the candidate would break a record invariant
    /// (empty title, empty url, or page 0).
    pub fn from_candidate(candidate: CandidateItem, page: u32) -> Option<Self> {
        if candidate.title.is_empty() || candidate.url.is_empty() || page == 0 {
            return None;
        }
        Some(Self {
            title: candidate.title,
            summary: candidate.summary,
            url: candidate.url,
            page,
        })
    }
}

/// All matched records from one list page.
///
/// The controller builds a batch per page and moves it into the result
/// store; nothing keeps a copy after the hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultBatch {
    /// The 1-based page the records came from.
    pub page: u32,
    /// Matches in page order.
    pub records: Vec<NewsRecord>,
}

impl ResultBatch {
    pub fn new(page: u32) -> Self {
        Self {
            page,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
