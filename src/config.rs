//! Run configuration.
//!
//! Settings come from three layers, highest priority first: command-line
//! flags, an optional YAML file passed with `--config`, and built-in defaults.
//!
//! ```yaml
//! start_url: https://news.sina.com.cn/roll
//! output_dir: output
//! timeout_secs: 30
//! max_pages: 5
//! selectors:
//!   list: .news-list
//!   item: .news-list li
//!   title: a
//!   summary: p
//!   next: a.next
//! ```

use crate::cli::Cli;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

pub const DEFAULT_START_URL: &str = "https://news.sina.com.cn/roll";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_MAX_PAGES: u32 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("sina_news_crawler/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid CSS selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// CSS selectors describing the list page markup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Container that must be present before items are read.
    pub list: String,
    /// One match per news item.
    pub item: String,
    /// Headline link inside an item; its text is the title, its href the url.
    pub title: String,
    /// Teaser paragraph inside an item.
    pub summary: String,
    /// Next-page link.
    pub next: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            list: ".news-list".to_string(),
            item: ".news-list li".to_string(),
            title: "a".to_string(),
            summary: "p".to_string(),
            next: "a.next".to_string(),
        }
    }
}

/// Contents of the optional YAML config file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub start_url: Option<String>,
    pub output_dir: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_pages: Option<u32>,
    pub user_agent: Option<String>,
    pub selectors: SelectorConfig,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Literal substrings; empty keeps every item.
    pub keywords: Vec<String>,
    pub max_pages: u32,
    pub start_url: String,
    pub output_dir: PathBuf,
    /// Upper bound for every single navigation, wait, extraction and page turn.
    pub timeout: Duration,
    pub user_agent: String,
    pub selectors: SelectorConfig,
}

impl CrawlConfig {
    /// Merge CLI flags over the file config over the defaults.
    pub fn resolve(cli: Cli, file: Option<FileConfig>) -> Self {
        let file = file.unwrap_or_default();
        Self {
            keywords: cli.keywords,
            max_pages: cli
                .max_pages
                .or(file.max_pages)
                .unwrap_or(DEFAULT_MAX_PAGES),
            start_url: cli
                .start_url
                .or(file.start_url)
                .unwrap_or_else(|| DEFAULT_START_URL.to_string()),
            output_dir: PathBuf::from(
                cli.output_dir
                    .or(file.output_dir)
                    .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            ),
            timeout: Duration::from_secs(
                cli.timeout_secs
                    .or(file.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            user_agent: file
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            selectors: file.selectors,
        }
    }
}

/// Load a YAML config file.
#[instrument(level = "info", skip_all)]
pub fn load_file_config(path: impl AsRef<Path>) -> Result<FileConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: FileConfig = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), ?config, "Loaded config file");
    Ok(config)
}
