//! # Sina News Crawler
//!
//! Walks the Sina rolling news list page by page, keeps the items whose title
//! or summary contains one of the given keywords, and saves them to a JSON
//! file after every page.
//!
//! ## Usage
//!
//! ```sh
//! sina_news_crawler --keywords 股市 market --max_pages 3
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: load a list page through a [`scrapers::PageSource`]
//! 2. **Extracting**: read every list item concurrently and filter by keyword
//! 3. **Saving**: append the page's matches to `sina_news_<timestamp>.json`
//! 4. **Paginating**: follow the next-page link until a stop condition
//!
//! The output file is a valid JSON array after every page and is rewritten
//! once more, flat and pretty-printed, when the crawl ends.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod crawler;
mod error;
mod models;
mod outputs;
mod scrapers;
mod utils;

use cli::Cli;
use config::{load_file_config, CrawlConfig};
use crawler::Crawler;
use outputs::json::ResultStore;
use scrapers::sina::SinaRollPage;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("sina_news_crawler starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let file_config = match args.config.as_deref() {
        Some(path) => Some(load_file_config(path)?),
        None => None,
    };
    let config = CrawlConfig::resolve(args, file_config);
    info!(
        keywords = ?config.keywords,
        max_pages = config.max_pages,
        output_dir = %config.output_dir.display(),
        timeout_secs = config.timeout.as_secs(),
        "Resolved configuration"
    );

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let source = SinaRollPage::new(&config)?;
    let store = ResultStore::new(&config.output_dir, Local::now());
    let report = match Crawler::new(source, store, &config).run().await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Crawl aborted");
            return Err(e.into());
        }
    };

    match &report.output {
        Some(path) => info!(
            path = %path.display(),
            records = report.records_written,
            "Saved matching news"
        ),
        None => info!("No matching news found; nothing was written"),
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        pages = report.pages_processed,
        stop_reason = ?report.stop_reason,
        "Execution complete"
    );

    Ok(())
}
