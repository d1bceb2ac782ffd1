//! Command-line interface definitions.
//!
//! Flags override the optional YAML config file, which overrides the
//! built-in defaults (see [`crate::config`]).

use clap::Parser;

/// Command-line arguments for the crawler.
///
/// # Examples
///
/// ```sh
/// # Keep items mentioning either keyword, visit at most 3 pages
/// sina_news_crawler --keywords 股市 market --max_pages 3
///
/// # Keep everything on the first 5 pages
/// sina_news_crawler --keywords
///
/// # Custom output dir and config file
/// sina_news_crawler --keywords AI -o ./news -c crawler.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Keywords matched literally (case-sensitive) against titles and summaries.
    /// Give the flag with no values to keep every item
    #[arg(long, num_args = 0.., required = true)]
    pub keywords: Vec<String>,

    /// Maximum number of list pages to visit [default: 5]
    #[arg(long = "max_pages", visible_alias = "max-pages")]
    pub max_pages: Option<u32>,

    /// Output directory for the JSON results [default: output]
    #[arg(short, long, env = "SINA_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// Timeout in seconds for each navigation, wait and page turn [default: 30]
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// List page to start from [default: https://news.sina.com.cn/roll]
    #[arg(long)]
    pub start_url: Option<String>,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,
}
