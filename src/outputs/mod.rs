//! Output generation for crawl results.
//!
//! # Submodules
//!
//! - [`json`]: Incrementally writes matched records to one JSON document per run
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── sina_news_20250506_081500.json
//! └── sina_news_20250506_203012.json
//! ```

pub mod json;
