//! Incremental JSON persistence for matched records.
//!
//! A run writes a single document, `sina_news_<YYYYMMDD_HHMMSS>.json`, whose
//! name is fixed when the [`ResultStore`] is built. The file is created on the
//! first non-empty batch and grows after every later page.
//!
//! # On-disk layout
//!
//! Every append splices the batch's records directly in front of the closing
//! bracket, so between appends the file is always a flat, parseable array:
//!
//! ```text
//! [
//!   { ...page 1 record... },
//!   { ...page 1 record... },
//!   { ...page 3 record... }
//! ]
//! ```
//!
//! [`ResultStore::finalize`] rewrites the document once at the end of the run.
//! It also accepts the older layout where each batch was nested as its own
//! sub-array, and a dangling `,` before the closing bracket, and flattens both.

use crate::error::PersistenceError;
use crate::models::{NewsRecord, ResultBatch};
use chrono::{DateTime, Local};
use serde_json::Value;
use std::borrow::Cow;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

/// File name for a run that started at `started_at`.
pub fn document_file_name(started_at: &DateTime<Local>) -> String {
    format!("sina_news_{}.json", started_at.format("%Y%m%d_%H%M%S"))
}

/// Appends page batches to one JSON array on disk.
///
/// Appends are sequenced by the caller; the store never touches the file
/// concurrently with itself.
#[derive(Debug)]
pub struct ResultStore {
    output_dir: PathBuf,
    path: PathBuf,
    created: bool,
    records_written: usize,
}

impl ResultStore {
    /// Build a store writing under `output_dir`. Nothing touches the disk
    /// until the first non-empty [`append_batch`](Self::append_batch).
    pub fn new(output_dir: impl Into<PathBuf>, started_at: DateTime<Local>) -> Self {
        let output_dir = output_dir.into();
        let path = output_dir.join(document_file_name(&started_at));
        Self {
            output_dir,
            path,
            created: false,
            records_written: 0,
        }
    }

    /// Path of this run's document, whether or not it exists yet.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` once a batch has been written.
    pub fn has_document(&self) -> bool {
        self.created
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Persist one page's matches.
    ///
    /// An empty batch is a no-op: no file is created and an existing file is
    /// left untouched. Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Any I/O or serialization failure, or an existing document without a
    /// terminal `]`, is returned as a [`PersistenceError`]. The document
    /// should be treated as unreliable after that.
    #[instrument(level = "info", skip_all, fields(page = batch.page, count = batch.len()))]
    pub async fn append_batch(&mut self, batch: ResultBatch) -> Result<usize, PersistenceError> {
        if batch.is_empty() {
            debug!("Empty batch; nothing to persist");
            return Ok(0);
        }

        let body = records_body(&batch.records)?;
        if self.created {
            self.splice(&body).await?;
        } else {
            self.create(&body).await?;
        }

        self.records_written += batch.len();
        info!(
            path = %self.path.display(),
            total = self.records_written,
            "Saved batch"
        );
        Ok(batch.len())
    }

    async fn create(&mut self, body: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| PersistenceError::io(&self.output_dir, e))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        let document = format!("[\n{body}\n]");
        file.write_all(document.as_bytes())
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        file.sync_data()
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;

        self.created = true;
        info!(path = %self.path.display(), "Created output document");
        Ok(())
    }

    async fn splice(&self, body: &str) -> Result<(), PersistenceError> {
        let io = |e| PersistenceError::io(&self.path, e);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .await
            .map_err(io)?;
        let mut content = String::new();
        file.read_to_string(&mut content).await.map_err(io)?;

        let close = content
            .rfind(']')
            .ok_or_else(|| PersistenceError::corrupt(&self.path, "missing closing bracket"))?;
        if !content[close + 1..].trim().is_empty() {
            return Err(PersistenceError::corrupt(
                &self.path,
                "unexpected data after closing bracket",
            ));
        }
        let head = content[..close].trim_end();
        let separator = if head.ends_with('[') { "\n" } else { ",\n" };
        let keep = head.len() as u64;

        file.set_len(keep).await.map_err(io)?;
        file.seek(SeekFrom::Start(keep)).await.map_err(io)?;
        let tail = format!("{separator}{body}\n]");
        file.write_all(tail.as_bytes()).await.map_err(io)?;
        file.flush().await.map_err(io)?;
        file.sync_data().await.map_err(io)?;
        Ok(())
    }

    /// Rewrite the document as one flat, pretty-printed array.
    ///
    /// Returns `Ok(None)` without touching anything when this store never
    /// wrote a document or the document is empty, otherwise the number of records in the
    /// final file. The rewrite goes through a sibling temp file and a rename.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn finalize(&self) -> Result<Option<usize>, PersistenceError> {
        if !self.has_document() {
            info!("No output document was written; nothing to finalize");
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        if content.trim().is_empty() {
            warn!("Output document is empty; leaving it as is");
            return Ok(None);
        }

        let records =
            parse_document(&content).map_err(|reason| PersistenceError::corrupt(&self.path, reason))?;
        let json = serde_json::to_string_pretty(&records)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .map_err(|e| PersistenceError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;

        info!(count = records.len(), "Finalized output document");
        Ok(Some(records.len()))
    }
}

/// Serialize records as array elements, one indented object per record.
fn records_body(records: &[NewsRecord]) -> Result<String, serde_json::Error> {
    let mut parts = Vec::with_capacity(records.len());
    for record in records {
        let pretty = serde_json::to_string_pretty(record)?;
        let indented = pretty
            .lines()
            .map(|line| format!("  {line}"))
            .collect::<Vec<_>>()
            .join("\n");
        parts.push(indented);
    }
    Ok(parts.join(",\n"))
}

/// Drop a `,` left directly in front of the closing bracket.
fn strip_trailing_separator(content: &str) -> Cow<'_, str> {
    if let Some(body) = content.trim_end().strip_suffix(']') {
        if let Some(without) = body.trim_end().strip_suffix(',') {
            return Cow::Owned(format!("{without}\n]"));
        }
    }
    Cow::Borrowed(content)
}

/// Parse a document into a flat record list, un-nesting per-batch sub-arrays.
fn parse_document(content: &str) -> Result<Vec<NewsRecord>, String> {
    let cleaned = strip_trailing_separator(content);
    let value: Value = serde_json::from_str(&cleaned).map_err(|e| e.to_string())?;
    let Value::Array(items) = value else {
        return Err("top-level value is not an array".to_string());
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(nested) => {
                for inner in nested {
                    records.push(parse_record(inner)?);
                }
            }
            other => records.push(parse_record(other)?),
        }
    }
    Ok(records)
}

/// Decode one array element and check the record invariants.
fn parse_record(value: Value) -> Result<NewsRecord, String> {
    let record: NewsRecord = serde_json::from_value(value).map_err(|e| e.to_string())?;
    if record.title.is_empty() {
        return Err(format!("record for {} has an empty title", record.url));
    }
    if record.url.is_empty() {
        return Err(format!("record `{}` has an empty url", record.title));
    }
    if record.page == 0 {
        return Err(format!("record `{}` has page 0", record.title));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static SCRATCH: AtomicUsize = AtomicUsize::new(0);

    fn scratch_dir() -> PathBuf {
        let n = SCRATCH.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "sina_news_store_{}_{}",
            std::process::id(),
            n
        ))
    }

    fn started_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn record(title: &str, page: u32) -> NewsRecord {
        NewsRecord {
            title: title.to_string(),
            summary: format!("{title} summary"),
            url: format!("https://news.sina.com.cn/{title}"),
            page,
        }
    }

    fn batch(page: u32, titles: &[&str]) -> ResultBatch {
        ResultBatch {
            page,
            records: titles.iter().map(|t| record(t, page)).collect(),
        }
    }

    async fn read_records(path: &Path) -> Vec<NewsRecord> {
        let content = fs::read_to_string(path).await.unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[test]
    fn test_document_file_name() {
        assert_eq!(
            document_file_name(&started_at()),
            "sina_news_20240309_140507.json"
        );
    }

    #[tokio::test]
    async fn test_single_batch_then_finalize() {
        let dir = scratch_dir();
        let mut store = ResultStore::new(&dir, started_at());

        let written = store.append_batch(batch(1, &["a", "b", "c"])).await.unwrap();
        assert_eq!(written, 3);
        assert_eq!(store.finalize().await.unwrap(), Some(3));

        let records = read_records(store.path()).await;
        assert_eq!(records, batch(1, &["a", "b", "c"]).records);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_many_batches_keep_order() {
        let dir = scratch_dir();
        let mut store = ResultStore::new(&dir, started_at());

        store.append_batch(batch(1, &["a", "b"])).await.unwrap();
        store.append_batch(batch(2, &[])).await.unwrap();
        store.append_batch(batch(3, &["c"])).await.unwrap();
        store.append_batch(batch(4, &["d", "e"])).await.unwrap();

        // Flat and parseable before finalize.
        let before = read_records(store.path()).await;
        assert_eq!(before.len(), 5);

        assert_eq!(store.finalize().await.unwrap(), Some(5));
        let titles: Vec<_> = read_records(store.path())
            .await
            .into_iter()
            .map(|r| (r.title, r.page))
            .collect();
        assert_eq!(
            titles,
            vec![
                ("a".to_string(), 1),
                ("b".to_string(), 1),
                ("c".to_string(), 3),
                ("d".to_string(), 4),
                ("e".to_string(), 4),
            ]
        );
        assert_eq!(store.records_written(), 5);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_empty_batch_creates_nothing() {
        let dir = scratch_dir();
        let mut store = ResultStore::new(&dir, started_at());

        assert_eq!(store.append_batch(ResultBatch::new(1)).await.unwrap(), 0);
        assert!(!store.has_document());
        assert!(!store.path().exists());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_empty_batch_leaves_document_untouched() {
        let dir = scratch_dir();
        let mut store = ResultStore::new(&dir, started_at());
        store.append_batch(batch(1, &["a"])).await.unwrap();
        let before = fs::read(store.path()).await.unwrap();

        store.append_batch(ResultBatch::new(2)).await.unwrap();
        store.append_batch(ResultBatch::new(3)).await.unwrap();

        assert_eq!(fs::read(store.path()).await.unwrap(), before);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_finalize_without_document_is_noop() {
        let dir = scratch_dir();
        let store = ResultStore::new(&dir, started_at());
        assert_eq!(store.finalize().await.unwrap(), None);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_finalize_flattens_nested_batches() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let mut store = ResultStore::new(&dir, started_at());
        store.created = true;
        let legacy = format!(
            "[\n{},\n{},\n]",
            serde_json::to_string_pretty(&batch(1, &["a", "b"]).records).unwrap(),
            serde_json::to_string_pretty(&batch(2, &["c"]).records).unwrap(),
        );
        std::fs::write(store.path(), legacy).unwrap();

        assert_eq!(store.finalize().await.unwrap(), Some(3));
        let records = read_records(store.path()).await;
        assert_eq!(records[2], record("c", 2));
        assert!(!store.path().with_extension("json.tmp").exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_append_to_truncated_document_fails() {
        let dir = scratch_dir();
        let mut store = ResultStore::new(&dir, started_at());
        store.append_batch(batch(1, &["a"])).await.unwrap();
        std::fs::write(store.path(), "[\n  {\"title\": \"a\"").unwrap();

        let err = store.append_batch(batch(2, &["b"])).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { .. }));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_strip_trailing_separator() {
        assert_eq!(strip_trailing_separator("[\n{},\n]"), "[\n{}\n]");
        assert_eq!(strip_trailing_separator("[\n{}\n]"), "[\n{}\n]");
    }

    #[test]
    fn test_parse_document_rejects_objects() {
        assert!(parse_document("{\"title\": \"a\"}").is_err());
        assert!(parse_document("[{\"title\": \"a\"}]").is_err());
    }

    #[test]
    fn test_parse_document_checks_record_invariants() {
        let valid = r#"[{"title": "a", "summary": "", "url": "https://x", "page": 1}]"#;
        assert_eq!(parse_document(valid).unwrap().len(), 1);

        let empty_title = r#"[{"title": "", "summary": "", "url": "https://x", "page": 1}]"#;
        let empty_url = r#"[{"title": "a", "summary": "", "url": "", "page": 1}]"#;
        let page_zero = r#"[[{"title": "a", "summary": "", "url": "https://x", "page": 0}]]"#;
        assert!(parse_document(empty_title).is_err());
        assert!(parse_document(empty_url).is_err());
        assert!(parse_document(page_zero).is_err());
    }

    #[tokio::test]
    async fn test_finalize_ignores_file_from_another_run() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let store = ResultStore::new(&dir, started_at());

        let other = serde_json::to_string(&batch(1, &["other"]).records).unwrap();
        std::fs::write(store.path(), &other).unwrap();
        assert_eq!(store.finalize().await.unwrap(), None);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), other);

        std::fs::write(store.path(), "not json at all").unwrap();
        assert_eq!(store.finalize().await.unwrap(), None);
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "not json at all"
        );
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_first_append_does_not_clobber_existing_file() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let mut store = ResultStore::new(&dir, started_at());
        let other = serde_json::to_string(&batch(1, &["other"]).records).unwrap();
        std::fs::write(store.path(), &other).unwrap();

        let err = store.append_batch(batch(1, &["mine"])).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
        assert!(!store.has_document());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), other);
        let _ = std::fs::remove_dir_all(dir);
    }
}
