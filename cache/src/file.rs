//! JSON file cache backend with atomic writes
//!
//! All entries live in one versioned JSON document. Writes are crash-safe via
//! write-to-temp + fsync + rename. Reads validate the version; a corrupted or
//! foreign file surfaces an error so the coordinator can fall back to defaults,
//! and the next successful write replaces it with a clean document.

use crate::error::{CacheError, Result};
use crate::LocalCache;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Cache document format version
pub const CACHE_VERSION: u32 = 1;

/// On-disk document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheDocument {
    /// Format version
    pub version: u32,
    /// RFC3339 timestamp of the last write
    pub timestamp: String,
    /// Stored entries
    pub entries: BTreeMap<String, String>,
}

impl CacheDocument {
    /// Create an empty document
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            timestamp: current_timestamp(),
            entries: BTreeMap::new(),
        }
    }
}

/// File-backed cache. The document is read lazily on first access and kept
/// in memory afterwards.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
    entries: Arc<Mutex<Option<BTreeMap<String, String>>>>,
}

impl JsonFileCache {
    /// Creates a cache stored at `path`. Nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Arc::new(Mutex::new(None)),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: BTreeMap<String, String>) -> Result<()> {
        let path = self.path.clone();
        let doc = CacheDocument {
            version: CACHE_VERSION,
            timestamp: current_timestamp(),
            entries,
        };
        tokio::task::spawn_blocking(move || write_document_atomic(&path, &doc))
            .await
            .map_err(|e| CacheError::Io(format!("Task join error: {e}")))?
    }
}

#[async_trait]
impl LocalCache for JsonFileCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(read_entries(&self.path)?);
        }
        Ok(guard.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.entries.lock().await;
        let mut entries = match guard.take() {
            Some(entries) => entries,
            None => read_entries(&self.path).unwrap_or_else(|e| {
                warn!("Discarding unreadable cache file {}: {}", self.path.display(), e);
                BTreeMap::new()
            }),
        };
        entries.insert(key.to_string(), value.to_string());
        let result = self.persist(entries.clone()).await;
        *guard = Some(entries);
        result
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.entries.lock().await;
        let mut entries = match guard.take() {
            Some(entries) => entries,
            None => read_entries(&self.path).unwrap_or_default(),
        };
        let existed = entries.remove(key).is_some();
        let result = if existed {
            self.persist(entries.clone()).await
        } else {
            Ok(())
        };
        *guard = Some(entries);
        result
    }
}

/// Reads the entries from disk; a missing file is an empty cache.
fn read_entries(path: &Path) -> Result<BTreeMap<String, String>> {
    match load_document(path) {
        Ok(doc) => Ok(doc.entries),
        Err(CacheError::Io(msg)) if !path.exists() => {
            debug!("Cache file {} absent ({}), starting empty", path.display(), msg);
            Ok(BTreeMap::new())
        }
        Err(e) => Err(e),
    }
}

/// Load a cache document from file.
///
/// # Errors
///
/// Returns an error for I/O or parse failures and for unknown versions.
pub fn load_document(path: impl AsRef<Path>) -> Result<CacheDocument> {
    let path = path.as_ref();
    let buf = fs::read_to_string(path)
        .map_err(|e| CacheError::Io(format!("Failed to read cache {}: {}", path.display(), e)))?;

    let doc: CacheDocument = serde_json::from_str(&buf)?;

    if doc.version != CACHE_VERSION {
        return Err(CacheError::Version {
            found: doc.version,
            expected: CACHE_VERSION,
        });
    }

    Ok(doc)
}

/// Atomically write a cache document to file.
///
/// Steps:
/// - Ensure the parent directory exists
/// - Write JSON to a temp file in the same directory
/// - `flush` + `sync_all` on the temp file
/// - `rename` temp file over the destination
/// - Best-effort fsync of the directory to persist the rename
///
/// # Errors
///
/// Returns an error if any filesystem step fails.
pub fn write_document_atomic(path: impl AsRef<Path>, doc: &CacheDocument) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                CacheError::Io(format!("Failed to create cache dir {}: {}", parent.display(), e))
            })?;
        }
    }

    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(doc)?;

    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| {
                CacheError::Io(format!("Failed to open temp cache {}: {}", tmp_path.display(), e))
            })?;
        f.write_all(&json).map_err(|e| {
            CacheError::Io(format!("Failed to write temp cache {}: {}", tmp_path.display(), e))
        })?;
        f.flush().ok();
        let _ = f.sync_all();
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        CacheError::Io(format!(
            "Failed to replace cache {} with {}: {}",
            path.display(),
            tmp_path.display(),
            e
        ))
    })?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("cache.json"));
        assert_eq!(cache.get("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let cache = JsonFileCache::new(&path);
        cache.set("a", "1").await.unwrap();
        cache.set("b", "2").await.unwrap();
        cache.remove("a").await.unwrap();

        let reopened = JsonFileCache::new(&path);
        assert_eq!(reopened.get("a").await.unwrap(), None);
        assert_eq!(reopened.get("b").await.unwrap().as_deref(), Some("2"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupted_file_is_reported_then_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, b"{ invalid json").unwrap();

        let cache = JsonFileCache::new(&path);
        let err = cache.get("a").await.unwrap_err();
        assert!(err.to_string().contains("Serialization error"));

        let writer = JsonFileCache::new(&path);
        writer.set("a", "1").await.unwrap();
        let doc = load_document(&path).unwrap();
        assert_eq!(doc.entries.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut doc = CacheDocument::empty();
        doc.version = 99;
        write_document_atomic(&path, &doc).unwrap();

        match load_document(&path).unwrap_err() {
            CacheError::Version { found, expected } => {
                assert_eq!(found, 99);
                assert_eq!(expected, CACHE_VERSION);
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }
}
