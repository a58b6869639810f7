//! SQLite cache backend.

#![allow(clippy::significant_drop_tightening)] // Lock guards held across DB operations

use crate::error::{CacheError, Result};
use crate::LocalCache;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// SQL schema for the cache database.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
";

/// SQLite-backed key/value cache.
#[derive(Clone)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCache").finish()
    }
}

impl SqliteCache {
    /// Opens or creates the cache database at the default location.
    ///
    /// Default location: `$HOME/.callsheet/cache.db`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No home directory can be determined
    /// - The database directory cannot be created
    /// - The database cannot be opened or initialized
    pub fn open_default() -> Result<Self> {
        let base = dirs_next::home_dir().ok_or_else(|| {
            CacheError::InvalidInput(
                "home directory not found; use explicit cache path".into(),
            )
        })?;
        let dir = base.join(".callsheet");
        std::fs::create_dir_all(&dir)?;
        Self::open(&dir.join("cache.db"))
    }

    /// Default database path, if a home directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".callsheet").join("cache.db"))
    }

    /// Opens or creates the cache database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| CacheError::Database(format!("Failed to set WAL mode: {e}")))?;
        conn.execute_batch(SCHEMA)?;

        info!("Cache database opened at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl LocalCache for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let value = conn
                .query_row(
                    "SELECT value FROM cache_entries WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
        .map_err(|e| CacheError::Database(format!("Task join error: {e}")))?
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO cache_entries (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value, Utc::now().timestamp()],
            )?;
            debug!("Cache entry {} written", key);
            Ok(())
        })
        .await
        .map_err(|e| CacheError::Database(format!("Task join error: {e}")))?
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let deleted = conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
            if deleted == 0 {
                debug!("Cache entry {} was not present", key);
            }
            Ok(())
        })
        .await
        .map_err(|e| CacheError::Database(format!("Task join error: {e}")))?
    }
}
