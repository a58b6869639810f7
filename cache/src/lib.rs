//! Local persistent cache for the notification coordinator.
//!
//! The coordinator keeps two string-keyed entries on the client: the
//! serialized preference set and the delivery cursor. Both must be readable
//! and writable without a network, and an absent entry means "unset" rather
//! than an error.
//!
//! # Backends
//!
//! - [`MemoryCache`]: process-local, for tests and ephemeral sessions
//! - [`SqliteCache`]: SQLite-backed, one row per key
//! - [`JsonFileCache`]: a versioned JSON document written atomically
//!
//! # Example
//!
//! ```ignore
//! use callsheet_cache::{LocalCache, SqliteCache, CURSOR_KEY};
//!
//! #[tokio::main]
//! async fn main() -> callsheet_cache::Result<()> {
//!     let cache = SqliteCache::open_default()?;
//!     cache.set(CURSOR_KEY, "1042").await?;
//!     assert_eq!(cache.get(CURSOR_KEY).await?.as_deref(), Some("1042"));
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod file;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

pub use error::{CacheError, Result};
pub use file::JsonFileCache;
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

/// Key holding the serialized preference set.
pub const PREFERENCES_KEY: &str = "notifications.preferences";

/// Key holding the delivery cursor identifier.
pub const CURSOR_KEY: &str = "notifications.last_seen_id";

/// String-keyed durable storage.
///
/// Implementations make each `set`/`remove` atomic; callers never need a lock
/// of their own.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Read a value; `Ok(None)` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
