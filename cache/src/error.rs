//! Cache error types with categorical error codes.

use thiserror::Error;

/// Cache-specific errors with categorical codes.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Database error (CACHE001)
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error (CACHE002)
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error (CACHE003)
    #[error("IO error: {0}")]
    Io(String),

    /// Invalid input (CACHE004)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unsupported document version (CACHE005)
    #[error("Unsupported cache version {found} (expected {expected})")]
    Version {
        /// Version found on disk
        found: u32,
        /// Version this build understands
        expected: u32,
    },

    /// Backend unavailable (CACHE006)
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    /// Returns the categorical error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "CACHE001",
            Self::Serialization(_) => "CACHE002",
            Self::Io(_) => "CACHE003",
            Self::InvalidInput(_) => "CACHE004",
            Self::Version { .. } => "CACHE005",
            Self::Unavailable(_) => "CACHE006",
        }
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
