//! Daemon error types

use callsheet_cache::CacheError;
use callsheet_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl DaemonError {
    /// Stable error code for log correlation
    pub fn code(&self) -> &'static str {
        match self {
            DaemonError::ServerError(_) => "DAEMON001",
            DaemonError::ConnectionError(_) => "DAEMON002",
            DaemonError::IoError(_) => "DAEMON003",
            DaemonError::SerializationError(_) => "DAEMON004",
            DaemonError::Notification(_) => "DAEMON005",
            DaemonError::Core(_) => "DAEMON006",
            DaemonError::Cache(_) => "DAEMON007",
        }
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
