//! Error types for remote notification service calls

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the notification service
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The request did not complete in time
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure (connect, reset, protocol)
    #[error("http transport failed: {0}")]
    Http(#[from] hyper::Error),

    /// The request could not be built
    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    /// The configured base URL does not form a valid URI
    #[error("invalid uri: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),

    /// Non-2xx response
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// The response body was not the expected JSON
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service could not be reached at all
    #[error("service unreachable: {0}")]
    Unreachable(String),
}

/// Result alias for remote calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;
