//! Core functionality for Callsheet notifications
//!
//! This crate contains the notification coordinator and everything it is
//! built from: the remote service boundary, the feed reconciler, preference
//! routing, the toast scheduler and the push intake. The daemon wires these
//! to real transports; tests wire them to the in-process doubles.

pub mod config;
pub mod coordinator;
pub mod cursor;
pub mod error;
pub mod fetcher;
pub mod preferences;
pub mod push;
pub mod reconciler;
pub mod remote;
pub mod toast;

// Re-export schema types for convenience
pub use schema::*;

pub use coordinator::{spawn_coordinator, ControlMsg, CoordinatorHandle, CoordinatorParts};
pub use error::{CoreError, Result};
pub use preferences::{InstallOutcome, PreferenceOrigin, PreferenceStore, RouteDecision};
pub use push::PushBridge;
pub use remote::{HttpNotificationService, MockNotificationService, NotificationService, RemoteError};

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
