//! Remote notification service boundary
//!
//! The coordinator never talks HTTP directly; it holds an
//! `Arc<dyn NotificationService>` and runs every call in a spawned task.
//!
//! - [`HttpNotificationService`]: JSON over HTTP/1.1 via `hyper`
//! - [`MockNotificationService`]: scripted in-process double with a call log

use async_trait::async_trait;
use schema::{FeedPage, NotificationId, PreferencePatch, PreferenceSet, UnreadCount};

pub mod error;
pub mod http;
pub mod mock;

pub use error::{RemoteError, RemoteResult};
pub use http::HttpNotificationService;
pub use mock::{MockNotificationService, RemoteCall};

/// Operations offered by the remote notification service
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Latest page of notifications, newest first.
    async fn fetch_feed(&self, limit: u32) -> RemoteResult<FeedPage>;

    /// Server-side unread total, which may exceed the page size.
    async fn fetch_unread_count(&self) -> RemoteResult<UnreadCount>;

    /// Marks one notification as read.
    async fn mark_read(&self, id: &NotificationId) -> RemoteResult<()>;

    /// Marks every notification as read.
    async fn mark_all_read(&self) -> RemoteResult<()>;

    /// The user's stored preference set.
    async fn fetch_preferences(&self) -> RemoteResult<PreferenceSet>;

    /// Applies a partial preference update.
    async fn update_preferences(&self, patch: &PreferencePatch) -> RemoteResult<()>;
}
