//! Schema definitions for Callsheet
//!
//! This crate contains the data structures shared by the notification
//! coordinator, its storage and transport adapters, and the rendering layer.
//! Types that travel to or from the remote notification service keep that
//! service's snake_case field names; types owned by Callsheet use camelCase.

pub mod config;
pub mod events;
pub mod notification;
pub mod preferences;
pub mod push;
pub mod snapshot;

pub use config::CoordinatorConfig;
pub use events::{ArrivalSource, CoordinatorEvent, DismissReason, EventSeverity, RemoteOperation};
pub use notification::{
    FeedPage, NewLocalNotification, Notification, NotificationId, NotificationKind, UnreadCount,
    LOCAL_ID_PREFIX,
};
pub use preferences::{channels_key, Channel, ChannelFlags, PreferencePatch, PreferenceSet};
pub use push::PushMessage;
pub use snapshot::{CoordinatorState, FeedSnapshot, ToastView};
