//! Event system for the notification coordinator
//!
//! The coordinator broadcasts these events for observability: they are
//! best-effort telemetry and never required for correctness. Subscribers
//! that lag simply miss events.
//!
//! Events are designed to be serializable and can be:
//! - Logged to structured log files
//! - Forwarded to a rendering layer (e.g. to drive desktop toasts)
//! - Used in tests to observe the coordinator from the outside

use crate::notification::{NotificationId, NotificationKind};
use crate::snapshot::CoordinatorState;
use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where a notification entered the feed from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ArrivalSource {
    /// Real-time transport
    Push,
    /// Raised on the client
    Local,
}

/// Why a toast left the screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DismissReason {
    /// The auto-dismiss countdown elapsed
    Expired,
    /// The user closed it
    Dismissed,
    /// A newer toast took its place
    Replaced,
    /// The session ended
    SessionEnded,
}

/// Remote operation named in failure events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RemoteOperation {
    /// Feed page fetch
    FetchFeed,
    /// Unread count fetch
    FetchUnreadCount,
    /// Single mark-read
    MarkRead,
    /// Mark-all-read
    MarkAllRead,
    /// Preference fetch
    FetchPreferences,
    /// Preference sync
    UpdatePreferences,
}

/// Events emitted by the coordinator
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "eventType", rename_all = "camelCase")]
pub enum CoordinatorEvent {
    /// Lifecycle state changed
    StateChanged {
        /// Previous state
        from_state: CoordinatorState,
        /// New state
        to_state: CoordinatorState,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// A fetch result replaced the feed
    FeedReplaced {
        /// Request sequence number
        seq: u64,
        /// Number of items in the new feed
        items: usize,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// A fetch result arrived after newer state and was dropped
    StaleFetchDiscarded {
        /// Request sequence number
        seq: u64,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// A single notification was prepended to the feed
    NotificationArrived {
        /// Notification identifier
        id: NotificationId,
        /// Notification kind
        kind: NotificationKind,
        /// Where it came from
        source: ArrivalSource,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// A toast became visible
    ToastShown {
        /// Notification identifier
        id: NotificationId,
        /// Notification kind
        kind: NotificationKind,
        /// Title shown to the user
        title: String,
        /// Optional body shown to the user
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// A toast was hidden
    ToastDismissed {
        /// Notification identifier
        id: NotificationId,
        /// Why it was hidden
        reason: DismissReason,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// Preferences were loaded at session start
    PreferencesLoaded {
        /// `remote`, `cache` or `defaults`
        origin: String,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// Preferences were changed locally
    PreferencesUpdated {
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// A remote call failed; local state was kept
    RemoteCallFailed {
        /// Which call failed
        operation: RemoteOperation,
        /// Error message
        message: String,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// The local cache could not be read or written
    CacheFailed {
        /// Cache key involved
        key: String,
        /// Error message
        message: String,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },
}

/// Event severity level for filtering
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "camelCase")]
pub enum EventSeverity {
    /// Debug information
    Debug,
    /// Informational events
    Info,
    /// Warning conditions
    Warning,
}

impl CoordinatorEvent {
    /// Get the timestamp for this event
    #[must_use]
    pub fn timestamp(&self) -> &str {
        match self {
            Self::StateChanged { timestamp, .. }
            | Self::FeedReplaced { timestamp, .. }
            | Self::StaleFetchDiscarded { timestamp, .. }
            | Self::NotificationArrived { timestamp, .. }
            | Self::ToastShown { timestamp, .. }
            | Self::ToastDismissed { timestamp, .. }
            | Self::PreferencesLoaded { timestamp, .. }
            | Self::PreferencesUpdated { timestamp }
            | Self::RemoteCallFailed { timestamp, .. }
            | Self::CacheFailed { timestamp, .. } => timestamp,
        }
    }

    /// Get the severity level for this event
    #[must_use]
    pub fn severity(&self) -> EventSeverity {
        match self {
            Self::StateChanged { .. }
            | Self::NotificationArrived { .. }
            | Self::ToastShown { .. }
            | Self::PreferencesLoaded { .. }
            | Self::PreferencesUpdated { .. } => EventSeverity::Info,
            Self::FeedReplaced { .. }
            | Self::StaleFetchDiscarded { .. }
            | Self::ToastDismissed { .. } => EventSeverity::Debug,
            Self::RemoteCallFailed { .. } | Self::CacheFailed { .. } => EventSeverity::Warning,
        }
    }

    /// Create a current timestamp string in RFC3339 format
    #[must_use]
    pub fn current_timestamp() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Create a state changed event
    #[must_use]
    pub fn state_changed(from_state: CoordinatorState, to_state: CoordinatorState) -> Self {
        Self::StateChanged {
            from_state,
            to_state,
            timestamp: Self::current_timestamp(),
        }
    }

    /// Create a remote call failure event
    #[must_use]
    pub fn remote_call_failed(operation: RemoteOperation, message: impl Into<String>) -> Self {
        Self::RemoteCallFailed {
            operation,
            message: message.into(),
            timestamp: Self::current_timestamp(),
        }
    }

    /// Create a cache failure event
    #[must_use]
    pub fn cache_failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CacheFailed {
            key: key.into(),
            message: message.into(),
            timestamp: Self::current_timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged() {
        let event = CoordinatorEvent::remote_call_failed(RemoteOperation::FetchFeed, "timeout");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "remoteCallFailed");
        assert_eq!(json["operation"], "fetchFeed");
        assert_eq!(event.severity(), EventSeverity::Warning);
    }

    #[test]
    fn timestamp_is_rfc3339_seconds() {
        let ts = CoordinatorEvent::current_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
