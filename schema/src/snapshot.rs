//! Read-only view handed to the rendering layer.

use crate::notification::Notification;
use crate::preferences::PreferenceSet;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Coordinator lifecycle state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CoordinatorState {
    /// No session; polling suspended
    #[default]
    Idle,
    /// Session active; polling running
    Active,
}

impl CoordinatorState {
    /// Whether a session is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Active => f.write_str("active"),
        }
    }
}

/// The currently visible transient alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToastView {
    /// Notification being shown
    pub notification: Notification,
    /// When it became visible
    pub shown_at: DateTime<Utc>,
}

/// Everything the rendering layer may read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    /// Lifecycle state
    pub state: CoordinatorState,
    /// Newest-first feed
    pub feed: Vec<Notification>,
    /// Unread count, independent of the feed length
    pub unread_count: u32,
    /// Visible toast, if any
    pub toast: Option<ToastView>,
    /// Loaded preferences, `None` until the first load completes
    pub preferences: Option<PreferenceSet>,
    /// Whether a fetch is in flight
    pub loading: bool,
}
