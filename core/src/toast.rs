//! Single-slot toast scheduler
//!
//! ```text
//! Hidden ──show──▶ Visible{notification, deadline} ──expire/dismiss──▶ Hidden
//!                        │   ▲
//!                        └───┘ show (replace, restart countdown)
//! ```
//!
//! The scheduler owns no timer. The coordinator sleeps until
//! [`ToastScheduler::deadline`] and calls [`ToastScheduler::expire`].

use chrono::{DateTime, Utc};
use schema::{Notification, ToastView};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub enum ToastState {
    #[default]
    Hidden,
    Visible {
        notification: Notification,
        shown_at: DateTime<Utc>,
        deadline: Instant,
    },
}

#[derive(Debug, Clone)]
pub struct ToastScheduler {
    duration: Duration,
    state: ToastState,
}

impl ToastScheduler {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            state: ToastState::Hidden,
        }
    }

    pub fn state(&self) -> &ToastState {
        &self.state
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.state, ToastState::Visible { .. })
    }

    /// Notification currently on screen
    pub fn current(&self) -> Option<&Notification> {
        match &self.state {
            ToastState::Visible { notification, .. } => Some(notification),
            ToastState::Hidden => None,
        }
    }

    /// When the visible toast should disappear
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            ToastState::Visible { deadline, .. } => Some(*deadline),
            ToastState::Hidden => None,
        }
    }

    /// Show `notification` for the configured duration starting at `now`.
    /// Returns the toast it replaced, if one was visible.
    pub fn show(&mut self, notification: Notification, now: Instant) -> Option<Notification> {
        let previous = self.take();
        self.state = ToastState::Visible {
            notification,
            shown_at: Utc::now(),
            deadline: now + self.duration,
        };
        previous
    }

    /// Hide the toast; returns it if one was visible.
    pub fn dismiss(&mut self) -> Option<Notification> {
        self.take()
    }

    /// Hide the toast if its deadline is at or before `now`.
    pub fn expire(&mut self, now: Instant) -> Option<Notification> {
        match self.deadline() {
            Some(deadline) if deadline <= now => self.take(),
            _ => None,
        }
    }

    pub fn view(&self) -> Option<ToastView> {
        match &self.state {
            ToastState::Visible {
                notification,
                shown_at,
                ..
            } => Some(ToastView {
                notification: notification.clone(),
                shown_at: *shown_at,
            }),
            ToastState::Hidden => None,
        }
    }

    fn take(&mut self) -> Option<Notification> {
        match std::mem::take(&mut self.state) {
            ToastState::Visible { notification, .. } => Some(notification),
            ToastState::Hidden => None,
        }
    }
}
