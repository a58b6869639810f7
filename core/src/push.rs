//! Real-time push intake
//!
//! The transport hands every message to [`PushBridge::intake`]. Only
//! `{"kind": "notification", "notification": {...}}` is understood; anything
//! else is dropped with a debug log. The bridge is cheap to clone and can be
//! called from any task.

use crate::coordinator::CoordinatorHandle;
use schema::{Notification, PushMessage};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PushBridge {
    handle: CoordinatorHandle,
}

impl PushBridge {
    pub fn new(handle: CoordinatorHandle) -> Self {
        Self { handle }
    }

    /// Accept one decoded message. Returns whether it was forwarded.
    pub fn intake(&self, message: serde_json::Value) -> bool {
        match PushMessage::notification_from_value(message) {
            Some(notification) => self.deliver(notification),
            None => {
                debug!("Ignoring push message with unexpected shape");
                false
            }
        }
    }

    /// Accept one raw frame. Returns whether it was forwarded.
    pub fn intake_frame(&self, frame: &[u8]) -> bool {
        match PushMessage::notification_from_slice(frame) {
            Some(notification) => self.deliver(notification),
            None => {
                debug!("Ignoring malformed push frame ({} bytes)", frame.len());
                false
            }
        }
    }

    fn deliver(&self, notification: Notification) -> bool {
        debug!("Push delivered notification {}", notification.id);
        match self.handle.push(notification) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping push: {}", e);
                false
            }
        }
    }
}
