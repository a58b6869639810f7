//! Shape accepted by the push intake.

use crate::notification::Notification;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Message delivered by the real-time transport.
///
/// Only `{"kind": "notification", "notification": {...}}` is understood;
/// anything else fails to decode and is ignored by the intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PushMessage {
    /// A single newly created notification
    Notification {
        /// The notification itself
        notification: Notification,
    },
}

impl PushMessage {
    /// Decodes a JSON value, returning the carried notification.
    #[must_use]
    pub fn notification_from_value(value: serde_json::Value) -> Option<Notification> {
        serde_json::from_value::<Self>(value)
            .ok()
            .map(Self::into_notification)
    }

    /// Decodes a raw JSON frame, returning the carried notification.
    #[must_use]
    pub fn notification_from_slice(frame: &[u8]) -> Option<Notification> {
        serde_json::from_slice::<Self>(frame)
            .ok()
            .map(Self::into_notification)
    }

    /// Unwraps the notification.
    #[must_use]
    pub fn into_notification(self) -> Notification {
        match self {
            Self::Notification { notification } => notification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_notification_kind() {
        let value = json!({
            "kind": "notification",
            "notification": {
                "id": "n1",
                "type": "new_message",
                "title": "Hi",
                "created_at": "2024-05-01T10:00:00Z"
            }
        });
        let n = PushMessage::notification_from_value(value).expect("decoded");
        assert_eq!(n.id.as_str(), "n1");
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(PushMessage::notification_from_value(json!({"kind": "presence", "user": 1})).is_none());
        assert!(PushMessage::notification_from_value(json!({"kind": "notification"})).is_none());
        assert!(PushMessage::notification_from_value(json!("notification")).is_none());
        assert!(PushMessage::notification_from_slice(b"{ not json").is_none());
    }
}
