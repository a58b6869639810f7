//! Notification types shared by the coordinator, the remote adapters and the
//! rendering layer.
//!
//! Field names follow the remote notification service (snake_case on the
//! wire). Identifiers are opaque: the service may send them as strings or
//! integers and both are normalised to a string.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Prefix reserved for identifiers synthesized on the client.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Opaque notification identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawNotificationId", into = "String")]
pub struct NotificationId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNotificationId {
    Number(serde_json::Number),
    Text(String),
}

/// Largest integer an `f64` holds exactly.
const F64_EXACT_INT: f64 = 9_007_199_254_740_992.0;

impl From<RawNotificationId> for NotificationId {
    fn from(raw: RawNotificationId) -> Self {
        match raw {
            RawNotificationId::Number(n) => Self(number_id(&n)),
            RawNotificationId::Text(s) => Self(s),
        }
    }
}

/// Integral floats (`42.0`) collapse to the integer spelling.
fn number_id(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < F64_EXACT_INT => {
            format!("{f:.0}")
        }
        _ => n.to_string(),
    }
}

impl From<NotificationId> for String {
    fn from(id: NotificationId) -> Self {
        id.0
    }
}

impl NotificationId {
    /// Wraps a server-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds a client-side identifier in the reserved namespace.
    pub fn local(suffix: impl std::fmt::Display) -> Self {
        Self(format!("{LOCAL_ID_PREFIX}{suffix}"))
    }

    /// Whether this identifier was synthesized on the client.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for NotificationId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl JsonSchema for NotificationId {
    fn schema_name() -> String {
        "NotificationId".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// Kind of event a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A talent responded to one of the user's castings
    NewResponse,
    /// The user's response was accepted
    ResponseAccepted,
    /// The user's response was rejected
    ResponseRejected,
    /// A direct message arrived
    NewMessage,
    /// Someone viewed the user's profile
    ProfileViewed,
    /// One of the user's castings is about to expire
    CastingExpiring,
    /// Someone started following the user
    NewFollower,
    /// A type this client does not know yet
    Other,
}

impl NotificationKind {
    /// Every known kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::NewResponse,
        Self::ResponseAccepted,
        Self::ResponseRejected,
        Self::NewMessage,
        Self::ProfileViewed,
        Self::CastingExpiring,
        Self::NewFollower,
    ];

    /// Parses a kind from its wire name.
    ///
    /// Unknown names map to [`NotificationKind::Other`] so a newly introduced
    /// server type never breaks feed decoding.
    #[must_use]
    #[allow(clippy::should_implement_trait)] // Infallible parsing, not FromStr
    pub fn from_str(s: &str) -> Self {
        match s {
            "new_response" => Self::NewResponse,
            "response_accepted" => Self::ResponseAccepted,
            "response_rejected" => Self::ResponseRejected,
            "new_message" => Self::NewMessage,
            "profile_viewed" => Self::ProfileViewed,
            "casting_expiring" => Self::CastingExpiring,
            "new_follower" => Self::NewFollower,
            _ => Self::Other,
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewResponse => "new_response",
            Self::ResponseAccepted => "response_accepted",
            Self::ResponseRejected => "response_rejected",
            Self::NewMessage => "new_message",
            Self::ProfileViewed => "profile_viewed",
            Self::CastingExpiring => "casting_expiring",
            Self::NewFollower => "new_follower",
            Self::Other => "other",
        }
    }

    /// Human-readable label used by desktop renderers.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::NewResponse => "New response",
            Self::ResponseAccepted => "Response accepted",
            Self::ResponseRejected => "Response rejected",
            Self::NewMessage => "New message",
            Self::ProfileViewed => "Profile viewed",
            Self::CastingExpiring => "Casting expiring",
            Self::NewFollower => "New follower",
            Self::Other => "Notification",
        }
    }
}

impl<'de> Deserialize<'de> for NotificationKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_str(&raw))
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single user-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Notification {
    /// Identifier, unique within the feed
    pub id: NotificationId,
    /// Notification kind
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Short headline
    pub title: String,
    /// Optional longer text
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "message")]
    pub body: Option<String>,
    /// Structured data used to resolve a deep link
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "data")]
    pub payload: Option<serde_json::Value>,
    /// Whether the user has read it
    #[serde(default)]
    pub read: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Creates an unread notification stamped with the current time.
    pub fn new(id: impl Into<NotificationId>, kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            body: None,
            payload: None,
            read: false,
            created_at: Utc::now(),
        }
    }

    /// Adds a body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a structured payload.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Marks the notification as already read.
    #[must_use]
    pub fn mark_read(mut self) -> Self {
        self.read = true;
        self
    }
}

impl From<String> for NotificationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Input for a notification raised entirely on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NewLocalNotification {
    /// Notification kind
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Short headline
    pub title: String,
    /// Optional longer text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Structured data used to resolve a deep link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl NewLocalNotification {
    /// Creates a local notification request.
    pub fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: None,
            payload: None,
        }
    }

    /// Adds a body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Materialises the request into an unread notification with the given id.
    #[must_use]
    pub fn into_notification(self, id: NotificationId) -> Notification {
        Notification {
            id,
            kind: self.kind,
            title: self.title,
            body: self.body,
            payload: self.payload,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// Page returned by the remote feed endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeedPage {
    /// Newest-first notifications
    #[serde(default)]
    pub items: Vec<Notification>,
}

/// Body returned by the remote unread-count endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UnreadCount {
    /// Number of unread notifications on the server
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_and_float_ids_are_accepted() {
        let big: NotificationId = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(big.as_str(), "18446744073709551615");

        let negative: NotificationId = serde_json::from_str("-3").unwrap();
        assert_eq!(negative.as_str(), "-3");

        let integral: NotificationId = serde_json::from_str("42.0").unwrap();
        assert_eq!(integral, NotificationId::new("42"));

        let fractional: NotificationId = serde_json::from_str("4.5").unwrap();
        assert_eq!(fractional.as_str(), "4.5");

        let item: Notification = serde_json::from_value(serde_json::json!({
            "id": 9_223_372_036_854_775_808_u64,
            "type": "new_follower",
            "title": "t",
            "created_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(item.id.as_str(), "9223372036854775808");
    }

    #[test]
    fn numeric_and_string_ids_normalise() {
        let n: NotificationId = serde_json::from_str("42").unwrap();
        let s: NotificationId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(n, s);
        assert_eq!(serde_json::to_string(&n).unwrap(), "\"42\"");
    }

    #[test]
    fn local_ids_are_namespaced() {
        let id = NotificationId::local("abc");
        assert_eq!(id.as_str(), "local-abc");
        assert!(id.is_local());
        assert!(!NotificationId::new("abc").is_local());
    }

    #[test]
    fn unknown_kind_maps_to_other() {
        let kind: NotificationKind = serde_json::from_str("\"audition_booked\"").unwrap();
        assert_eq!(kind, NotificationKind::Other);
        let kind: NotificationKind = serde_json::from_str("\"new_message\"").unwrap();
        assert_eq!(kind, NotificationKind::NewMessage);
    }

    #[test]
    fn decodes_server_notification() {
        let json = r#"{
            "id": 17,
            "type": "response_accepted",
            "title": "You're in",
            "message": "Callback on Friday",
            "data": {"casting_id": 9},
            "read": false,
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.id.as_str(), "17");
        assert_eq!(n.kind, NotificationKind::ResponseAccepted);
        assert_eq!(n.body.as_deref(), Some("Callback on Friday"));
        assert_eq!(n.payload, Some(serde_json::json!({"casting_id": 9})));
        assert!(!n.read);
    }

    #[test]
    fn missing_read_flag_defaults_to_unread() {
        let json = r#"{"id":"a","type":"new_follower","title":"t","created_at":"2024-05-01T10:00:00Z"}"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert!(!n.read);
        assert!(n.body.is_none());
    }
}
