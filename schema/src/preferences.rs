//! Notification routing preferences
//!
//! A [`PreferenceSet`] holds three global channel toggles plus, per
//! notification kind, an optional channel sub-map stored under the
//! `${kind}_channels` key. A kind/channel pair may only fire when the global
//! toggle is on and the per-kind flag is not explicitly `false`; an absent
//! entry or an absent flag allows delivery, so kinds introduced later are
//! visible without a migration.

use crate::notification::NotificationKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const CHANNELS_SUFFIX: &str = "_channels";

/// Delivery surface for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Bell feed and toast inside the application
    InApp,
    /// E-mail digest
    Email,
    /// Mobile/browser push
    Push,
}

/// Per-kind channel flags. `None` means "not specified".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChannelFlags {
    /// In-app delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_app: Option<bool>,
    /// E-mail delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<bool>,
    /// Push delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<bool>,
}

impl ChannelFlags {
    /// Fully specified flags.
    #[must_use]
    pub const fn new(in_app: bool, email: bool, push: bool) -> Self {
        Self {
            in_app: Some(in_app),
            email: Some(email),
            push: Some(push),
        }
    }

    /// Flag for one channel.
    #[must_use]
    pub const fn get(&self, channel: Channel) -> Option<bool> {
        match channel {
            Channel::InApp => self.in_app,
            Channel::Email => self.email,
            Channel::Push => self.push,
        }
    }

    /// Sets the flag for one channel.
    pub fn set(&mut self, channel: Channel, enabled: bool) {
        match channel {
            Channel::InApp => self.in_app = Some(enabled),
            Channel::Email => self.email = Some(enabled),
            Channel::Push => self.push = Some(enabled),
        }
    }

    /// Overlays every flag specified in `other`.
    pub fn merge(&mut self, other: &ChannelFlags) {
        if other.in_app.is_some() {
            self.in_app = other.in_app;
        }
        if other.email.is_some() {
            self.email = other.email;
        }
        if other.push.is_some() {
            self.push = other.push;
        }
    }
}

/// The user's full routing matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPreferenceSet")]
pub struct PreferenceSet {
    /// Global in-app toggle
    pub in_app_enabled: bool,
    /// Global e-mail toggle
    pub email_enabled: bool,
    /// Global push toggle
    pub push_enabled: bool,
    /// Per-kind flags keyed by `${kind}_channels`
    #[serde(flatten)]
    pub channels: BTreeMap<String, ChannelFlags>,
}

/// Lenient wire form: unknown keys and malformed entries are dropped instead
/// of failing the whole document.
#[derive(Deserialize)]
struct RawPreferenceSet {
    #[serde(default = "enabled")]
    in_app_enabled: bool,
    #[serde(default = "enabled")]
    email_enabled: bool,
    #[serde(default = "enabled")]
    push_enabled: bool,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

fn enabled() -> bool {
    true
}

impl From<RawPreferenceSet> for PreferenceSet {
    fn from(raw: RawPreferenceSet) -> Self {
        let channels = raw
            .rest
            .into_iter()
            .filter(|(key, _)| key.ends_with(CHANNELS_SUFFIX))
            .filter_map(|(key, value)| {
                serde_json::from_value::<ChannelFlags>(value)
                    .ok()
                    .map(|flags| (key, flags))
            })
            .collect();
        Self {
            in_app_enabled: raw.in_app_enabled,
            email_enabled: raw.email_enabled,
            push_enabled: raw.push_enabled,
            channels,
        }
    }
}

impl Default for PreferenceSet {
    /// Hard-coded defaults: everything in-app, e-mail for transactional kinds,
    /// push only for the kinds that need a prompt reaction.
    fn default() -> Self {
        let mut set = Self {
            in_app_enabled: true,
            email_enabled: true,
            push_enabled: true,
            channels: BTreeMap::new(),
        };
        for kind in NotificationKind::ALL {
            set.set_channels(kind, default_flags(kind));
        }
        set
    }
}

fn default_flags(kind: NotificationKind) -> ChannelFlags {
    match kind {
        NotificationKind::NewResponse
        | NotificationKind::ResponseAccepted
        | NotificationKind::NewMessage => ChannelFlags::new(true, true, true),
        NotificationKind::ResponseRejected | NotificationKind::CastingExpiring => {
            ChannelFlags::new(true, true, false)
        }
        NotificationKind::ProfileViewed
        | NotificationKind::NewFollower
        | NotificationKind::Other => ChannelFlags::new(true, false, false),
    }
}

/// Storage key for a kind's channel map.
#[must_use]
pub fn channels_key(kind: NotificationKind) -> String {
    format!("{}{CHANNELS_SUFFIX}", kind.as_str())
}

impl PreferenceSet {
    /// Per-kind flags, if the set has an entry for the kind.
    #[must_use]
    pub fn channels(&self, kind: NotificationKind) -> Option<&ChannelFlags> {
        self.channels.get(&channels_key(kind))
    }

    /// Replaces the per-kind flags.
    pub fn set_channels(&mut self, kind: NotificationKind, flags: ChannelFlags) {
        self.channels.insert(channels_key(kind), flags);
    }

    /// Global toggle for a channel.
    #[must_use]
    pub const fn global(&self, channel: Channel) -> bool {
        match channel {
            Channel::InApp => self.in_app_enabled,
            Channel::Email => self.email_enabled,
            Channel::Push => self.push_enabled,
        }
    }

    /// Whether `kind` may be delivered on `channel`.
    ///
    /// Requires the global toggle; the per-kind flag only suppresses when it
    /// is explicitly `false`.
    #[must_use]
    pub fn allows(&self, kind: NotificationKind, channel: Channel) -> bool {
        if !self.global(channel) {
            return false;
        }
        self.channels(kind).and_then(|flags| flags.get(channel)) != Some(false)
    }

    /// Applies a partial update in place.
    pub fn apply(&mut self, patch: &PreferencePatch) {
        if let Some(v) = patch.in_app_enabled {
            self.in_app_enabled = v;
        }
        if let Some(v) = patch.email_enabled {
            self.email_enabled = v;
        }
        if let Some(v) = patch.push_enabled {
            self.push_enabled = v;
        }
        for (key, flags) in &patch.channels {
            self.channels.entry(key.clone()).or_default().merge(flags);
        }
    }
}

/// Partial preference update sent by the settings page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencePatch {
    /// New global in-app toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_app_enabled: Option<bool>,
    /// New global e-mail toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_enabled: Option<bool>,
    /// New global push toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_enabled: Option<bool>,
    /// Per-kind flag overlays keyed by `${kind}_channels`
    #[serde(flatten)]
    pub channels: BTreeMap<String, ChannelFlags>,
}

impl PreferencePatch {
    /// Empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a global toggle.
    #[must_use]
    pub fn global(mut self, channel: Channel, enabled: bool) -> Self {
        match channel {
            Channel::InApp => self.in_app_enabled = Some(enabled),
            Channel::Email => self.email_enabled = Some(enabled),
            Channel::Push => self.push_enabled = Some(enabled),
        }
        self
    }

    /// Sets one per-kind channel flag.
    #[must_use]
    pub fn channel(mut self, kind: NotificationKind, channel: Channel, enabled: bool) -> Self {
        self.channels
            .entry(channels_key(kind))
            .or_default()
            .set(channel, enabled);
        self
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.in_app_enabled.is_none()
            && self.email_enabled.is_none()
            && self.push_enabled.is_none()
            && self.channels.is_empty()
    }
}
