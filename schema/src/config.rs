//! Coordinator tuning knobs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and sizing for the coordinator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorConfig {
    /// Seconds between background polls while a session is active
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds a toast stays visible
    #[serde(default = "default_toast_duration_secs")]
    pub toast_duration_secs: u64,
    /// Feed page size requested from the remote service
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl CoordinatorConfig {
    /// Poll interval as a Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Toast lifetime as a Duration
    #[must_use]
    pub const fn toast_duration(&self) -> Duration {
        Duration::from_secs(self.toast_duration_secs)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            toast_duration_secs: default_toast_duration_secs(),
            page_size: default_page_size(),
        }
    }
}

const fn default_poll_interval_secs() -> u64 {
    30
}

const fn default_toast_duration_secs() -> u64 {
    5
}

const fn default_page_size() -> u32 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.poll_interval(), Duration::from_secs(30));
        assert_eq!(cfg.toast_duration(), Duration::from_secs(5));
        assert_eq!(cfg.page_size, 20);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: CoordinatorConfig = serde_json::from_str(r#"{"pageSize": 50}"#).unwrap();
        assert_eq!(cfg.page_size, 50);
        assert_eq!(cfg.poll_interval_secs, 30);
    }
}
