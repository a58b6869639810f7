//! Configuration loading and validation for the Callsheet daemon
//!
//! This module parses a TOML configuration into [`DaemonFile`], applies
//! defaults (via serde defaults on every section), and performs strict
//! validation with field-path error messages.

use crate::{CoreError, Result};
use schema::CoordinatorConfig;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level TOML structure
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonFile {
    /// Remote notification service
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Coordinator timing and paging
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// Local cache backend
    #[serde(default)]
    pub cache: CacheConfig,
    /// Push intake listener
    #[serde(default)]
    pub push: PushConfig,
    /// Default tracing filter; `RUST_LOG` takes precedence
    #[serde(default)]
    pub log_level: Option<String>,
}

/// `[remote]` section
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    /// Base URL the endpoint paths are appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token; usually supplied through `CALLSHEET_TOKEN` instead
    #[serde(default)]
    pub token: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Storage backend for the local cache
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// SQLite database (default)
    #[default]
    Sqlite,
    /// Versioned JSON document
    File,
    /// Process memory only; nothing survives a restart
    Memory,
}

/// `[cache]` section
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Which backend to use
    #[serde(default)]
    pub backend: CacheBackend,
    /// Explicit location; backends fall back to `$HOME/.callsheet/`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// `[push]` section
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PushConfig {
    /// Whether to accept pushes at all
    #[serde(default = "default_push_enabled")]
    pub enabled: bool,
    /// Listen address for newline-delimited JSON frames
    #[serde(default = "default_push_bind")]
    pub bind: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: default_push_enabled(),
            bind: default_push_bind(),
        }
    }
}

fn default_push_enabled() -> bool {
    true
}

fn default_push_bind() -> String {
    "127.0.0.1:49385".to_string()
}

impl DaemonFile {
    /// Validate the configuration and return `Result<()>` with field-path errors
    pub fn validate(&self) -> Result<()> {
        let base_url = self.remote.base_url.trim();
        if base_url.is_empty() {
            return Err(CoreError::ValidationError(
                "remote.baseUrl: cannot be empty".to_string(),
            ));
        }
        if !base_url.starts_with("http://") {
            return Err(CoreError::ValidationError(format!(
                "remote.baseUrl: '{}' must be an http:// URL",
                base_url
            )));
        }
        if base_url.parse::<hyper::Uri>().is_err() {
            return Err(CoreError::ValidationError(format!(
                "remote.baseUrl: '{}' is not a valid URL",
                base_url
            )));
        }
        if self.remote.timeout_secs == 0 {
            return Err(CoreError::ValidationError(
                "remote.timeoutSecs: must be > 0".to_string(),
            ));
        }
        if let Some(token) = &self.remote.token {
            if token.trim().is_empty() {
                return Err(CoreError::ValidationError(
                    "remote.token: cannot be empty when set".to_string(),
                ));
            }
        }

        let c = &self.coordinator;
        if c.poll_interval_secs == 0 {
            return Err(CoreError::ValidationError(
                "coordinator.pollIntervalSecs: must be > 0".to_string(),
            ));
        }
        if c.toast_duration_secs == 0 {
            return Err(CoreError::ValidationError(
                "coordinator.toastDurationSecs: must be > 0".to_string(),
            ));
        }
        if c.page_size == 0 {
            return Err(CoreError::ValidationError(
                "coordinator.pageSize: must be > 0".to_string(),
            ));
        }

        if let Some(path) = &self.cache.path {
            if path.as_os_str().is_empty() {
                return Err(CoreError::ValidationError(
                    "cache.path: cannot be empty when set".to_string(),
                ));
            }
            if self.cache.backend == CacheBackend::Memory {
                return Err(CoreError::ValidationError(
                    "cache.path: not used by the memory backend".to_string(),
                ));
            }
        }

        if self.push.enabled && self.push.bind.parse::<SocketAddr>().is_err() {
            return Err(CoreError::ValidationError(format!(
                "push.bind: '{}' is not a socket address",
                self.push.bind
            )));
        }

        if let Some(level) = &self.log_level {
            if level.trim().is_empty() {
                return Err(CoreError::ValidationError(
                    "logLevel: cannot be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Log level to install, defaulting to `info`
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

/// Load daemon config from a TOML file path
pub fn load_daemon_config_from_toml_path(path: impl AsRef<Path>) -> Result<DaemonFile> {
    let data = fs::read_to_string(&path).map_err(|e| {
        CoreError::ConfigurationError(format!("Failed to read config {:?}: {}", path.as_ref(), e))
    })?;
    load_daemon_config_from_toml_str(&data)
}

/// Load daemon config from a TOML string
pub fn load_daemon_config_from_toml_str(input: &str) -> Result<DaemonFile> {
    let cfg: DaemonFile = toml::from_str(input)
        .map_err(|e| CoreError::ConfigurationError(format!("TOML parse error: {}", e)))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_defaults() {
        let cfg = load_daemon_config_from_toml_str("").expect("should parse");
        assert_eq!(cfg, DaemonFile::default());
        assert_eq!(cfg.coordinator.poll_interval_secs, 30);
        assert_eq!(cfg.coordinator.toast_duration_secs, 5);
        assert_eq!(cfg.coordinator.page_size, 20);
        assert_eq!(cfg.cache.backend, CacheBackend::Sqlite);
        assert_eq!(cfg.log_level(), "info");
    }

    #[test]
    fn parses_full_config() {
        let input = r#"
        logLevel = "debug"

        [remote]
        baseUrl = "http://notifications.internal:8080/api"
        timeoutSecs = 3

        [coordinator]
        pollIntervalSecs = 15
        pageSize = 50

        [cache]
        backend = "file"
        path = "/tmp/callsheet/cache.json"

        [push]
        bind = "0.0.0.0:5000"
        "#;
        let cfg = load_daemon_config_from_toml_str(input).expect("should parse");
        assert_eq!(cfg.remote.base_url, "http://notifications.internal:8080/api");
        assert_eq!(cfg.remote.timeout(), Duration::from_secs(3));
        assert_eq!(cfg.coordinator.poll_interval_secs, 15);
        assert_eq!(cfg.coordinator.toast_duration_secs, 5);
        assert_eq!(cfg.coordinator.page_size, 50);
        assert_eq!(cfg.cache.backend, CacheBackend::File);
        assert_eq!(cfg.push.bind, "0.0.0.0:5000");
        assert!(cfg.push.enabled);
        assert_eq!(cfg.log_level(), "debug");
    }

    #[test]
    fn errors_on_zero_poll_interval() {
        let err = load_daemon_config_from_toml_str("[coordinator]\npollIntervalSecs = 0").unwrap_err();
        assert!(format!("{}", err).contains("coordinator.pollIntervalSecs"));
    }

    #[test]
    fn errors_on_https_base_url() {
        let err =
            load_daemon_config_from_toml_str("[remote]\nbaseUrl = \"https://example.com\"").unwrap_err();
        assert!(format!("{}", err).contains("remote.baseUrl"));
    }

    #[test]
    fn errors_on_bad_push_bind() {
        let err = load_daemon_config_from_toml_str("[push]\nbind = \"localhost\"").unwrap_err();
        assert!(format!("{}", err).contains("push.bind"));

        let cfg = load_daemon_config_from_toml_str("[push]\nenabled = false\nbind = \"localhost\"");
        assert!(cfg.is_ok());
    }

    #[test]
    fn errors_on_memory_backend_with_path() {
        let input = "[cache]\nbackend = \"memory\"\npath = \"/tmp/x\"";
        let err = load_daemon_config_from_toml_str(input).unwrap_err();
        assert!(format!("{}", err).contains("cache.path"));
    }

    #[test]
    fn errors_on_unknown_backend() {
        let err = load_daemon_config_from_toml_str("[cache]\nbackend = \"redis\"").unwrap_err();
        assert_eq!(err.code(), "CORE001");
    }
}
