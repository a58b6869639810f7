mod common;

use callsheet_cache::{LocalCache, PREFERENCES_KEY};
use callsheet_core::config::{
    load_daemon_config_from_toml_str, CacheBackend, CacheConfig, DaemonFile,
};
use callsheet_core::MockNotificationService;
use daemon::toast_renderer::RecordingBackend;
use daemon::{build_cache, build_service, Daemon};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn file_backend_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig {
        backend: CacheBackend::File,
        path: Some(dir.path().join("cache.json")),
    };

    let cache = build_cache(&config).unwrap();
    cache.set(PREFERENCES_KEY, "{}").await.unwrap();
    drop(cache);

    let reopened = build_cache(&config).unwrap();
    assert_eq!(
        reopened.get(PREFERENCES_KEY).await.unwrap().as_deref(),
        Some("{}")
    );
}

#[tokio::test]
async fn sqlite_backend_opens_at_explicit_path() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig {
        backend: CacheBackend::Sqlite,
        path: Some(dir.path().join("nested").join("cache.db")),
    };

    let cache = build_cache(&config).unwrap();
    cache.set("k", "v").await.unwrap();
    assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    assert!(dir.path().join("nested").join("cache.db").exists());
}

#[tokio::test]
async fn memory_backend_starts_empty() {
    let cache = build_cache(&CacheConfig {
        backend: CacheBackend::Memory,
        path: None,
    })
    .unwrap();
    assert!(cache.get(PREFERENCES_KEY).await.unwrap().is_none());
}

#[test]
fn service_is_built_from_remote_section() {
    let config = load_daemon_config_from_toml_str(
        r#"
        [remote]
        baseUrl = "http://127.0.0.1:9/api/"
        timeoutSecs = 2
        "#,
    )
    .unwrap();
    assert!(build_service(&config.remote).is_ok());
}

#[tokio::test]
async fn start_fails_when_push_address_is_taken() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = DaemonFile::default();
    config.push.bind = taken.local_addr().unwrap().to_string();

    let err = Daemon::start(
        &config,
        Arc::new(MockNotificationService::new()),
        Arc::new(callsheet_cache::MemoryCache::new()),
        Arc::new(RecordingBackend::new()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "DAEMON001");
}

#[tokio::test]
async fn push_can_be_disabled() {
    let mut config = DaemonFile::default();
    config.push.enabled = false;

    let daemon = Daemon::start(
        &config,
        Arc::new(MockNotificationService::new()),
        Arc::new(callsheet_cache::MemoryCache::new()),
        Arc::new(RecordingBackend::new()),
    )
    .await
    .unwrap();
    assert!(daemon.push_addr().is_none());
    daemon.stop().await;
}
