//! Test utilities for integration tests in the daemon crate.

#![allow(dead_code)]

use callsheet_cache::MemoryCache;
use callsheet_core::config::DaemonFile;
use callsheet_core::MockNotificationService;
use daemon::toast_renderer::RecordingBackend;
use daemon::Daemon;
use std::sync::Arc;
use std::time::Duration;

/// Run the given future with a timeout, failing the test if it elapses.
pub async fn run_with_timeout<F, T>(duration: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(duration, fut)
        .await
        .expect("test timed out")
}

/// Poll `check` every 10ms until it holds, for at most 5 seconds.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    run_with_timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

pub struct TestDaemon {
    pub daemon: Daemon,
    pub service: MockNotificationService,
    pub cache: MemoryCache,
    pub backend: RecordingBackend,
}

/// Start a daemon on an ephemeral push port with in-process collaborators.
pub async fn start_daemon(service: MockNotificationService) -> TestDaemon {
    let mut config = DaemonFile::default();
    config.push.bind = "127.0.0.1:0".to_string();

    let cache = MemoryCache::new();
    let backend = RecordingBackend::new();
    let daemon = Daemon::start(
        &config,
        Arc::new(service.clone()),
        Arc::new(cache.clone()),
        Arc::new(backend.clone()),
    )
    .await
    .expect("daemon should start");

    TestDaemon {
        daemon,
        service,
        cache,
        backend,
    }
}
