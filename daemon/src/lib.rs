//! Daemon library for Callsheet
//!
//! Wires the notification coordinator to its real collaborators: the HTTP
//! notification service, a local cache backend, the TCP push listener and the
//! desktop toast renderer.

pub mod push_listener;
pub mod simple_error;
pub mod toast_renderer;

#[cfg(test)]
mod simple_error_tests;

use callsheet_cache::{JsonFileCache, LocalCache, MemoryCache, SqliteCache};
use callsheet_core::config::{CacheBackend, CacheConfig, DaemonFile, RemoteConfig};
use callsheet_core::{
    spawn_coordinator, CoordinatorHandle, CoordinatorParts, HttpNotificationService,
    NotificationService, PushBridge,
};
use push_listener::PushListener;
pub use simple_error::{DaemonError, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use toast_renderer::{NotificationBackend, ToastRenderer};
use tracing::{info, warn};

/// Capacity of the coordinator event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Open the configured cache backend.
///
/// # Errors
/// Returns an error if the backend cannot be opened, or if no path is
/// configured and no home directory exists.
pub fn build_cache(config: &CacheConfig) -> Result<Arc<dyn LocalCache>> {
    let cache: Arc<dyn LocalCache> = match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Sqlite => match &config.path {
            Some(path) => Arc::new(SqliteCache::open(path)?),
            None => Arc::new(SqliteCache::open_default()?),
        },
        CacheBackend::File => {
            let path = match &config.path {
                Some(path) => path.clone(),
                None => default_file_cache_path()?,
            };
            Arc::new(JsonFileCache::new(path))
        }
    };
    Ok(cache)
}

fn default_file_cache_path() -> Result<PathBuf> {
    SqliteCache::default_path()
        .map(|db| db.with_file_name("cache.json"))
        .ok_or_else(|| {
            DaemonError::ServerError("home directory not found; set cache.path".to_string())
        })
}

/// Build the HTTP notification service.
///
/// # Errors
/// Returns an error if the base URL is not a valid URI.
pub fn build_service(config: &RemoteConfig) -> Result<Arc<dyn NotificationService>> {
    let service = HttpNotificationService::from_config(config)
        .map_err(|e| DaemonError::Core(e.into()))?;
    info!(
        "Remote notification service at {} (timeout {:?})",
        service.base_url(),
        service.timeout()
    );
    Ok(Arc::new(service))
}

/// Running daemon components
#[derive(Debug)]
pub struct Daemon {
    handle: CoordinatorHandle,
    push_addr: Option<SocketAddr>,
    stop_tx: Option<oneshot::Sender<()>>,
    listener_task: Option<JoinHandle<()>>,
    renderer_task: JoinHandle<()>,
}

impl Daemon {
    /// Spawn the coordinator, the toast renderer and (when enabled) the push
    /// listener, then begin a session.
    ///
    /// # Errors
    /// Returns an error if the push listener cannot be bound.
    pub async fn start(
        config: &DaemonFile,
        service: Arc<dyn NotificationService>,
        cache: Arc<dyn LocalCache>,
        backend: Arc<dyn NotificationBackend>,
    ) -> Result<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let handle = spawn_coordinator(CoordinatorParts {
            config: config.coordinator.clone(),
            service,
            cache,
            event_tx,
        });

        let renderer = ToastRenderer::new(backend);
        let renderer_task = tokio::spawn(renderer.run(handle.subscribe_events()));

        let mut push_addr = None;
        let mut stop_tx = None;
        let mut listener_task = None;
        if config.push.enabled {
            let socket = match PushListener::bind(&config.push.bind).await {
                Ok(socket) => socket,
                Err(e) => {
                    let _ = handle.shutdown();
                    renderer_task.abort();
                    return Err(e);
                }
            };
            push_addr = Some(socket.local_addr()?);
            let (tx, rx) = oneshot::channel::<()>();
            stop_tx = Some(tx);
            let listener = PushListener::new(PushBridge::new(handle.clone()));
            listener_task = Some(tokio::spawn(async move {
                let shutdown = async {
                    let _ = rx.await;
                };
                if let Err(e) = listener.serve(socket, shutdown).await {
                    warn!("Push listener terminated: {}", e);
                }
            }));
        } else {
            info!("Push intake disabled");
        }

        handle.begin_session()?;

        Ok(Self {
            handle,
            push_addr,
            stop_tx,
            listener_task,
            renderer_task,
        })
    }

    /// Handle to the running coordinator
    pub fn handle(&self) -> &CoordinatorHandle {
        &self.handle
    }

    /// Bound push listener address, when push intake is enabled
    pub fn push_addr(&self) -> Option<SocketAddr> {
        self.push_addr
    }

    /// End the session, stop the listener and wait for the coordinator to
    /// finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.listener_task.take() {
            if let Err(e) = task.await {
                warn!("Push listener task failed: {}", e);
            }
        }

        let mut snapshots = self.handle.subscribe_snapshots();
        if let Err(e) = self.handle.end_session() {
            warn!("Failed to end session: {}", e);
        }
        if let Err(e) = self.handle.shutdown() {
            warn!("Failed to stop coordinator: {}", e);
        }
        // Resolves with an error once the coordinator task has dropped its sender.
        while snapshots.changed().await.is_ok() {}

        // Open push connections may still hold event senders.
        self.renderer_task.abort();
        let _ = self.renderer_task.await;
        info!("Daemon stopped");
    }
}
