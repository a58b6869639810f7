//! Desktop rendering of coordinator toasts.
//!
//! The renderer follows the coordinator's event stream: every `ToastShown`
//! becomes a native notification and the matching `ToastDismissed` takes it
//! down again, so the desktop never shows more than the coordinator's single
//! toast slot. The desktop bubble is given the toast duration as its timeout.

use crate::{DaemonError, Result};
use schema::{CoordinatorEvent, NotificationId, NotificationKind};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const SUMMARY_MAX_CHARS: usize = 80;
const BODY_MAX_CHARS: usize = 200;

/// Trait for notification backends, allowing for mocking in tests.
pub trait NotificationBackend: Send + Sync {
    /// Show a notification with the given summary and body.
    fn send(&self, summary: &str, body: &str) -> Result<()>;

    /// Take down the notification shown by the last `send`, if it is still up.
    fn close(&self) -> Result<()>;
}

/// Desktop notification backend using notify-rust.
pub struct DesktopNotifier {
    timeout: Duration,
    #[cfg(all(unix, not(target_os = "macos")))]
    visible: Mutex<Option<notify_rust::NotificationHandle>>,
}

impl DesktopNotifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            #[cfg(all(unix, not(target_os = "macos")))]
            visible: Mutex::new(None),
        }
    }
}

impl std::fmt::Debug for DesktopNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopNotifier")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl NotificationBackend for DesktopNotifier {
    fn send(&self, summary: &str, body: &str) -> Result<()> {
        use notify_rust::Notification;

        debug!("Showing desktop notification: {}", summary);

        let millis = u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX);
        let mut notification = Notification::new();
        notification
            .appname("Callsheet")
            .summary(summary)
            .body(body)
            .icon("dialog-information")
            .timeout(notify_rust::Timeout::Milliseconds(millis));

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let mut visible = self
                .visible
                .lock()
                .map_err(|_| DaemonError::Notification("notification slot poisoned".to_string()))?;
            // Reuse the bubble still on screen so the server replaces it in place.
            if let Some(previous) = visible.take() {
                notification.id(previous.id());
            }
            let handle = notification
                .show()
                .map_err(|e| DaemonError::Notification(e.to_string()))?;
            *visible = Some(handle);
        }

        #[cfg(not(all(unix, not(target_os = "macos"))))]
        {
            notification
                .show()
                .map_err(|e| DaemonError::Notification(e.to_string()))?;
        }

        Ok(())
    }

    fn close(&self) -> Result<()> {
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let handle = self
                .visible
                .lock()
                .map_err(|_| DaemonError::Notification("notification slot poisoned".to_string()))?
                .take();
            if let Some(handle) = handle {
                debug!("Closing desktop notification {}", handle.id());
                handle.close();
            }
        }
        // Elsewhere the bubble leaves on its own timeout.
        Ok(())
    }
}

/// One call received by a [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Send { summary: String, body: String },
    Close,
}

/// Backend that keeps what it was asked to do.
#[derive(Debug, Default, Clone)]
pub struct RecordingBackend {
    calls: Arc<Mutex<Vec<BackendCall>>>,
    failing: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every call fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Every call, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// `(summary, body)` pairs in the order they were sent.
    pub fn shown(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Send { summary, body } => Some((summary, body)),
                BackendCall::Close => None,
            })
            .collect()
    }

    /// Number of close calls.
    pub fn closed(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == BackendCall::Close)
            .count()
    }

    fn record(&self, call: BackendCall) -> Result<()> {
        if self.failing {
            return Err(DaemonError::Notification("backend unavailable".to_string()));
        }
        self.calls
            .lock()
            .map_err(|_| DaemonError::Notification("recording lock poisoned".to_string()))?
            .push(call);
        Ok(())
    }
}

impl NotificationBackend for RecordingBackend {
    fn send(&self, summary: &str, body: &str) -> Result<()> {
        self.record(BackendCall::Send {
            summary: summary.to_string(),
            body: body.to_string(),
        })
    }

    fn close(&self) -> Result<()> {
        self.record(BackendCall::Close)
    }
}

/// Formats a toast into notification summary and body.
#[must_use]
pub fn format_toast(kind: NotificationKind, title: &str, body: Option<&str>) -> (String, String) {
    let summary = truncate(title, SUMMARY_MAX_CHARS);
    let body = match body.map(str::trim).filter(|b| !b.is_empty()) {
        Some(text) => truncate(text, BODY_MAX_CHARS),
        None => kind.display_name().to_string(),
    };
    (summary, body)
}

/// Truncates a string to a maximum length, adding "..." if truncated.
/// Handles Unicode correctly by respecting character boundaries.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncate_at = max_len.saturating_sub(3);
        let truncated: String = s.chars().take(truncate_at).collect();
        format!("{truncated}...")
    }
}

/// Drives a [`NotificationBackend`] from coordinator events.
#[derive(Clone)]
pub struct ToastRenderer {
    backend: Arc<dyn NotificationBackend>,
    /// Notification currently on the desktop
    visible: Arc<Mutex<Option<NotificationId>>>,
}

impl std::fmt::Debug for ToastRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToastRenderer").finish_non_exhaustive()
    }
}

impl ToastRenderer {
    pub fn new(backend: Arc<dyn NotificationBackend>) -> Self {
        Self {
            backend,
            visible: Arc::new(Mutex::new(None)),
        }
    }

    /// Render one event. Returns whether the desktop changed.
    ///
    /// # Errors
    /// Returns the backend's error for a toast it could not show or close.
    pub fn render(&self, event: &CoordinatorEvent) -> Result<bool> {
        let mut visible = self
            .visible
            .lock()
            .map_err(|_| DaemonError::Notification("renderer state poisoned".to_string()))?;

        match event {
            CoordinatorEvent::ToastShown {
                id,
                kind,
                title,
                body,
                ..
            } => {
                let (summary, body) = format_toast(*kind, title, body.as_deref());
                debug!("Rendering toast for {}", id);
                self.backend.send(&summary, &body)?;
                *visible = Some(id.clone());
                Ok(true)
            }
            CoordinatorEvent::ToastDismissed { id, reason, .. } => {
                if visible.as_ref() != Some(id) {
                    return Ok(false);
                }
                debug!("Closing toast for {} ({:?})", id, reason);
                *visible = None;
                self.backend.close()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Follow the event stream until every sender is gone.
    pub async fn run(self, mut events: broadcast::Receiver<CoordinatorEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let renderer = self.clone();
                    let outcome =
                        tokio::task::spawn_blocking(move || renderer.render(&event)).await;
                    match outcome {
                        Ok(Err(e)) => warn!("Failed to render toast: {} ({})", e, e.code()),
                        Err(e) => warn!("Toast rendering task failed: {}", e),
                        Ok(Ok(_)) => {}
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!("Toast renderer lagged; skipped {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Toast renderer stopped");
    }
}
