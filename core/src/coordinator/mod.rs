//! Notification coordinator
//!
//! The coordinator owns the feed, the unread count, the delivery cursor, the
//! preference set and the toast. It runs as one tokio task; everything else
//! talks to it through a [`CoordinatorHandle`].
//!
//! ## Architecture
//!
//! ```text
//!                    ┌───────────── ControlMsg ─────────────┐
//!  handle / bridge ──┤                                      ▼
//!                    │                         NotificationCoordinator
//!   watch<FeedSnapshot> ◀── publish ──────────  (select loop)
//!   broadcast<CoordinatorEvent> ◀── emit ─────   │   ▲
//!                                                │   │ TaskResult
//!                               spawned fetches, ▼   │
//!                               preference loads ────┘
//! ```
//!
//! Lifecycle:
//!
//! ```text
//! Idle ──begin_session──▶ Active ──end_session──▶ Idle
//! ```
//!
//! ## Components
//!
//! - [`CoordinatorHandle`]: Cloneable command surface
//! - [`ControlMsg`]: Messages accepted by the coordinator task
//! - [`NotificationCoordinator`]: The task owning all state

use crate::remote::NotificationService;
use crate::Result;
use callsheet_cache::LocalCache;
use schema::{
    CoordinatorConfig, CoordinatorEvent, CoordinatorState, FeedSnapshot, NewLocalNotification,
    Notification, NotificationId, PreferencePatch,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{error, info};

pub mod coordinator_task;

pub use coordinator_task::*;

/// Control messages for coordinator operations
#[derive(Debug)]
pub enum ControlMsg {
    /// Idle → Active: load preferences, fetch, start polling
    BeginSession,
    /// Active → Idle: stop polling, hide the toast, clear the feed
    EndSession,
    /// Fetch now, surfacing a toast for anything new
    Refresh,
    /// Mark one notification read
    MarkAsRead(NotificationId),
    /// Mark every notification read
    MarkAllAsRead,
    /// Hide the visible toast
    DismissToast,
    /// Merge a partial preference update
    UpdatePreferences(PreferencePatch),
    /// Raise a notification on the client
    TriggerLocal(NewLocalNotification),
    /// A notification delivered by the real-time transport
    Push(Notification),
    /// Get the current snapshot
    GetSnapshot {
        /// Response channel for the snapshot
        response: oneshot::Sender<FeedSnapshot>,
    },
    /// Terminate the coordinator task
    Shutdown,
}

/// Handle for controlling a coordinator instance
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    /// Channel for sending control messages
    control_tx: mpsc::UnboundedSender<ControlMsg>,
    /// Receiver for snapshot updates
    snapshot_rx: watch::Receiver<FeedSnapshot>,
    /// Sender used to hand out event subscriptions
    event_tx: broadcast::Sender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    /// Send a control message to the coordinator
    pub fn send(&self, msg: ControlMsg) -> Result<()> {
        self.control_tx.send(msg).map_err(|_| {
            crate::CoreError::CoordinatorError("Coordinator task has shut down".to_string())
        })?;
        Ok(())
    }

    pub fn begin_session(&self) -> Result<()> {
        self.send(ControlMsg::BeginSession)
    }

    pub fn end_session(&self) -> Result<()> {
        self.send(ControlMsg::EndSession)
    }

    pub fn refresh(&self) -> Result<()> {
        self.send(ControlMsg::Refresh)
    }

    pub fn mark_as_read(&self, id: impl Into<NotificationId>) -> Result<()> {
        self.send(ControlMsg::MarkAsRead(id.into()))
    }

    pub fn mark_all_as_read(&self) -> Result<()> {
        self.send(ControlMsg::MarkAllAsRead)
    }

    pub fn dismiss_toast(&self) -> Result<()> {
        self.send(ControlMsg::DismissToast)
    }

    pub fn update_preferences(&self, patch: PreferencePatch) -> Result<()> {
        self.send(ControlMsg::UpdatePreferences(patch))
    }

    pub fn trigger_local(&self, notification: NewLocalNotification) -> Result<()> {
        self.send(ControlMsg::TriggerLocal(notification))
    }

    pub fn push(&self, notification: Notification) -> Result<()> {
        self.send(ControlMsg::Push(notification))
    }

    /// Shutdown the coordinator
    pub fn shutdown(&self) -> Result<()> {
        self.send(ControlMsg::Shutdown)
    }

    /// Latest published snapshot, without a round trip
    pub fn current(&self) -> FeedSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> CoordinatorState {
        self.snapshot_rx.borrow().state
    }

    /// Subscribe to snapshot changes
    pub fn subscribe_snapshots(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Subscribe to coordinator events
    pub fn subscribe_events(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.event_tx.subscribe()
    }

    /// Snapshot taken after every previously sent message has been handled
    pub async fn snapshot(&self) -> Result<FeedSnapshot> {
        let (response_tx, response_rx) = oneshot::channel();

        self.send(ControlMsg::GetSnapshot {
            response: response_tx,
        })?;

        response_rx.await.map_err(|_| {
            crate::CoreError::CoordinatorError("Failed to get snapshot response".to_string())
        })
    }

    /// Whether the coordinator task is still accepting messages
    pub fn is_running(&self) -> bool {
        !self.control_tx.is_closed()
    }
}

/// Dependencies for spawning a coordinator
pub struct CoordinatorParts {
    /// Timing and paging
    pub config: CoordinatorConfig,
    /// Remote notification service
    pub service: Arc<dyn NotificationService>,
    /// Local persistent cache
    pub cache: Arc<dyn LocalCache>,
    /// Event broadcaster
    pub event_tx: broadcast::Sender<CoordinatorEvent>,
}

/// Spawn a coordinator task
///
/// The coordinator starts Idle. It restores the delivery cursor from the cache
/// before handling its first message.
pub fn spawn_coordinator(parts: CoordinatorParts) -> CoordinatorHandle {
    let CoordinatorParts {
        config,
        service,
        cache,
        event_tx,
    } = parts;

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::default());

    info!(
        "Spawning notification coordinator (poll every {:?}, toast for {:?}, page size {})",
        config.poll_interval(),
        config.toast_duration(),
        config.page_size
    );

    let handle_event_tx = event_tx.clone();
    tokio::spawn(async move {
        let mut coordinator =
            NotificationCoordinator::new(config, service, cache, event_tx, snapshot_tx);

        if let Err(e) = coordinator.run(control_rx).await {
            error!("Notification coordinator failed: {}", e);
        }

        info!("Notification coordinator terminated");
    });

    CoordinatorHandle {
        control_tx,
        snapshot_rx,
        event_tx: handle_event_tx,
    }
}
