//! Coordinator task implementation
//!
//! This module contains the [`NotificationCoordinator`] which owns every piece
//! of notification state and applies all mutations on its own task.

use super::ControlMsg;
use crate::cursor::DeliveryCursor;
use crate::fetcher::{FetchOutcome, FetchVerdict, Fetcher};
use crate::preferences::{InstallOutcome, PreferenceLoad, PreferenceOrigin, PreferenceStore};
use crate::reconciler::{MarkRead, Reconciler};
use crate::remote::{NotificationService, RemoteResult};
use crate::toast::ToastScheduler;
use crate::{CoreError, Result};
use callsheet_cache::{LocalCache, CURSOR_KEY, PREFERENCES_KEY};
use schema::{
    ArrivalSource, CoordinatorConfig, CoordinatorEvent, CoordinatorState, DismissReason,
    FeedSnapshot, NewLocalNotification, Notification, NotificationId, PreferencePatch,
    RemoteOperation,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Results sent back to the coordinator by the tasks it spawns
#[derive(Debug)]
pub enum TaskResult {
    Fetched(FetchOutcome),
    PreferencesLoaded(PreferenceLoad),
}

/// Notification coordinator task
pub struct NotificationCoordinator {
    /// Timing and paging
    config: CoordinatorConfig,
    /// Lifecycle state
    state: CoordinatorState,
    /// Remote service used for fire-and-forget mutations
    service: Arc<dyn NotificationService>,
    /// Local persistent cache
    cache: Arc<dyn LocalCache>,
    /// Preference set and routing
    preferences: PreferenceStore,
    /// Feed, unread count and delivery cursor
    reconciler: Reconciler,
    /// Fetch issuing and stale-result bookkeeping
    fetcher: Fetcher,
    /// Single toast slot
    toast: ToastScheduler,
    /// Next interval poll while Active
    next_poll: Option<Instant>,
    /// Event broadcaster
    event_tx: broadcast::Sender<CoordinatorEvent>,
    /// Snapshot broadcaster
    snapshot_tx: watch::Sender<FeedSnapshot>,
    /// Channel spawned tasks report back on
    task_tx: mpsc::UnboundedSender<TaskResult>,
    task_rx: mpsc::UnboundedReceiver<TaskResult>,
}

impl NotificationCoordinator {
    /// Create a new coordinator in the Idle state
    pub fn new(
        config: CoordinatorConfig,
        service: Arc<dyn NotificationService>,
        cache: Arc<dyn LocalCache>,
        event_tx: broadcast::Sender<CoordinatorEvent>,
        snapshot_tx: watch::Sender<FeedSnapshot>,
    ) -> Self {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        Self {
            preferences: PreferenceStore::new(Arc::clone(&service), Arc::clone(&cache)),
            fetcher: Fetcher::new(Arc::clone(&service), config.page_size),
            toast: ToastScheduler::new(config.toast_duration()),
            reconciler: Reconciler::default(),
            config,
            state: CoordinatorState::Idle,
            service,
            cache,
            next_poll: None,
            event_tx,
            snapshot_tx,
            task_tx,
            task_rx,
        }
    }

    /// Run the coordinator task loop
    pub async fn run(&mut self, mut control_rx: mpsc::UnboundedReceiver<ControlMsg>) -> Result<()> {
        info!("Starting notification coordinator");
        self.restore_cursor().await;
        self.publish();

        loop {
            let poll_at = self.next_poll;
            let toast_at = self.toast.deadline();

            tokio::select! {
                msg = control_rx.recv() => {
                    match msg {
                        Some(ControlMsg::Shutdown) => {
                            info!("Shutdown requested for notification coordinator");
                            break;
                        }
                        Some(msg) => {
                            debug!("Received control message: {:?}", msg);
                            self.handle_control_message(msg).await;
                        }
                        None => {
                            info!("Control channel closed, shutting down coordinator");
                            break;
                        }
                    }
                }

                Some(result) = self.task_rx.recv() => {
                    self.handle_task_result(result).await;
                }

                _ = sleep_until_deadline(poll_at), if poll_at.is_some() => {
                    self.on_poll_tick();
                }

                _ = sleep_until_deadline(toast_at), if toast_at.is_some() => {
                    self.on_toast_deadline();
                }
            }

            self.publish();
        }

        self.end_session();
        self.publish();
        Ok(())
    }

    /// Snapshot of the state the rendering layer sees
    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            state: self.state,
            feed: self.reconciler.feed().to_vec(),
            unread_count: self.reconciler.unread_count(),
            toast: self.toast.view(),
            preferences: self.preferences.current().cloned(),
            loading: self.state.is_active() && self.fetcher.is_in_flight(),
        }
    }

    async fn handle_control_message(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::BeginSession => self.begin_session(),
            ControlMsg::EndSession => self.end_session(),
            ControlMsg::Refresh => self.refresh(),
            ControlMsg::MarkAsRead(id) => self.mark_as_read(id),
            ControlMsg::MarkAllAsRead => self.mark_all_as_read(),
            ControlMsg::DismissToast => self.dismiss_toast(),
            ControlMsg::UpdatePreferences(patch) => self.update_preferences(patch).await,
            ControlMsg::TriggerLocal(new) => self.trigger_local(new),
            ControlMsg::Push(notification) => self.accept_push(notification),
            ControlMsg::GetSnapshot { response } => {
                let _ = response.send(self.snapshot());
            }
            ControlMsg::Shutdown => {}
        }
    }

    async fn handle_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Fetched(outcome) => self.apply_fetch(outcome).await,
            TaskResult::PreferencesLoaded(load) => self.install_preferences(load).await,
        }
    }

    /// Idle → Active
    fn begin_session(&mut self) {
        if self.state.is_active() {
            debug!("Session already active");
            return;
        }
        self.transition_to(CoordinatorState::Active);

        let load = self.preferences.load();
        let task_tx = self.task_tx.clone();
        tokio::spawn(async move {
            let load = load.await;
            let _ = task_tx.send(TaskResult::PreferencesLoaded(load));
        });

        self.start_fetch(false);
        self.next_poll = Some(Instant::now() + self.config.poll_interval());
    }

    /// Active → Idle
    fn end_session(&mut self) {
        if !self.state.is_active() {
            debug!("No active session to end");
            return;
        }
        self.next_poll = None;
        self.fetcher.invalidate();
        if let Some(hidden) = self.toast.dismiss() {
            self.emit_event(CoordinatorEvent::ToastDismissed {
                id: hidden.id,
                reason: DismissReason::SessionEnded,
                timestamp: CoordinatorEvent::current_timestamp(),
            });
        }
        self.reconciler.clear();
        self.transition_to(CoordinatorState::Idle);
    }

    fn refresh(&mut self) {
        if !self.state.is_active() {
            debug!("Ignoring refresh while idle");
            return;
        }
        self.start_fetch(true);
    }

    fn on_poll_tick(&mut self) {
        if !self.state.is_active() {
            self.next_poll = None;
            return;
        }
        self.next_poll = Some(Instant::now() + self.config.poll_interval());
        if self.fetcher.is_in_flight() {
            debug!("Previous fetch still in flight, skipping poll");
            return;
        }
        self.start_fetch(true);
    }

    fn on_toast_deadline(&mut self) {
        if let Some(expired) = self.toast.expire(Instant::now()) {
            debug!("Toast for {} expired", expired.id);
            self.emit_event(CoordinatorEvent::ToastDismissed {
                id: expired.id,
                reason: DismissReason::Expired,
                timestamp: CoordinatorEvent::current_timestamp(),
            });
        }
    }

    fn start_fetch(&mut self, surface_toast: bool) {
        let fetch = self.fetcher.begin(surface_toast);
        let task_tx = self.task_tx.clone();
        tokio::spawn(async move {
            let outcome = fetch.await;
            let _ = task_tx.send(TaskResult::Fetched(outcome));
        });
    }

    async fn apply_fetch(&mut self, mut outcome: FetchOutcome) {
        let seq = outcome.ticket.seq;
        if self.fetcher.complete(&mut outcome) == FetchVerdict::Stale || !self.state.is_active() {
            debug!("Discarding stale fetch #{}", seq);
            self.emit_event(CoordinatorEvent::StaleFetchDiscarded {
                seq,
                timestamp: CoordinatorEvent::current_timestamp(),
            });
            return;
        }

        match outcome.feed {
            Ok(page) => {
                let items = page.items.len();
                let reconciled = self
                    .reconciler
                    .replace_feed(page.items, outcome.ticket.surface_toast);
                self.emit_event(CoordinatorEvent::FeedReplaced {
                    seq,
                    items,
                    timestamp: CoordinatorEvent::current_timestamp(),
                });
                if reconciled.cursor_advanced {
                    self.persist_cursor().await;
                }
                if let Some(candidate) = reconciled.toast_candidate {
                    self.surface(candidate);
                }
            }
            Err(e) => {
                warn!("Feed fetch #{} failed, keeping last known feed: {}", seq, e);
                self.emit_event(CoordinatorEvent::remote_call_failed(
                    RemoteOperation::FetchFeed,
                    e.to_string(),
                ));
            }
        }

        match outcome.unread {
            Ok(unread) => self.reconciler.set_unread_count(unread.count),
            Err(e) => {
                warn!("Unread count fetch #{} failed, keeping last known count: {}", seq, e);
                self.emit_event(CoordinatorEvent::remote_call_failed(
                    RemoteOperation::FetchUnreadCount,
                    e.to_string(),
                ));
            }
        }
    }

    async fn install_preferences(&mut self, load: PreferenceLoad) {
        if let Some(message) = &load.remote_error {
            self.emit_event(CoordinatorEvent::remote_call_failed(
                RemoteOperation::FetchPreferences,
                message.clone(),
            ));
        }
        if let Some(message) = &load.cache_error {
            self.emit_event(CoordinatorEvent::cache_failed(PREFERENCES_KEY, message.clone()));
        }

        let origin = load.origin;
        let outcome = self.preferences.install(load);
        if outcome == InstallOutcome::Superseded {
            return;
        }
        info!("Preferences loaded from {}", origin);

        if origin == PreferenceOrigin::Remote || outcome == InstallOutcome::Rebased {
            if let Err(e) = self.preferences.persist().await {
                self.report_cache_failure(PREFERENCES_KEY, e);
            }
        }

        self.emit_event(CoordinatorEvent::PreferencesLoaded {
            origin: origin.as_str().to_string(),
            timestamp: CoordinatorEvent::current_timestamp(),
        });
    }

    fn accept_push(&mut self, notification: Notification) {
        if !self.state.is_active() {
            debug!("Dropping push {} while idle", notification.id);
            return;
        }
        if let Some(arrived) = self.reconciler.prepend(notification).toast_candidate {
            self.after_arrival(arrived, ArrivalSource::Push);
        }
    }

    fn trigger_local(&mut self, new: NewLocalNotification) {
        if !self.state.is_active() {
            debug!("Dropping local notification '{}' while idle", new.title);
            return;
        }
        let (_, reconciled) = self.reconciler.trigger_local(new);
        if let Some(arrived) = reconciled.toast_candidate {
            self.after_arrival(arrived, ArrivalSource::Local);
        }
    }

    /// A single item was prepended: in-flight fetches predate it and must not
    /// overwrite it.
    fn after_arrival(&mut self, arrived: Notification, source: ArrivalSource) {
        self.fetcher.invalidate();
        self.emit_event(CoordinatorEvent::NotificationArrived {
            id: arrived.id.clone(),
            kind: arrived.kind,
            source,
            timestamp: CoordinatorEvent::current_timestamp(),
        });
        self.surface(arrived);
    }

    /// Show `candidate` as a toast if preferences allow it.
    fn surface(&mut self, candidate: Notification) {
        if !self.preferences.resolve(candidate.kind).should_show_toast {
            debug!(
                "Toast for {} suppressed by {} preferences",
                candidate.id,
                candidate.kind.as_str()
            );
            return;
        }

        let shown = CoordinatorEvent::ToastShown {
            id: candidate.id.clone(),
            kind: candidate.kind,
            title: candidate.title.clone(),
            body: candidate.body.clone(),
            timestamp: CoordinatorEvent::current_timestamp(),
        };
        if let Some(replaced) = self.toast.show(candidate, Instant::now()) {
            self.emit_event(CoordinatorEvent::ToastDismissed {
                id: replaced.id,
                reason: DismissReason::Replaced,
                timestamp: CoordinatorEvent::current_timestamp(),
            });
        }
        self.emit_event(shown);
    }

    fn dismiss_toast(&mut self) {
        if let Some(hidden) = self.toast.dismiss() {
            self.emit_event(CoordinatorEvent::ToastDismissed {
                id: hidden.id,
                reason: DismissReason::Dismissed,
                timestamp: CoordinatorEvent::current_timestamp(),
            });
        }
    }

    fn mark_as_read(&mut self, id: NotificationId) {
        if !self.state.is_active() {
            debug!("Ignoring mark-as-read for {} while idle", id);
            return;
        }
        if self.reconciler.mark_read(&id) == MarkRead::AlreadyRead {
            debug!("Notification {} already read", id);
            return;
        }
        if id.is_local() {
            return;
        }
        self.spawn_remote(RemoteOperation::MarkRead, move |service| async move {
            service.mark_read(&id).await
        });
    }

    fn mark_all_as_read(&mut self) {
        if !self.state.is_active() {
            debug!("Ignoring mark-all-as-read while idle");
            return;
        }
        self.reconciler.mark_all_read();
        self.spawn_remote(RemoteOperation::MarkAllRead, |service| async move {
            service.mark_all_read().await
        });
    }

    async fn update_preferences(&mut self, patch: PreferencePatch) {
        if patch.is_empty() {
            debug!("Ignoring empty preference update");
            return;
        }
        if let Err(e) = self.preferences.update(&patch).await {
            self.report_cache_failure(PREFERENCES_KEY, e);
        }
        self.emit_event(CoordinatorEvent::PreferencesUpdated {
            timestamp: CoordinatorEvent::current_timestamp(),
        });
        self.spawn_remote(RemoteOperation::UpdatePreferences, move |service| async move {
            service.update_preferences(&patch).await
        });
    }

    /// Run a remote mutation on its own task; failures are logged and reported
    /// as events, never rolled back.
    fn spawn_remote<F, Fut>(&self, operation: RemoteOperation, call: F)
    where
        F: FnOnce(Arc<dyn NotificationService>) -> Fut,
        Fut: Future<Output = RemoteResult<()>> + Send + 'static,
    {
        let call = call(Arc::clone(&self.service));
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = call.await {
                warn!("Remote {:?} failed: {}", operation, e);
                let _ = event_tx.send(CoordinatorEvent::remote_call_failed(operation, e.to_string()));
            }
        });
    }

    async fn restore_cursor(&mut self) {
        match DeliveryCursor::restore(self.cache.as_ref()).await {
            Ok(cursor) => self.reconciler = Reconciler::new(cursor),
            Err(e) => {
                debug!("Delivery cursor not restored, starting unset");
                self.report_cache_failure(CURSOR_KEY, e);
            }
        }
    }

    async fn persist_cursor(&self) {
        if let Err(e) = self.reconciler.cursor().persist(self.cache.as_ref()).await {
            self.report_cache_failure(CURSOR_KEY, e);
        }
    }

    /// Cache failures are reported and the session carries on without the cache.
    fn report_cache_failure(&self, key: &str, error: impl Into<CoreError>) {
        let error = error.into();
        warn!("Cache access for {} failed: {} ({})", key, error, error.code());
        self.emit_event(CoordinatorEvent::cache_failed(key, error.to_string()));
    }

    fn transition_to(&mut self, new_state: CoordinatorState) {
        if self.state == new_state {
            return;
        }
        let old_state = self.state;
        self.state = new_state;
        info!("Coordinator transitioning from {} to {}", old_state, new_state);
        self.emit_event(CoordinatorEvent::state_changed(old_state, new_state));
    }

    fn emit_event(&self, event: CoordinatorEvent) {
        if let Err(e) = self.event_tx.send(event) {
            debug!("No event subscribers: {}", e);
        }
    }

    /// Publish a snapshot if anything visible changed
    fn publish(&self) {
        let next = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
