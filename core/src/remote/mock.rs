//! Scripted notification service for tests

use async_trait::async_trait;
use schema::{FeedPage, Notification, NotificationId, PreferencePatch, PreferenceSet, UnreadCount};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use super::{NotificationService, RemoteError, RemoteResult};

/// A call received by [`MockNotificationService`]
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    FetchFeed { limit: u32 },
    FetchUnreadCount,
    MarkRead(NotificationId),
    MarkAllRead,
    FetchPreferences,
    UpdatePreferences(PreferencePatch),
}

#[derive(Debug)]
struct MockState {
    reachable: bool,
    feed: Vec<Notification>,
    unread_count: u32,
    preferences: Option<PreferenceSet>,
    feed_delays: VecDeque<Duration>,
    calls: Vec<RemoteCall>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            reachable: true,
            feed: Vec::new(),
            unread_count: 0,
            preferences: None,
            feed_delays: VecDeque::new(),
            calls: Vec::new(),
        }
    }
}

/// In-process notification service
///
/// Serves whatever feed, count and preferences were last set. The feed page
/// is captured when the call arrives; any queued delay is applied afterwards,
/// so a delayed response carries the data of the moment it was requested.
#[derive(Debug, Clone, Default)]
pub struct MockNotificationService {
    state: Arc<Mutex<MockState>>,
}

impl MockNotificationService {
    /// Create a reachable service with an empty feed
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service that fails every call
    pub async fn unreachable() -> Self {
        let service = Self::new();
        service.set_reachable(false).await;
        service
    }

    /// Toggle whether calls succeed
    pub async fn set_reachable(&self, reachable: bool) {
        self.state.lock().await.reachable = reachable;
    }

    /// Replace the served feed (newest first)
    pub async fn set_feed(&self, feed: Vec<Notification>) {
        self.state.lock().await.feed = feed;
    }

    /// Replace the served unread count
    pub async fn set_unread_count(&self, count: u32) {
        self.state.lock().await.unread_count = count;
    }

    /// Replace the served preference set; `None` answers 404
    pub async fn set_preferences(&self, preferences: Option<PreferenceSet>) {
        self.state.lock().await.preferences = preferences;
    }

    /// Delay the next `fetch_feed` response by `delay`
    pub async fn queue_feed_delay(&self, delay: Duration) {
        self.state.lock().await.feed_delays.push_back(delay);
    }

    /// Every call received so far, in arrival order
    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().await.calls.clone()
    }

    /// Number of calls matching `predicate`
    pub async fn count_calls(&self, predicate: impl Fn(&RemoteCall) -> bool) -> usize {
        self.state.lock().await.calls.iter().filter(|c| predicate(c)).count()
    }

    async fn record(&self, call: RemoteCall) -> RemoteResult<()> {
        debug!("Mock notification service received {:?}", call);
        let mut state = self.state.lock().await;
        state.calls.push(call);
        if state.reachable {
            Ok(())
        } else {
            Err(RemoteError::Unreachable("mock service offline".to_string()))
        }
    }
}

#[async_trait]
impl NotificationService for MockNotificationService {
    async fn fetch_feed(&self, limit: u32) -> RemoteResult<FeedPage> {
        self.record(RemoteCall::FetchFeed { limit }).await?;
        let (items, delay) = {
            let mut state = self.state.lock().await;
            let items: Vec<Notification> = state.feed.iter().take(limit as usize).cloned().collect();
            (items, state.feed_delays.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(FeedPage { items })
    }

    async fn fetch_unread_count(&self) -> RemoteResult<UnreadCount> {
        self.record(RemoteCall::FetchUnreadCount).await?;
        let count = self.state.lock().await.unread_count;
        Ok(UnreadCount { count })
    }

    async fn mark_read(&self, id: &NotificationId) -> RemoteResult<()> {
        self.record(RemoteCall::MarkRead(id.clone())).await
    }

    async fn mark_all_read(&self) -> RemoteResult<()> {
        self.record(RemoteCall::MarkAllRead).await
    }

    async fn fetch_preferences(&self) -> RemoteResult<PreferenceSet> {
        self.record(RemoteCall::FetchPreferences).await?;
        self.state
            .lock()
            .await
            .preferences
            .clone()
            .ok_or_else(|| RemoteError::UnexpectedStatus {
                status: 404,
                body: "no preferences stored".to_string(),
            })
    }

    async fn update_preferences(&self, patch: &PreferencePatch) -> RemoteResult<()> {
        self.record(RemoteCall::UpdatePreferences(patch.clone())).await?;
        let mut state = self.state.lock().await;
        if let Some(preferences) = state.preferences.as_mut() {
            preferences.apply(patch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::NotificationKind;

    #[tokio::test]
    async fn records_calls_even_when_offline() {
        let service = MockNotificationService::unreachable().await;
        assert!(service.fetch_unread_count().await.is_err());
        assert!(service.mark_all_read().await.is_err());
        assert_eq!(
            service.calls().await,
            vec![RemoteCall::FetchUnreadCount, RemoteCall::MarkAllRead]
        );
    }

    #[tokio::test]
    async fn feed_respects_limit() {
        let service = MockNotificationService::new();
        service
            .set_feed(
                (1..=5)
                    .rev()
                    .map(|i| Notification::new(i as u64, NotificationKind::NewFollower, "f"))
                    .collect(),
            )
            .await;
        let page = service.fetch_feed(3).await.unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].id.as_str(), "5");
    }

    #[tokio::test]
    async fn missing_preferences_answer_not_found() {
        let service = MockNotificationService::new();
        match service.fetch_preferences().await.unwrap_err() {
            RemoteError::UnexpectedStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
