//! Feed fetching with stale-result protection
//!
//! Every fetch gets a sequence number. A result is applied only when its
//! sequence is newer than the last applied one and newer than the barrier,
//! which is raised past every issued sequence whenever state changes outside
//! the fetch path (a push, a local notification, the end of a session).

use crate::remote::{NotificationService, RemoteResult};
use schema::{FeedPage, UnreadCount};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Identifies one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    /// Whether the resulting page may surface a toast
    pub surface_toast: bool,
}

/// Both halves of a fetch; they fail independently
#[derive(Debug)]
pub struct FetchOutcome {
    pub ticket: FetchTicket,
    pub feed: RemoteResult<FeedPage>,
    pub unread: RemoteResult<UnreadCount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchVerdict {
    Apply,
    Stale,
}

/// Sequence bookkeeping, independent of any I/O
#[derive(Debug, Default)]
pub struct FetchGuard {
    issued: u64,
    last_applied: u64,
    barrier: u64,
    in_flight: BTreeSet<u64>,
}

impl FetchGuard {
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.in_flight.insert(self.issued);
        self.issued
    }

    /// Record completion of `seq` and decide whether to apply it.
    pub fn complete(&mut self, seq: u64) -> FetchVerdict {
        self.in_flight.remove(&seq);
        if seq <= self.last_applied || seq <= self.barrier {
            return FetchVerdict::Stale;
        }
        self.last_applied = seq;
        FetchVerdict::Apply
    }

    /// Make every fetch issued so far stale.
    pub fn invalidate(&mut self) {
        self.barrier = self.issued;
    }

    pub fn is_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }
}

/// Issues fetches against the remote service
pub struct Fetcher {
    service: Arc<dyn NotificationService>,
    page_size: u32,
    guard: FetchGuard,
}

impl Fetcher {
    pub fn new(service: Arc<dyn NotificationService>, page_size: u32) -> Self {
        Self {
            service,
            page_size,
            guard: FetchGuard::default(),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn is_in_flight(&self) -> bool {
        self.guard.is_in_flight()
    }

    /// Start a fetch. The returned future requests the feed page and the
    /// unread count concurrently and owns everything it needs.
    pub fn begin(&mut self, surface_toast: bool) -> impl Future<Output = FetchOutcome> + Send + 'static {
        let ticket = FetchTicket {
            seq: self.guard.issue(),
            surface_toast,
        };
        debug!("Issuing fetch #{} (surface toast: {})", ticket.seq, surface_toast);
        let service = Arc::clone(&self.service);
        let limit = self.page_size;

        async move {
            let (feed, unread) = tokio::join!(service.fetch_feed(limit), service.fetch_unread_count());
            FetchOutcome { ticket, feed, unread }
        }
    }

    /// Record a finished fetch; pages larger than the page size are truncated.
    pub fn complete(&mut self, outcome: &mut FetchOutcome) -> FetchVerdict {
        if let Ok(page) = outcome.feed.as_mut() {
            page.items.truncate(self.page_size as usize);
        }
        self.guard.complete(outcome.ticket.seq)
    }

    pub fn invalidate(&mut self) {
        self.guard.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockNotificationService;
    use schema::{Notification, NotificationKind};

    #[test]
    fn older_result_after_newer_is_stale() {
        let mut guard = FetchGuard::default();
        let first = guard.issue();
        let second = guard.issue();
        assert!(guard.is_in_flight());
        assert_eq!(guard.complete(second), FetchVerdict::Apply);
        assert_eq!(guard.complete(first), FetchVerdict::Stale);
        assert!(!guard.is_in_flight());
        assert_eq!(guard.last_applied(), second);
    }

    #[test]
    fn invalidate_discards_everything_issued() {
        let mut guard = FetchGuard::default();
        let first = guard.issue();
        guard.invalidate();
        let second = guard.issue();
        assert_eq!(guard.complete(first), FetchVerdict::Stale);
        assert_eq!(guard.complete(second), FetchVerdict::Apply);
    }

    #[tokio::test]
    async fn outcome_carries_both_halves() {
        let service = MockNotificationService::new();
        service
            .set_feed(
                (1..=4u64)
                    .rev()
                    .map(|i| Notification::new(i, NotificationKind::NewFollower, "f"))
                    .collect(),
            )
            .await;
        service.set_unread_count(9).await;

        let mut fetcher = Fetcher::new(Arc::new(service), 2);
        let mut outcome = fetcher.begin(true).await;
        assert_eq!(outcome.ticket.seq, 1);
        assert!(outcome.ticket.surface_toast);
        assert_eq!(fetcher.complete(&mut outcome), FetchVerdict::Apply);
        assert_eq!(outcome.feed.unwrap().items.len(), 2);
        assert_eq!(outcome.unread.unwrap().count, 9);
        assert!(!fetcher.is_in_flight());
    }

    #[tokio::test]
    async fn unreachable_service_fails_both_halves() {
        let service = MockNotificationService::unreachable().await;
        let mut fetcher = Fetcher::new(Arc::new(service), 20);
        let mut outcome = fetcher.begin(false).await;
        assert_eq!(fetcher.complete(&mut outcome), FetchVerdict::Apply);
        assert!(outcome.feed.is_err());
        assert!(outcome.unread.is_err());
    }
}
