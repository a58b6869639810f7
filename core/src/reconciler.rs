//! Feed reconciliation
//!
//! [`Reconciler`] is the only code that mutates the in-memory feed, the unread
//! count and the delivery cursor. It never talks to the network or the cache;
//! it reports which item, if any, deserves a toast and whether the cursor moved
//! so the coordinator can persist it.

use crate::cursor::DeliveryCursor;
use schema::{NewLocalNotification, Notification, NotificationId};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// What a feed mutation produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    /// Item to evaluate against preferences for a toast
    pub toast_candidate: Option<Notification>,
    /// Whether the delivery cursor moved and should be persisted
    pub cursor_advanced: bool,
}

/// Result of marking a single notification read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkRead {
    /// The item was unread and is now read; the count dropped by one
    Updated,
    /// The item was already read; nothing changed
    AlreadyRead,
    /// The item is outside the loaded page; only the remote can update it
    NotLoaded,
}

#[derive(Debug, Default)]
pub struct Reconciler {
    feed: Vec<Notification>,
    unread_count: u32,
    cursor: DeliveryCursor,
}

impl Reconciler {
    pub fn new(cursor: DeliveryCursor) -> Self {
        Self {
            feed: Vec::new(),
            unread_count: 0,
            cursor,
        }
    }

    /// Newest-first feed
    pub fn feed(&self) -> &[Notification] {
        &self.feed
    }

    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    pub fn cursor(&self) -> &DeliveryCursor {
        &self.cursor
    }

    pub fn contains(&self, id: &NotificationId) -> bool {
        self.feed.iter().any(|n| &n.id == id)
    }

    /// Replace the feed with a freshly fetched page.
    ///
    /// The toast candidate is the newest item that is unread, is not the
    /// cursor, and was not already in the previous feed. Only considered when
    /// `surface_toast` is set.
    pub fn replace_feed(&mut self, items: Vec<Notification>, surface_toast: bool) -> Reconciled {
        let mut outcome = Reconciled::default();

        if surface_toast {
            let known: HashSet<&NotificationId> = self.feed.iter().map(|n| &n.id).collect();
            outcome.toast_candidate = items
                .iter()
                .find(|n| !n.read && !self.cursor.matches(&n.id) && !known.contains(&n.id))
                .cloned();
        }

        if let Some(newest) = items.first() {
            outcome.cursor_advanced = self.cursor.advance(&newest.id);
        }

        debug!(
            "Feed replaced with {} items (toast candidate: {:?})",
            items.len(),
            outcome.toast_candidate.as_ref().map(|n| &n.id)
        );
        self.feed = items;
        outcome
    }

    /// Insert a single new item at the front and bump the unread count.
    ///
    /// An item whose id is already in the feed is ignored.
    pub fn prepend(&mut self, item: Notification) -> Reconciled {
        if self.contains(&item.id) {
            debug!("Notification {} already in feed, ignoring", item.id);
            return Reconciled::default();
        }
        self.unread_count = self.unread_count.saturating_add(1);
        self.feed.insert(0, item.clone());
        Reconciled {
            toast_candidate: Some(item),
            cursor_advanced: false,
        }
    }

    /// Raise a notification on the client and prepend it.
    pub fn trigger_local(&mut self, new: NewLocalNotification) -> (Notification, Reconciled) {
        let notification = new.into_notification(NotificationId::local(Uuid::new_v4()));
        let outcome = self.prepend(notification.clone());
        (notification, outcome)
    }

    /// Mark one item read. The count only drops for an item that was unread.
    pub fn mark_read(&mut self, id: &NotificationId) -> MarkRead {
        match self.feed.iter_mut().find(|n| &n.id == id) {
            Some(item) if item.read => MarkRead::AlreadyRead,
            Some(item) => {
                item.read = true;
                self.unread_count = self.unread_count.saturating_sub(1);
                MarkRead::Updated
            }
            None => MarkRead::NotLoaded,
        }
    }

    pub fn mark_all_read(&mut self) {
        for item in &mut self.feed {
            item.read = true;
        }
        self.unread_count = 0;
    }

    /// Authoritative count from the server
    pub fn set_unread_count(&mut self, count: u32) {
        self.unread_count = count;
    }

    /// Drop the feed and count; the cursor survives.
    pub fn clear(&mut self) {
        self.feed.clear();
        self.unread_count = 0;
    }
}
