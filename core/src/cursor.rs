//! Delivery cursor: the newest notification id already shown to the user

use callsheet_cache::{CacheError, LocalCache, CURSOR_KEY};
use schema::NotificationId;
use tracing::debug;

/// Identifier of the newest notification observed across sessions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryCursor {
    last_seen: Option<NotificationId>,
}

impl DeliveryCursor {
    pub fn new(last_seen: Option<NotificationId>) -> Self {
        Self { last_seen }
    }

    /// Read the persisted cursor. An absent or blank entry is an unset cursor.
    pub async fn restore(cache: &dyn LocalCache) -> Result<Self, CacheError> {
        let last_seen = cache
            .get(CURSOR_KEY)
            .await?
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(NotificationId::new);
        debug!("Restored delivery cursor {:?}", last_seen);
        Ok(Self { last_seen })
    }

    pub fn last_seen(&self) -> Option<&NotificationId> {
        self.last_seen.as_ref()
    }

    pub fn matches(&self, id: &NotificationId) -> bool {
        self.last_seen.as_ref() == Some(id)
    }

    /// Move the cursor to `id`; returns whether it changed.
    pub fn advance(&mut self, id: &NotificationId) -> bool {
        if self.matches(id) {
            return false;
        }
        self.last_seen = Some(id.clone());
        true
    }

    /// Write the cursor; an unset cursor removes the entry.
    pub async fn persist(&self, cache: &dyn LocalCache) -> Result<(), CacheError> {
        match &self.last_seen {
            Some(id) => cache.set(CURSOR_KEY, id.as_str()).await,
            None => cache.remove(CURSOR_KEY).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsheet_cache::MemoryCache;

    #[tokio::test]
    async fn restore_treats_blank_as_unset() {
        let cache = MemoryCache::with_entries([(CURSOR_KEY, "  ")]);
        let cursor = DeliveryCursor::restore(&cache).await.unwrap();
        assert_eq!(cursor.last_seen(), None);
    }

    #[tokio::test]
    async fn advance_and_persist() {
        let cache = MemoryCache::new();
        let mut cursor = DeliveryCursor::default();
        assert!(cursor.advance(&NotificationId::new("9")));
        assert!(!cursor.advance(&NotificationId::new("9")));
        cursor.persist(&cache).await.unwrap();

        let restored = DeliveryCursor::restore(&cache).await.unwrap();
        assert!(restored.matches(&NotificationId::new("9")));
        assert_eq!(restored, cursor);
    }
}
