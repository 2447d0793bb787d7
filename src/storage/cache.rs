//! Ticket cache with LRU eviction and a time-to-live
//!
//! Entries are projections of the authoritative store. A `put` never replaces a
//! cached ticket with an older version, so a slow reader repopulating the cache
//! cannot overwrite a fresher write. Invalidation leaves a tombstone carrying
//! the version floor, which keeps that guarantee when the fresher write never
//! reached the cache.

use crate::common::traits::TicketCache;
use crate::common::types::TicketId;
use crate::config::CacheSettings;
use crate::errors::StorageError;
use crate::ledger::Ticket;
use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct CacheEntry {
    /// `None` marks a tombstone
    ticket: Option<Ticket>,
    version: u64,
    inserted_at: Instant,
}

impl CacheEntry {
    fn live(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() <= ttl
    }
}

/// In-process TTL ticket cache
pub struct TtlTicketCache {
    entries: Mutex<LruCache<TicketId, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub capacity: usize,
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl TtlTicketCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.capacity, Duration::from_secs(settings.ttl_secs))
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<TicketId, CacheEntry>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("ticket cache lock poisoned".to_string()))
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> Result<usize, StorageError> {
        let mut entries = self.lock()?;
        let expired: Vec<TicketId> = entries
            .iter()
            .filter(|(_, entry)| !entry.live(self.ttl))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            entries.pop(id);
        }
        Ok(expired.len())
    }

    pub fn stats(&self) -> CacheStats {
        let (capacity, size) = match self.entries.lock() {
            Ok(entries) => (entries.cap().get(), entries.len()),
            Err(_) => (0, 0),
        };
        CacheStats {
            capacity,
            size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl TicketCache for TtlTicketCache {
    async fn get(&self, id: &TicketId) -> Result<Option<Ticket>, StorageError> {
        let mut entries = self.lock()?;

        let expired = match entries.get(id) {
            Some(entry) if entry.live(self.ttl) => {
                if let Some(ticket) = &entry.ticket {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(ticket.clone()));
                }
                false
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(id);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn put(&self, ticket: &Ticket) -> Result<(), StorageError> {
        let mut entries = self.lock()?;

        if let Some(existing) = entries.peek(&ticket.id) {
            if existing.version > ticket.version && existing.live(self.ttl) {
                return Ok(());
            }
        }

        entries.put(
            ticket.id.clone(),
            CacheEntry {
                ticket: Some(ticket.clone()),
                version: ticket.version,
                inserted_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn invalidate(&self, id: &TicketId, version: u64) -> Result<(), StorageError> {
        let mut entries = self.lock()?;
        let floor = match entries.peek(id) {
            Some(existing) if existing.live(self.ttl) => existing.version.max(version),
            _ => version,
        };
        entries.put(
            id.clone(),
            CacheEntry {
                ticket: None,
                version: floor,
                inserted_at: Instant::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::sample_ticket;

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = TtlTicketCache::new(10, Duration::from_secs(60));
        let ticket = sample_ticket("t-1");

        cache.put(&ticket).await.unwrap();
        assert_eq!(cache.get(&ticket.id).await.unwrap(), Some(ticket.clone()));

        cache.invalidate(&ticket.id, ticket.version).await.unwrap();
        assert_eq!(cache.get(&ticket.id).await.unwrap(), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_older_version_never_replaces_newer() {
        let cache = TtlTicketCache::new(10, Duration::from_secs(60));
        let mut newer = sample_ticket("t-1");
        newer.version = 3;
        let mut older = newer.clone();
        older.version = 2;

        cache.put(&newer).await.unwrap();
        cache.put(&older).await.unwrap();

        assert_eq!(cache.get(&newer.id).await.unwrap().unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_invalidation_keeps_version_floor() {
        let cache = TtlTicketCache::new(10, Duration::from_secs(60));
        let stale = sample_ticket("t-1");
        let mut fresh = stale.clone();
        fresh.version = 1;

        // the v1 write never reached the cache, only its invalidation did
        cache.invalidate(&fresh.id, fresh.version).await.unwrap();
        cache.put(&stale).await.unwrap();
        assert_eq!(cache.get(&stale.id).await.unwrap(), None);

        cache.put(&fresh).await.unwrap();
        assert_eq!(cache.get(&fresh.id).await.unwrap(), Some(fresh));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = TtlTicketCache::new(10, Duration::from_millis(10));
        let ticket = sample_ticket("t-1");
        cache.put(&ticket).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get(&ticket.id).await.unwrap(), None);
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test]
    async fn test_lru_eviction_and_purge() {
        let cache = TtlTicketCache::new(2, Duration::from_millis(10));
        for id in ["a", "b", "c"] {
            cache.put(&sample_ticket(id)).await.unwrap();
        }
        assert_eq!(cache.stats().size, 2);
        assert_eq!(cache.get(&sample_ticket("a").id).await.unwrap(), None);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.purge_expired().unwrap(), 2);
    }
}
