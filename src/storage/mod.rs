//! Storage layer
//!
//! [`StorageGateway`] is the only way the rest of the crate reaches a store. It
//! fronts an [`AuthoritativeStore`](crate::common::traits::AuthoritativeStore)
//! (RocksDB or in-memory), an optional ticket cache and an optional analytics
//! pipeline.

pub mod analytics;
pub mod cache;
pub mod gateway;
pub mod memory;
pub mod retry;
pub mod rocks;

pub use analytics::{AnalyticsPipeline, InMemoryAnalytics, LedgerEvent, UserProductStats};
pub use cache::{CacheStats, TtlTicketCache};
pub use gateway::StorageGateway;
pub use memory::MemoryStore;
pub use retry::RetryPolicy;
pub use rocks::RocksDbStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Listing order every backend follows: newest microsecond first, then ascending key
pub(crate) fn newest_first<K: Ord>(a: (DateTime<Utc>, &K), b: (DateTime<Utc>, &K)) -> Ordering {
    b.0.timestamp_micros()
        .cmp(&a.0.timestamp_micros())
        .then_with(|| a.1.cmp(b.1))
}

/// Expiring ownership record used as the settlement marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub holder: String,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    /// Live and owned by someone other than `holder`
    pub fn is_held_by_other(&self, holder: &str, now: DateTime<Utc>) -> bool {
        self.holder != holder && self.expires_at > now
    }
}
