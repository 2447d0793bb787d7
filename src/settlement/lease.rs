//! Settlement lease
//!
//! At most one settlement run per (product, issue). The lease lives in the
//! authoritative store so it holds across processes, and it expires so a
//! crashed run does not block the issue forever.

use crate::common::types::IssueId;
use crate::errors::LedgerResult;
use crate::products::LotteryProduct;
use crate::storage::StorageGateway;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

pub fn lease_key(product: LotteryProduct, issue: &IssueId) -> String {
    format!("settlement:{}:{}", product.code(), issue)
}

/// Held lease; hand it back with [`SettlementLease::release`]
#[derive(Debug)]
pub struct SettlementLease {
    key: String,
    holder: String,
    expires_at: DateTime<Utc>,
}

impl SettlementLease {
    /// `Ok(None)` when a live lease belongs to another run
    pub async fn acquire(
        gateway: &StorageGateway,
        product: LotteryProduct,
        issue: &IssueId,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Self>> {
        let lease = Self {
            key: lease_key(product, issue),
            holder: Uuid::new_v4().to_string(),
            expires_at: now + ttl,
        };

        if gateway.acquire_lease(&lease.key, &lease.holder, lease.expires_at, now).await? {
            Ok(Some(lease))
        } else {
            Ok(None)
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Release errors are logged; the lease then runs out on its own
    pub async fn release(self, gateway: &StorageGateway) {
        if let Err(e) = gateway.release_lease(&self.key, &self.holder).await {
            warn!(key = %self.key, error = %e, "Failed to release settlement lease");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::LedgerMetrics;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn gateway() -> StorageGateway {
        StorageGateway::new(Arc::new(MemoryStore::new()), Arc::new(LedgerMetrics::new()))
    }

    #[tokio::test]
    async fn test_lease_is_exclusive_until_released() {
        let gateway = gateway();
        let issue = IssueId::parse("2024001").unwrap();
        let ttl = chrono::Duration::seconds(60);
        let now = Utc::now();

        let first = SettlementLease::acquire(&gateway, LotteryProduct::DoubleBall, &issue, ttl, now)
            .await
            .unwrap()
            .unwrap();
        assert!(SettlementLease::acquire(&gateway, LotteryProduct::DoubleBall, &issue, ttl, now)
            .await
            .unwrap()
            .is_none());

        // other products are independent
        assert!(SettlementLease::acquire(&gateway, LotteryProduct::SuperLotto, &issue, ttl, now)
            .await
            .unwrap()
            .is_some());

        first.release(&gateway).await;
        assert!(SettlementLease::acquire(&gateway, LotteryProduct::DoubleBall, &issue, ttl, now)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken_over() {
        let gateway = gateway();
        let issue = IssueId::parse("7").unwrap();
        let now = Utc::now();

        let stale = SettlementLease::acquire(&gateway, LotteryProduct::Happy8, &issue, chrono::Duration::seconds(60), now)
            .await
            .unwrap()
            .unwrap();

        let later = now + chrono::Duration::seconds(61);
        let fresh = SettlementLease::acquire(&gateway, LotteryProduct::Happy8, &issue, chrono::Duration::seconds(60), later)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stale.holder(), fresh.holder());

        // the stale holder no longer owns the key, releasing it changes nothing
        stale.release(&gateway).await;
        assert!(SettlementLease::acquire(&gateway, LotteryProduct::Happy8, &issue, chrono::Duration::seconds(60), later)
            .await
            .unwrap()
            .is_none());
    }
}
