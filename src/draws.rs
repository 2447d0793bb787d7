//! Draw result store
//!
//! One immutable result per (product, issue). The only later write is the
//! settlement outcome (prize tiers and totals) filled in once by the engine.

use crate::common::traits::Clock;
use crate::common::types::{IssueId, Money};
use crate::errors::{LedgerError, LedgerResult, StorageError, ValidationError};
use crate::metrics::LedgerMetrics;
use crate::products::{BetFormatRegistry, LotteryProduct};
use crate::storage::StorageGateway;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Aggregated outcome of one prize level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeTier {
    pub label: String,
    /// Winning single bets, multiples included
    pub winner_count: u64,
    pub per_winner_amount: Money,
    pub total_amount: Money,
}

/// Official result of one draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub id: String,
    pub product: LotteryProduct,
    pub issue: IssueId,
    pub drawn_at: DateTime<Utc>,
    /// Flat sequence, zones in product order
    pub winning_numbers: Vec<u32>,
    pub jackpot: Money,
    /// Filled by settlement, best tier first
    #[serde(default)]
    pub tiers: Vec<PrizeTier>,
    #[serde(default)]
    pub total_payout: Money,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

impl DrawResult {
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}

pub struct DrawResultStore {
    registry: BetFormatRegistry,
    gateway: Arc<StorageGateway>,
    clock: Arc<dyn Clock>,
    metrics: Arc<LedgerMetrics>,
}

impl DrawResultStore {
    pub fn new(
        registry: BetFormatRegistry,
        gateway: Arc<StorageGateway>,
        clock: Arc<dyn Clock>,
        metrics: Arc<LedgerMetrics>,
    ) -> Self {
        Self {
            registry,
            gateway,
            clock,
            metrics,
        }
    }

    /// Record the official result, `DuplicateResult` if one already exists
    pub async fn record(
        &self,
        product: LotteryProduct,
        issue: IssueId,
        winning_numbers: Vec<u32>,
        jackpot: Money,
    ) -> LedgerResult<DrawResult> {
        if jackpot.is_negative() {
            return Err(ValidationError::InvalidJackpot(jackpot.to_string()).into());
        }
        self.registry.validate_draw(product, &winning_numbers)?;

        let result = DrawResult {
            id: Uuid::new_v4().to_string(),
            product,
            issue,
            drawn_at: self.clock.now(),
            winning_numbers,
            jackpot,
            tiers: Vec::new(),
            total_payout: Money::ZERO,
            settled_at: None,
        };

        match self.gateway.save_draw_result(&result).await {
            Ok(()) => {}
            Err(LedgerError::Storage(StorageError::AlreadyExists(_))) => {
                return Err(LedgerError::DuplicateResult {
                    product,
                    issue: result.issue.to_string(),
                });
            }
            Err(e) => return Err(e),
        }

        self.metrics.record_draw();
        info!(
            product = %product,
            issue = %result.issue,
            jackpot = %result.jackpot,
            "Draw result recorded"
        );
        Ok(result)
    }

    pub async fn get(&self, product: LotteryProduct, issue: &IssueId) -> LedgerResult<DrawResult> {
        self.gateway
            .find_draw_result(product, issue)
            .await?
            .ok_or_else(|| LedgerError::draw_not_found(product, issue.as_str()))
    }

    /// Whether a result exists for the pair
    pub async fn exists(&self, product: LotteryProduct, issue: &IssueId) -> LedgerResult<bool> {
        Ok(self.gateway.find_draw_result(product, issue).await?.is_some())
    }

    /// Results of one product, newest first
    pub async fn list(&self, product: LotteryProduct) -> LedgerResult<Vec<DrawResult>> {
        self.gateway.list_draw_results(product).await
    }

    /// Attach the settlement outcome to a recorded result
    pub async fn complete_settlement(
        &self,
        result: &DrawResult,
        tiers: Vec<PrizeTier>,
        total_payout: Money,
    ) -> LedgerResult<DrawResult> {
        let mut settled = result.clone();
        settled.tiers = tiers;
        settled.total_payout = total_payout;
        settled.settled_at = Some(self.clock.now());

        self.gateway.complete_draw_settlement(&settled).await?;
        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::SystemClock;
    use crate::storage::MemoryStore;

    fn store() -> DrawResultStore {
        let metrics = Arc::new(LedgerMetrics::new());
        let gateway = Arc::new(StorageGateway::new(Arc::new(MemoryStore::new()), metrics.clone()));
        DrawResultStore::new(BetFormatRegistry::default(), gateway, Arc::new(SystemClock), metrics)
    }

    fn issue(s: &str) -> IssueId {
        IssueId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_record_and_get() {
        let store = store();
        let recorded = store
            .record(LotteryProduct::DoubleBall, issue("2024001"), vec![1, 2, 3, 4, 5, 6, 7], Money::from_major(1_000))
            .await
            .unwrap();

        let loaded = store.get(LotteryProduct::DoubleBall, &issue("2024001")).await.unwrap();
        assert_eq!(loaded, recorded);
        assert!(!loaded.is_settled());
    }

    #[tokio::test]
    async fn test_duplicate_is_rejected_and_first_kept() {
        let store = store();
        let first = store
            .record(LotteryProduct::ArrangeV3, issue("2024001"), vec![4, 2, 9], Money::ZERO)
            .await
            .unwrap();

        let err = store
            .record(LotteryProduct::ArrangeV3, issue("2024001"), vec![1, 1, 1], Money::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateResult { .. }));

        let kept = store.get(LotteryProduct::ArrangeV3, &issue("2024001")).await.unwrap();
        assert_eq!(kept, first);

        // same issue on another product is independent
        assert!(store
            .record(LotteryProduct::Welfare3D, issue("2024001"), vec![1, 1, 1], Money::ZERO)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_invalid_results_are_rejected() {
        let store = store();
        let err = store
            .record(LotteryProduct::ArrangeV3, issue("2024001"), vec![4, 2], Money::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ValidationError::InvalidFieldCount { .. })));

        let err = store
            .record(LotteryProduct::ArrangeV3, issue("2024001"), vec![4, 2, 9], Money::from_minor(-1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ValidationError::InvalidJackpot(_))));
    }

    #[tokio::test]
    async fn test_missing_result() {
        let err = store().get(LotteryProduct::Happy8, &issue("1")).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = store();
        for n in ["2024001", "2024002", "2024003"] {
            store
                .record(LotteryProduct::SingleMatch, issue(n), vec![3], Money::ZERO)
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        let issues: Vec<String> = store
            .list(LotteryProduct::SingleMatch)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.issue.to_string())
            .collect();
        assert_eq!(issues, vec!["2024003", "2024002", "2024001"]);
    }

    #[tokio::test]
    async fn test_complete_settlement_once() {
        let store = store();
        let result = store
            .record(LotteryProduct::SingleMatch, issue("1"), vec![3], Money::ZERO)
            .await
            .unwrap();
        let tiers = vec![PrizeTier {
            label: "first".to_string(),
            winner_count: 2,
            per_winner_amount: Money::from_major(5),
            total_amount: Money::from_major(10),
        }];

        let settled = store
            .complete_settlement(&result, tiers.clone(), Money::from_major(10))
            .await
            .unwrap();
        assert!(settled.is_settled());

        // a second completion leaves the first outcome in place
        store.complete_settlement(&result, Vec::new(), Money::ZERO).await.unwrap();
        let loaded = store.get(LotteryProduct::SingleMatch, &issue("1")).await.unwrap();
        assert_eq!(loaded.tiers, tiers);
        assert_eq!(loaded.total_payout, Money::from_major(10));
    }
}
