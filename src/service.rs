//! Service facade
//!
//! `LotteryService` is the entry point for the presentation layer. It only
//! sequences calls into the ledger, the draw result store and the settlement
//! engine; business rules live in those modules. [`ServiceBuilder`] wires the
//! components together from a [`LedgerConfig`] and optional backend overrides.

use crate::common::config::ConfigLoader;
use crate::common::traits::{AnalyticsSink, AuthoritativeStore, Clock, SystemClock, TicketCache, TicketIdSource};
use crate::common::types::{IssueId, Money, TicketId, UserId};
use crate::config::{LedgerConfig, StorageBackend};
use crate::draws::{DrawResult, DrawResultStore};
use crate::errors::{LedgerError, LedgerResult};
use crate::ledger::{BetRequest, Ticket, TicketLedger, TicketStatus, UuidTicketIds};
use crate::metrics::{LedgerMetrics, MetricsSnapshot};
use crate::products::{BetFormatRegistry, LotteryProduct};
use crate::settlement::{SettlementEngine, SettlementSummary};
use crate::storage::{
    AnalyticsPipeline, InMemoryAnalytics, MemoryStore, RetryPolicy, RocksDbStore, StorageGateway, TtlTicketCache,
    UserProductStats,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

pub struct LotteryService {
    config: LedgerConfig,
    gateway: Arc<StorageGateway>,
    ledger: Arc<TicketLedger>,
    draws: Arc<DrawResultStore>,
    engine: Arc<SettlementEngine>,
    metrics: Arc<LedgerMetrics>,
}

impl LotteryService {
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Validate and persist a new ticket.
    ///
    /// Bets on an issue that already has a recorded result are refused with
    /// `IssueClosed`.
    pub async fn place_bet(&self, request: BetRequest) -> LedgerResult<Ticket> {
        if self.draws.exists(request.product, &request.issue).await? {
            return Err(LedgerError::IssueClosed {
                product: request.product,
                issue: request.issue.to_string(),
            });
        }
        self.ledger.create(request).await
    }

    pub async fn get_ticket(&self, id: &TicketId) -> LedgerResult<Ticket> {
        self.ledger.get(id).await
    }

    /// Tickets of a user, newest first
    pub async fn list_tickets_by_user(&self, user: &UserId) -> LedgerResult<Vec<Ticket>> {
        self.ledger.list_by_user(user).await
    }

    /// Record the official result of a draw.
    ///
    /// With `auto_settle_on_result` the issue is settled in a background task;
    /// its outcome is only logged.
    pub async fn record_draw_result(
        &self,
        product: LotteryProduct,
        issue: IssueId,
        winning_numbers: Vec<u32>,
        jackpot: Money,
    ) -> LedgerResult<DrawResult> {
        let result = self.draws.record(product, issue, winning_numbers, jackpot).await?;

        if self.config.settlement.auto_settle_on_result {
            let engine = self.engine.clone();
            let issue = result.issue.clone();
            tokio::spawn(async move {
                match engine.settle_issue(product, &issue).await {
                    Ok(summary) => info!(
                        product = %product,
                        issue = %issue,
                        won = summary.won,
                        lost = summary.lost,
                        "Automatic settlement completed"
                    ),
                    Err(e) => error!(product = %product, issue = %issue, error = %e, "Automatic settlement failed"),
                }
            });
        }

        Ok(result)
    }

    /// Record a result and settle the issue before returning
    pub async fn record_and_settle(
        &self,
        product: LotteryProduct,
        issue: IssueId,
        winning_numbers: Vec<u32>,
        jackpot: Money,
    ) -> LedgerResult<(DrawResult, SettlementSummary)> {
        let recorded = self.draws.record(product, issue, winning_numbers, jackpot).await?;
        let summary = self.engine.settle_issue(product, &recorded.issue).await?;
        let settled = self.draws.get(product, &recorded.issue).await?;
        Ok((settled, summary))
    }

    pub async fn settle_issue(&self, product: LotteryProduct, issue: &IssueId) -> LedgerResult<SettlementSummary> {
        self.engine.settle_issue(product, issue).await
    }

    /// Move a `Won` ticket to `Claimed`, keeping its payout
    pub async fn claim_ticket(&self, id: &TicketId) -> LedgerResult<Ticket> {
        self.ledger.transition(id, TicketStatus::Claimed, Money::ZERO).await
    }

    pub async fn get_draw_result(&self, product: LotteryProduct, issue: &IssueId) -> LedgerResult<DrawResult> {
        self.draws.get(product, issue).await
    }

    /// Results of one product, newest first
    pub async fn list_draw_results(&self, product: LotteryProduct) -> LedgerResult<Vec<DrawResult>> {
        self.draws.list(product).await
    }

    /// Per-product aggregates from the analytical store, possibly stale
    pub async fn user_stats(&self, user: &UserId) -> LedgerResult<Vec<UserProductStats>> {
        self.gateway.user_stats(user).await
    }

    /// Wait for queued analytics events to be applied; gives up after the
    /// store timeout and returns `false`
    pub async fn flush_analytics(&self) -> bool {
        self.gateway.flush_analytics().await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Builds a [`LotteryService`]; must be awaited inside a tokio runtime
#[derive(Default)]
pub struct ServiceBuilder {
    config: Option<LedgerConfig>,
    config_path: Option<PathBuf>,
    store: Option<Arc<dyn AuthoritativeStore>>,
    cache: Option<Arc<dyn TicketCache>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    ids: Option<Arc<dyn TicketIdSource>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from a TOML file instead of the bundled defaults
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Override the authoritative store selected by configuration
    pub fn with_store(mut self, store: Arc<dyn AuthoritativeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn TicketCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_analytics_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    pub fn with_id_source(mut self, ids: Arc<dyn TicketIdSource>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub async fn build(self) -> LedgerResult<LotteryService> {
        let loader = ConfigLoader::new();
        let config = match (self.config, self.config_path) {
            (Some(config), _) => {
                loader.validate(&config)?;
                config
            }
            (None, Some(path)) => loader.with_path(path).load()?,
            (None, None) => loader.load()?,
        };

        let metrics = Arc::new(LedgerMetrics::new());
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self.ids.unwrap_or_else(|| Arc::new(UuidTicketIds));

        let store: Arc<dyn AuthoritativeStore> = match self.store {
            Some(store) => store,
            None => match config.storage.backend {
                StorageBackend::RocksDb => Arc::new(RocksDbStore::open(config.storage.data_path())?),
                StorageBackend::Memory => Arc::new(MemoryStore::new()),
            },
        };
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(TtlTicketCache::from_settings(&config.cache)));

        let mut gateway = StorageGateway::new(store, metrics.clone())
            .with_cache(cache)
            .with_retry(RetryPolicy::from_settings(&config.storage));
        if config.analytics.enabled {
            let sink = self.analytics.unwrap_or_else(|| Arc::new(InMemoryAnalytics::new()));
            gateway = gateway.with_analytics(AnalyticsPipeline::spawn(
                sink,
                config.analytics.queue_capacity,
                config.storage.store_timeout(),
                metrics.clone(),
            ));
        }
        let gateway = Arc::new(gateway);

        let registry = BetFormatRegistry::new(config.limits);
        let ledger = Arc::new(TicketLedger::new(
            registry.clone(),
            gateway.clone(),
            ids,
            clock.clone(),
            metrics.clone(),
        ));
        let draws = Arc::new(DrawResultStore::new(registry, gateway.clone(), clock.clone(), metrics.clone()));
        let engine = Arc::new(SettlementEngine::new(
            ledger.clone(),
            draws.clone(),
            gateway.clone(),
            config.prize_tables.clone(),
            config.settlement.clone(),
            clock,
            metrics.clone(),
        ));

        info!(
            backend = gateway.backend_name(),
            analytics = config.analytics.enabled,
            auto_settle = config.settlement.auto_settle_on_result,
            "Lottery service ready"
        );

        Ok(LotteryService {
            config,
            gateway,
            ledger,
            draws,
            engine,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::ConfigBuilder;
    use crate::products::BetType;

    async fn service() -> LotteryService {
        ServiceBuilder::new()
            .with_config(ConfigBuilder::bundled().unwrap().in_memory().build())
            .build()
            .await
            .unwrap()
    }

    fn bet(issue: &str) -> BetRequest {
        BetRequest {
            user_id: UserId::parse("alice").unwrap(),
            product: LotteryProduct::ArrangeV3,
            bet_type: BetType::Direct,
            numbers: vec![vec![4, 2, 9]],
            multiple: 1,
            stake: Money::from_major(2),
            issue: IssueId::parse(issue).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_closed_issue_refuses_bets() {
        let service = service().await;
        service.place_bet(bet("2024001")).await.unwrap();
        service
            .record_draw_result(LotteryProduct::ArrangeV3, IssueId::parse("2024001").unwrap(), vec![1, 2, 3], Money::ZERO)
            .await
            .unwrap();

        let err = service.place_bet(bet("2024001")).await.unwrap_err();
        assert!(matches!(err, LedgerError::IssueClosed { .. }));
        assert!(service.place_bet(bet("2024002")).await.is_ok());
    }

    #[tokio::test]
    async fn test_record_and_settle_returns_settled_result() {
        let service = service().await;
        let ticket = service.place_bet(bet("2024001")).await.unwrap();

        let (result, summary) = service
            .record_and_settle(LotteryProduct::ArrangeV3, IssueId::parse("2024001").unwrap(), vec![4, 2, 9], Money::ZERO)
            .await
            .unwrap();

        assert!(result.is_settled());
        assert_eq!(summary.won, 1);
        assert_eq!(result.total_payout, Money::from_minor(104_000));

        let claimed = service.claim_ticket(&ticket.id).await.unwrap();
        assert_eq!(claimed.status, TicketStatus::Claimed);
        assert_eq!(claimed.payout, Money::from_minor(104_000));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = ConfigBuilder::bundled().unwrap().in_memory().build();
        config.settlement.lease_ttl_secs = 5;
        let err = ServiceBuilder::new().with_config(config).build().await.err().unwrap();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }
}
