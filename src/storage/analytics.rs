//! Analytical store propagation
//!
//! Writes reach the analytics sink through a bounded queue drained by a
//! background task. Publishing never blocks and never fails the caller; a full
//! queue, a failing sink or a sink call past its timeout only costs a warning
//! and a metric.

use crate::common::traits::AnalyticsSink;
use crate::common::types::{IssueId, Money, TicketId, UserId};
use crate::errors::StorageError;
use crate::ledger::{Ticket, TicketStatus};
use crate::metrics::LedgerMetrics;
use crate::products::LotteryProduct;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Copy of an authoritative write, as seen by the analytical store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    TicketPlaced {
        ticket_id: TicketId,
        user_id: UserId,
        product: LotteryProduct,
        stake: Money,
    },
    TicketSettled {
        ticket_id: TicketId,
        user_id: UserId,
        product: LotteryProduct,
        status: TicketStatus,
        payout: Money,
    },
    TicketClaimed {
        ticket_id: TicketId,
        user_id: UserId,
        product: LotteryProduct,
        payout: Money,
    },
    DrawRecorded {
        product: LotteryProduct,
        issue: IssueId,
        jackpot: Money,
    },
}

impl LedgerEvent {
    pub fn placed(ticket: &Ticket) -> Self {
        LedgerEvent::TicketPlaced {
            ticket_id: ticket.id.clone(),
            user_id: ticket.user_id.clone(),
            product: ticket.product,
            stake: ticket.stake,
        }
    }

    /// Event for a ticket that just left `Pending` or became `Claimed`
    pub fn for_update(ticket: &Ticket) -> Option<Self> {
        match ticket.status {
            TicketStatus::Pending => None,
            TicketStatus::Won | TicketStatus::Lost => Some(LedgerEvent::TicketSettled {
                ticket_id: ticket.id.clone(),
                user_id: ticket.user_id.clone(),
                product: ticket.product,
                status: ticket.status,
                payout: ticket.payout,
            }),
            TicketStatus::Claimed => Some(LedgerEvent::TicketClaimed {
                ticket_id: ticket.id.clone(),
                user_id: ticket.user_id.clone(),
                product: ticket.product,
                payout: ticket.payout,
            }),
        }
    }
}

/// Aggregates of one user on one product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProductStats {
    pub product: LotteryProduct,
    pub tickets: u64,
    pub total_staked: Money,
    pub tickets_won: u64,
    pub tickets_lost: u64,
    pub total_won: Money,
    pub tickets_claimed: u64,
    pub total_claimed: Money,
}

impl UserProductStats {
    pub fn new(product: LotteryProduct) -> Self {
        Self {
            product,
            tickets: 0,
            total_staked: Money::ZERO,
            tickets_won: 0,
            tickets_lost: 0,
            total_won: Money::ZERO,
            tickets_claimed: 0,
            total_claimed: Money::ZERO,
        }
    }
}

/// Process-scoped aggregation state
///
/// Created explicitly and handed to the service; `export` and `reset` are the
/// only ways to read or clear it in bulk.
#[derive(Debug, Default)]
pub struct InMemoryAnalytics {
    per_user: DashMap<(UserId, LotteryProduct), UserProductStats>,
    draws: DashMap<LotteryProduct, u64>,
}

impl InMemoryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::TicketPlaced { user_id, product, stake, .. } => {
                let mut stats = self.entry(user_id, *product);
                stats.tickets += 1;
                stats.total_staked = stats.total_staked.saturating_add(*stake);
            }
            LedgerEvent::TicketSettled {
                user_id,
                product,
                status,
                payout,
                ..
            } => {
                let mut stats = self.entry(user_id, *product);
                if *status == TicketStatus::Won {
                    stats.tickets_won += 1;
                    stats.total_won = stats.total_won.saturating_add(*payout);
                } else {
                    stats.tickets_lost += 1;
                }
            }
            LedgerEvent::TicketClaimed { user_id, product, payout, .. } => {
                let mut stats = self.entry(user_id, *product);
                stats.tickets_claimed += 1;
                stats.total_claimed = stats.total_claimed.saturating_add(*payout);
            }
            LedgerEvent::DrawRecorded { product, .. } => {
                *self.draws.entry(*product).or_insert(0) += 1;
            }
        }
    }

    fn entry(
        &self,
        user: &UserId,
        product: LotteryProduct,
    ) -> dashmap::mapref::one::RefMut<'_, (UserId, LotteryProduct), UserProductStats> {
        self.per_user
            .entry((user.clone(), product))
            .or_insert_with(|| UserProductStats::new(product))
    }

    /// Snapshot of one user's aggregates, ordered by product
    pub fn snapshot_user(&self, user: &UserId) -> Vec<UserProductStats> {
        let mut stats: Vec<UserProductStats> = self
            .per_user
            .iter()
            .filter(|e| &e.key().0 == user)
            .map(|e| e.value().clone())
            .collect();
        stats.sort_by_key(|s| s.product);
        stats
    }

    /// Every aggregate row, ordered by user then product
    pub fn export(&self) -> Vec<(UserId, UserProductStats)> {
        let mut rows: Vec<(UserId, UserProductStats)> = self
            .per_user
            .iter()
            .map(|e| (e.key().0.clone(), e.value().clone()))
            .collect();
        rows.sort_by(|a, b| (&a.0, a.1.product).cmp(&(&b.0, b.1.product)));
        rows
    }

    pub fn draws_recorded(&self, product: LotteryProduct) -> u64 {
        self.draws.get(&product).map(|c| *c).unwrap_or(0)
    }

    pub fn reset(&self) {
        self.per_user.clear();
        self.draws.clear();
    }
}

#[async_trait]
impl AnalyticsSink for InMemoryAnalytics {
    async fn record(&self, event: &LedgerEvent) -> Result<(), StorageError> {
        self.apply(event);
        Ok(())
    }

    async fn user_stats(&self, user: &UserId) -> Result<Vec<UserProductStats>, StorageError> {
        Ok(self.snapshot_user(user))
    }
}

enum AnalyticsMessage {
    Event(LedgerEvent),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background propagation task
#[derive(Clone)]
pub struct AnalyticsPipeline {
    tx: mpsc::Sender<AnalyticsMessage>,
    sink: Arc<dyn AnalyticsSink>,
    timeout: Duration,
    metrics: Arc<LedgerMetrics>,
}

impl AnalyticsPipeline {
    /// Start the worker; must be called inside a tokio runtime.
    ///
    /// Each sink call is cut off after `timeout` and its event dropped.
    pub fn spawn(
        sink: Arc<dyn AnalyticsSink>,
        capacity: usize,
        timeout: Duration,
        metrics: Arc<LedgerMetrics>,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));
        let worker_sink = sink.clone();
        let worker_metrics = metrics.clone();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    AnalyticsMessage::Event(event) => {
                        let recorded = tokio::time::timeout(timeout, worker_sink.record(&event)).await;
                        match recorded {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                worker_metrics.record_analytics_dropped();
                                warn!(error = %e, ?event, "Analytics sink rejected event");
                            }
                            Err(_) => {
                                worker_metrics.record_analytics_dropped();
                                warn!(after_ms = timeout.as_millis() as u64, ?event, "Analytics sink timed out");
                            }
                        }
                    }
                    AnalyticsMessage::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Analytics worker stopped");
        });

        Self {
            tx,
            sink,
            timeout,
            metrics,
        }
    }

    /// Queue an event without waiting
    pub fn publish(&self, event: LedgerEvent) {
        if let Err(e) = self.tx.try_send(AnalyticsMessage::Event(event)) {
            self.metrics.record_analytics_dropped();
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "worker stopped",
            };
            warn!(reason, "Dropping analytics event");
        }
    }

    /// Wait until every event queued before this call has been applied.
    ///
    /// Gives up after the sink timeout and returns `false`.
    pub async fn flush(&self) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        let drained = async {
            self.tx.send(AnalyticsMessage::Flush(done_tx)).await.is_ok() && done_rx.await.is_ok()
        };
        match tokio::time::timeout(self.timeout, drained).await {
            Ok(drained) => drained,
            Err(_) => {
                warn!(after_ms = self.timeout.as_millis() as u64, "Analytics flush timed out");
                false
            }
        }
    }

    pub async fn user_stats(&self, user: &UserId) -> Result<Vec<UserProductStats>, StorageError> {
        self.sink.user_stats(user).await
    }
}
