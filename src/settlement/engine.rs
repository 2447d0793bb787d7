//! Settlement engine
//!
//! Settles every ticket of one (product, issue) against its recorded draw
//! result. A run classifies all tickets first, prices each tier once the total
//! winner count is known, then moves the still pending tickets to `Won` or
//! `Lost`. Re-running a settled issue writes nothing.

use super::lease::SettlementLease;
use super::matching::{single_bet_signatures, tier_index};
use super::payout::strategy_for;
use crate::common::traits::Clock;
use crate::common::types::{IssueId, Money};
use crate::config::{PrizeTable, SettlementSettings};
use crate::draws::{DrawResult, DrawResultStore, PrizeTier};
use crate::errors::{ConfigurationError, LedgerError, LedgerResult};
use crate::ledger::{Ticket, TicketLedger, TicketStatus};
use crate::metrics::LedgerMetrics;
use crate::products::LotteryProduct;
use crate::storage::StorageGateway;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one settlement request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub product: LotteryProduct,
    pub issue: IssueId,
    /// Tickets found for the issue
    pub examined: usize,
    pub won: usize,
    pub lost: usize,
    /// Tickets that were already settled before this run
    pub skipped: usize,
    pub total_payout: Money,
    pub tiers: Vec<PrizeTier>,
    /// The issue had been settled before, nothing was written
    pub already_settled: bool,
}

impl SettlementSummary {
    fn from_settled(result: &DrawResult) -> Self {
        Self {
            product: result.product,
            issue: result.issue.clone(),
            examined: 0,
            won: 0,
            lost: 0,
            skipped: 0,
            total_payout: result.total_payout,
            tiers: result.tiers.clone(),
            already_settled: true,
        }
    }
}

/// A ticket with its winning single bets per tier index
struct Classified {
    ticket: Ticket,
    wins: Vec<(usize, u64)>,
}

impl Classified {
    fn best_tier(&self) -> Option<usize> {
        self.wins.iter().map(|(tier, _)| *tier).min()
    }

    fn payout(&self, per_winner: &[Money]) -> Money {
        let multiple = u64::from(self.ticket.multiple);
        self.wins.iter().fold(Money::ZERO, |acc, (tier, units)| {
            acc.saturating_add(per_winner[*tier].saturating_mul(units.saturating_mul(multiple)))
        })
    }
}

pub struct SettlementEngine {
    ledger: Arc<TicketLedger>,
    draws: Arc<DrawResultStore>,
    gateway: Arc<StorageGateway>,
    prize_tables: Vec<PrizeTable>,
    settings: SettlementSettings,
    clock: Arc<dyn Clock>,
    metrics: Arc<LedgerMetrics>,
}

impl SettlementEngine {
    pub fn new(
        ledger: Arc<TicketLedger>,
        draws: Arc<DrawResultStore>,
        gateway: Arc<StorageGateway>,
        prize_tables: Vec<PrizeTable>,
        settings: SettlementSettings,
        clock: Arc<dyn Clock>,
        metrics: Arc<LedgerMetrics>,
    ) -> Self {
        Self {
            ledger,
            draws,
            gateway,
            prize_tables,
            settings,
            clock,
            metrics,
        }
    }

    /// Settle all tickets of one issue.
    ///
    /// Fails with `NotFound` when no result is recorded and with
    /// `SettlementAlreadyRunning` while another run holds the lease.
    pub async fn settle_issue(&self, product: LotteryProduct, issue: &IssueId) -> LedgerResult<SettlementSummary> {
        let result = self.draws.get(product, issue).await?;
        if result.is_settled() {
            debug!(product = %product, issue = %issue, "Issue already settled");
            return Ok(SettlementSummary::from_settled(&result));
        }

        let ttl = chrono::Duration::seconds(self.settings.lease_ttl_secs as i64);
        let Some(lease) = SettlementLease::acquire(&self.gateway, product, issue, ttl, self.clock.now()).await? else {
            self.metrics.record_settlement_conflict();
            warn!(product = %product, issue = %issue, "Settlement already running");
            return Err(LedgerError::SettlementAlreadyRunning {
                product,
                issue: issue.to_string(),
            });
        };

        let outcome = self.run_locked(product, issue).await;
        lease.release(&self.gateway).await;
        outcome
    }

    async fn run_locked(&self, product: LotteryProduct, issue: &IssueId) -> LedgerResult<SettlementSummary> {
        // another run may have finished between the first read and the lease
        let result = self.draws.get(product, issue).await?;
        if result.is_settled() {
            return Ok(SettlementSummary::from_settled(&result));
        }

        self.metrics.record_settlement_run();
        let started = Instant::now();

        let table = self
            .prize_tables
            .iter()
            .find(|t| t.product == product)
            .ok_or_else(|| ConfigurationError::MissingRequired(format!("prize table for {}", product)))?;
        let draw = self.ledger.registry().validate_draw(product, &result.winning_numbers)?;
        let tickets = self.gateway.find_tickets_by_issue(product, issue).await?;

        info!(
            product = %product,
            issue = %issue,
            tickets = tickets.len(),
            "Settlement started"
        );

        // classify every ticket, settled ones included, so pool shares see all winners
        let rule = product.rule();
        let mut tier_units = vec![0u64; table.tiers.len()];
        let classified: Vec<Classified> = tickets
            .into_iter()
            .map(|ticket| {
                let mut wins: Vec<(usize, u64)> = Vec::new();
                for (signature, count) in single_bet_signatures(rule, ticket.bet_type, &ticket.numbers, &draw) {
                    if let Some(tier) = tier_index(table, &signature) {
                        match wins.iter_mut().find(|(t, _)| *t == tier) {
                            Some((_, units)) => *units += count,
                            None => wins.push((tier, count)),
                        }
                    }
                }
                for (tier, units) in &wins {
                    tier_units[*tier] =
                        tier_units[*tier].saturating_add(units.saturating_mul(u64::from(ticket.multiple)));
                }
                Classified { ticket, wins }
            })
            .collect();

        let strategy = strategy_for(table.payout);
        let per_winner: Vec<Money> = table
            .tiers
            .iter()
            .zip(&tier_units)
            .map(|(tier, units)| strategy.per_winner_amount(tier, *units, result.jackpot))
            .collect();

        let tiers: Vec<PrizeTier> = table
            .tiers
            .iter()
            .zip(tier_units.iter().zip(&per_winner))
            .map(|(tier, (units, amount))| PrizeTier {
                label: tier.label.clone(),
                winner_count: *units,
                per_winner_amount: *amount,
                total_amount: amount.saturating_mul(*units),
            })
            .collect();
        let total_payout = tiers
            .iter()
            .fold(Money::ZERO, |acc, t| acc.saturating_add(t.total_amount));

        let examined = classified.len();
        let (pending, settled): (Vec<Classified>, Vec<Classified>) =
            classified.into_iter().partition(|c| c.ticket.status == TicketStatus::Pending);

        let per_winner = &per_winner;
        let outcomes: Vec<LedgerResult<Ticket>> = stream::iter(pending)
            .map(|c| async move {
                let payout = c.payout(per_winner);
                let (status, tier) = match c.best_tier() {
                    Some(best) => (TicketStatus::Won, Some(table.tiers[best].label.clone())),
                    None => (TicketStatus::Lost, None),
                };
                debug!(ticket_id = %c.ticket.id, status = %status, payout = %payout, "Settling ticket");
                self.ledger
                    .transition_with_tier(&c.ticket.id, status, payout, tier)
                    .await
            })
            .buffer_unordered(self.settings.parallelism.max(1))
            .collect()
            .await;

        let (mut won, mut lost) = (0, 0);
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(ticket) if ticket.status == TicketStatus::Won => won += 1,
                Ok(ticket) if ticket.status == TicketStatus::Lost => lost += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(product = %product, issue = %issue, error = %e, "Ticket settlement failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        // leave the result unsettled so a later run picks up the remaining tickets
        if let Some(e) = first_error {
            return Err(e);
        }

        let settled_result = self.draws.complete_settlement(&result, tiers, total_payout).await?;

        info!(
            product = %product,
            issue = %issue,
            examined,
            won,
            lost,
            skipped = settled.len(),
            total_payout = %total_payout,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Settlement finished"
        );

        Ok(SettlementSummary {
            product,
            issue: issue.clone(),
            examined,
            won,
            lost,
            skipped: settled.len(),
            total_payout,
            tiers: settled_result.tiers,
            already_settled: false,
        })
    }
}
