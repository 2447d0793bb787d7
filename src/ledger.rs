//! Ticket ledger
//!
//! Tickets are created here, and every status change goes through
//! [`TicketLedger::transition`]. Numbers are fixed at creation; later writes only
//! touch status, tier, payout and timestamps.

use crate::common::traits::{Clock, TicketIdSource};
use crate::common::types::{IssueId, Money, TicketId, UserId};
use crate::errors::{LedgerError, LedgerResult, StorageError, ValidationError};
use crate::metrics::LedgerMetrics;
use crate::products::{BetFormatRegistry, BetType, LotteryProduct};
use crate::storage::StorageGateway;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Re-reads allowed when a concurrent writer bumps the version
const MAX_TRANSITION_ATTEMPTS: u32 = 8;

/// Ticket lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Pending,
    Won,
    Lost,
    Claimed,
}

impl TicketStatus {
    /// Settlement has already decided this ticket
    pub fn is_settled(&self) -> bool {
        !matches!(self, TicketStatus::Pending)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::Won => "WON",
            TicketStatus::Lost => "LOST",
            TicketStatus::Claimed => "CLAIMED",
        };
        f.write_str(name)
    }
}

/// A recorded bet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub user_id: UserId,
    pub product: LotteryProduct,
    pub bet_type: BetType,
    /// Canonical number groups
    pub numbers: Vec<Vec<u32>>,
    /// Single bets implied by `numbers`
    pub bet_units: u64,
    pub multiple: u32,
    pub stake: Money,
    pub issue: IssueId,
    pub created_at: DateTime<Utc>,
    pub status: TicketStatus,
    /// Best tier hit, set when the ticket wins
    #[serde(default)]
    pub tier: Option<String>,
    pub payout: Money,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    /// Bumped by every successful update
    pub version: u64,
}

impl Ticket {
    /// Apply the state machine.
    ///
    /// `Ok(None)` means the request is an idempotent no-op and nothing needs to
    /// be written.
    pub fn next_state(
        &self,
        to: TicketStatus,
        payout: Money,
        tier: Option<String>,
        at: DateTime<Utc>,
    ) -> LedgerResult<Option<Ticket>> {
        let invalid = || LedgerError::InvalidTransition {
            ticket_id: self.id.to_string(),
            from: self.status,
            to,
        };

        match (self.status, to) {
            (_, TicketStatus::Pending) => Err(invalid()),
            (TicketStatus::Pending, TicketStatus::Won | TicketStatus::Lost) => {
                if payout.is_negative() {
                    return Err(ValidationError::InvalidPayout(payout.to_string()).into());
                }
                if to == TicketStatus::Lost && payout != Money::ZERO {
                    return Err(ValidationError::InvalidPayout(format!("lost ticket paid {}", payout)).into());
                }
                let mut next = self.clone();
                next.status = to;
                next.payout = payout;
                next.tier = if to == TicketStatus::Won { tier } else { None };
                next.settled_at = Some(at);
                next.version = self.version + 1;
                Ok(Some(next))
            }
            // already settled: re-settling is a no-op
            (_, TicketStatus::Won | TicketStatus::Lost) => Ok(None),
            (TicketStatus::Won, TicketStatus::Claimed) => {
                let mut next = self.clone();
                next.status = TicketStatus::Claimed;
                next.claimed_at = Some(at);
                next.version = self.version + 1;
                Ok(Some(next))
            }
            (_, TicketStatus::Claimed) => Err(invalid()),
        }
    }
}

/// Input of [`TicketLedger::create`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRequest {
    pub user_id: UserId,
    pub product: LotteryProduct,
    pub bet_type: BetType,
    pub numbers: Vec<Vec<u32>>,
    pub multiple: u32,
    pub stake: Money,
    pub issue: IssueId,
}

/// Random v4 UUID identities
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTicketIds;

impl TicketIdSource for UuidTicketIds {
    fn next_id(&self) -> TicketId {
        TicketId::from_generated(Uuid::new_v4().simple().to_string())
    }
}

/// Process-scoped counter prefixed with a random node id and the start time
#[derive(Debug)]
pub struct SequentialTicketIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialTicketIds {
    pub fn new() -> Self {
        let node: u32 = rand::random();
        let started = Utc::now().timestamp_millis();
        Self {
            prefix: format!("{:x}-{:08x}", started, node),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialTicketIds {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketIdSource for SequentialTicketIds {
    fn next_id(&self) -> TicketId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        TicketId::from_generated(format!("{}-{}", self.prefix, n))
    }
}

/// Creates tickets and drives their status changes
pub struct TicketLedger {
    registry: BetFormatRegistry,
    gateway: Arc<StorageGateway>,
    ids: Arc<dyn TicketIdSource>,
    clock: Arc<dyn Clock>,
    metrics: Arc<LedgerMetrics>,
}

impl TicketLedger {
    pub fn new(
        registry: BetFormatRegistry,
        gateway: Arc<StorageGateway>,
        ids: Arc<dyn TicketIdSource>,
        clock: Arc<dyn Clock>,
        metrics: Arc<LedgerMetrics>,
    ) -> Self {
        Self {
            registry,
            gateway,
            ids,
            clock,
            metrics,
        }
    }

    pub fn registry(&self) -> &BetFormatRegistry {
        &self.registry
    }

    /// Validate, assign identity and persist a new `Pending` ticket.
    ///
    /// # Panics
    ///
    /// Panics if the identity source hands out an id that is already stored.
    /// That means the identity scheme is broken and no ticket can be trusted.
    pub async fn create(&self, request: BetRequest) -> LedgerResult<Ticket> {
        if !request.stake.is_positive() {
            return Err(ValidationError::InvalidStake(request.stake.to_string()).into());
        }

        let selection =
            self.registry
                .validate(request.product, request.bet_type, &request.numbers, request.multiple)?;

        let ticket = Ticket {
            id: self.ids.next_id(),
            user_id: request.user_id,
            product: request.product,
            bet_type: request.bet_type,
            numbers: selection.groups,
            bet_units: selection.bet_units,
            multiple: request.multiple,
            stake: request.stake,
            issue: request.issue,
            created_at: self.clock.now(),
            status: TicketStatus::Pending,
            tier: None,
            payout: Money::ZERO,
            settled_at: None,
            claimed_at: None,
            version: 0,
        };

        match self.gateway.save_ticket(&ticket).await {
            Ok(()) => {}
            Err(LedgerError::Storage(StorageError::AlreadyExists(key))) => {
                error!(ticket_id = %ticket.id, key = %key, "Ticket identity collision");
                panic!("ticket identity collision on {}: identity source is not unique", ticket.id);
            }
            Err(e) => return Err(e),
        }

        self.metrics.record_ticket_placed();
        info!(
            ticket_id = %ticket.id,
            user_id = %ticket.user_id,
            product = %ticket.product,
            issue = %ticket.issue,
            bet_units = ticket.bet_units,
            "Ticket placed"
        );
        Ok(ticket)
    }

    pub async fn get(&self, id: &TicketId) -> LedgerResult<Ticket> {
        self.gateway
            .find_ticket(id)
            .await?
            .ok_or_else(|| LedgerError::ticket_not_found(id.as_str()))
    }

    /// Tickets of a user, newest first
    pub async fn list_by_user(&self, user: &UserId) -> LedgerResult<Vec<Ticket>> {
        self.gateway.find_tickets_by_user(user).await
    }

    /// Move a ticket to `to`, enforcing the lifecycle
    pub async fn transition(&self, id: &TicketId, to: TicketStatus, payout: Money) -> LedgerResult<Ticket> {
        self.transition_with_tier(id, to, payout, None).await
    }

    pub(crate) async fn transition_with_tier(
        &self,
        id: &TicketId,
        to: TicketStatus,
        payout: Money,
        tier: Option<String>,
    ) -> LedgerResult<Ticket> {
        let mut attempt = 1;
        loop {
            let current = self
                .gateway
                .load_ticket(id)
                .await?
                .ok_or_else(|| LedgerError::ticket_not_found(id.as_str()))?;

            let Some(next) = current.next_state(to, payout, tier.clone(), self.clock.now())? else {
                debug!(ticket_id = %id, status = %current.status, requested = %to, "Transition is a no-op");
                return Ok(current);
            };

            match self.gateway.update_ticket(&next, current.version).await {
                Ok(()) => {
                    match next.status {
                        TicketStatus::Won => self.metrics.record_ticket_won(),
                        TicketStatus::Lost => self.metrics.record_ticket_lost(),
                        TicketStatus::Claimed => self.metrics.record_ticket_claimed(),
                        TicketStatus::Pending => {}
                    }
                    debug!(ticket_id = %id, from = %current.status, to = %next.status, payout = %next.payout, "Ticket transitioned");
                    return Ok(next);
                }
                Err(LedgerError::Storage(StorageError::VersionConflict { .. })) if attempt < MAX_TRANSITION_ATTEMPTS => {
                    debug!(ticket_id = %id, attempt, "Concurrent update, re-reading ticket");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
