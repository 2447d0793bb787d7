//! In-memory authoritative store
//!
//! Same contract as the RocksDB backend, kept in `dashmap` shards. Used for
//! tests and for deployments that accept losing state on restart.

use super::{newest_first, Lease};
use crate::common::traits::AuthoritativeStore;
use crate::common::types::{IssueId, TicketId, UserId};
use crate::draws::DrawResult;
use crate::errors::StorageError;
use crate::ledger::Ticket;
use crate::products::LotteryProduct;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tickets: DashMap<TicketId, Ticket>,
    results: DashMap<(LotteryProduct, IssueId), DrawResult>,
    leases: DashMap<String, Lease>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }
}

#[async_trait]
impl AuthoritativeStore for MemoryStore {
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StorageError> {
        match self.tickets.entry(ticket.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(format!("ticket {}", ticket.id))),
            Entry::Vacant(slot) => {
                slot.insert(ticket.clone());
                Ok(())
            }
        }
    }

    async fn update_ticket(&self, ticket: &Ticket, expected_version: u64) -> Result<(), StorageError> {
        let mut stored = self
            .tickets
            .get_mut(&ticket.id)
            .ok_or_else(|| StorageError::WriteFailed(format!("ticket {} does not exist", ticket.id)))?;

        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                key: format!("ticket {}", ticket.id),
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = ticket.clone();
        Ok(())
    }

    async fn get_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, StorageError> {
        Ok(self.tickets.get(id).map(|t| t.clone()))
    }

    async fn tickets_by_user(&self, user: &UserId) -> Result<Vec<Ticket>, StorageError> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|t| &t.user_id == user)
            .map(|t| t.clone())
            .collect();
        tickets.sort_by(|a, b| newest_first((a.created_at, &a.id), (b.created_at, &b.id)));
        Ok(tickets)
    }

    async fn tickets_by_issue(&self, product: LotteryProduct, issue: &IssueId) -> Result<Vec<Ticket>, StorageError> {
        Ok(self
            .tickets
            .iter()
            .filter(|t| t.product == product && &t.issue == issue)
            .map(|t| t.clone())
            .collect())
    }

    async fn insert_draw_result(&self, result: &DrawResult) -> Result<(), StorageError> {
        match self.results.entry((result.product, result.issue.clone())) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(format!(
                "draw result {} {}",
                result.product, result.issue
            ))),
            Entry::Vacant(slot) => {
                slot.insert(result.clone());
                Ok(())
            }
        }
    }

    async fn complete_draw_settlement(&self, result: &DrawResult) -> Result<(), StorageError> {
        let mut stored = self
            .results
            .get_mut(&(result.product, result.issue.clone()))
            .ok_or_else(|| {
                StorageError::WriteFailed(format!("draw result {} {} does not exist", result.product, result.issue))
            })?;

        if stored.is_settled() {
            return Ok(());
        }
        stored.tiers = result.tiers.clone();
        stored.total_payout = result.total_payout;
        stored.settled_at = result.settled_at;
        Ok(())
    }

    async fn get_draw_result(&self, product: LotteryProduct, issue: &IssueId) -> Result<Option<DrawResult>, StorageError> {
        Ok(self.results.get(&(product, issue.clone())).map(|r| r.clone()))
    }

    async fn draw_results_by_product(&self, product: LotteryProduct) -> Result<Vec<DrawResult>, StorageError> {
        let mut results: Vec<DrawResult> = self
            .results
            .iter()
            .filter(|r| r.product == product)
            .map(|r| r.clone())
            .collect();
        results.sort_by(|a, b| newest_first((a.drawn_at, &a.issue), (b.drawn_at, &b.issue)));
        Ok(results)
    }

    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let lease = Lease {
            holder: holder.to_string(),
            expires_at,
        };
        match self.leases.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_held_by_other(holder, now) {
                    return Ok(false);
                }
                slot.insert(lease);
                Ok(true)
            }
            Entry::Vacant(slot) => {
                slot.insert(lease);
                Ok(true)
            }
        }
    }

    async fn release_lease(&self, key: &str, holder: &str) -> Result<(), StorageError> {
        self.leases.remove_if(key, |_, lease| lease.holder == holder);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
