//! Backend contracts
//!
//! The ledger, the draw result store and the settlement engine only ever talk to
//! these traits. Concrete backends are picked when the service is built.

use crate::common::types::{IssueId, TicketId, UserId};
use crate::draws::DrawResult;
use crate::errors::StorageError;
use crate::ledger::Ticket;
use crate::products::LotteryProduct;
use crate::storage::analytics::{LedgerEvent, UserProductStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable source of truth for tickets, draw results and settlement leases
#[async_trait]
pub trait AuthoritativeStore: Send + Sync {
    /// Insert a new ticket, `AlreadyExists` if the id is taken
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StorageError>;

    /// Replace a ticket if the stored version equals `expected_version`
    async fn update_ticket(&self, ticket: &Ticket, expected_version: u64) -> Result<(), StorageError>;

    async fn get_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, StorageError>;

    /// All tickets of a user, newest first
    async fn tickets_by_user(&self, user: &UserId) -> Result<Vec<Ticket>, StorageError>;

    /// Every ticket targeting one draw, in no particular order
    async fn tickets_by_issue(&self, product: LotteryProduct, issue: &IssueId) -> Result<Vec<Ticket>, StorageError>;

    /// Insert a draw result, `AlreadyExists` if the (product, issue) pair is taken
    async fn insert_draw_result(&self, result: &DrawResult) -> Result<(), StorageError>;

    /// Store the settlement outcome of an existing, not yet settled result
    async fn complete_draw_settlement(&self, result: &DrawResult) -> Result<(), StorageError>;

    async fn get_draw_result(&self, product: LotteryProduct, issue: &IssueId) -> Result<Option<DrawResult>, StorageError>;

    /// Results of one product, newest draw first
    async fn draw_results_by_product(&self, product: LotteryProduct) -> Result<Vec<DrawResult>, StorageError>;

    /// Take `key` for `holder` unless another holder's lease is still live at `now`
    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Drop the lease if `holder` still owns it
    async fn release_lease(&self, key: &str, holder: &str) -> Result<(), StorageError>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Disposable projection of tickets keyed by id
#[async_trait]
pub trait TicketCache: Send + Sync {
    async fn get(&self, id: &TicketId) -> Result<Option<Ticket>, StorageError>;

    /// Store a ticket unless a newer version is already cached
    async fn put(&self, ticket: &Ticket) -> Result<(), StorageError>;

    /// Drop the cached ticket and refuse later puts older than `version`
    async fn invalidate(&self, id: &TicketId, version: u64) -> Result<(), StorageError>;
}

/// Eventually consistent aggregate store
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, event: &LedgerEvent) -> Result<(), StorageError>;

    /// Per-product aggregates of one user
    async fn user_stats(&self, user: &UserId) -> Result<Vec<UserProductStats>, StorageError>;
}

/// Time source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Ticket identity source; every call must yield a never-used id
pub trait TicketIdSource: Send + Sync {
    fn next_id(&self) -> TicketId;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
