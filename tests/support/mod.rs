//! Shared doubles for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use lottery_ledger::common::config::ConfigBuilder;
use lottery_ledger::common::traits::{AnalyticsSink, AuthoritativeStore, Clock, TicketCache};
use lottery_ledger::errors::StorageError;
use lottery_ledger::storage::{LedgerEvent, MemoryStore, UserProductStats};
use lottery_ledger::{
    BetRequest, BetType, DrawResult, IssueId, LedgerConfig, LotteryProduct, Money, Ticket, TicketId, UserId,
};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub fn memory_config() -> LedgerConfig {
    ConfigBuilder::bundled().unwrap().in_memory().build()
}

pub fn issue(value: &str) -> IssueId {
    IssueId::parse(value).unwrap()
}

pub fn user(value: &str) -> UserId {
    UserId::parse(value).unwrap()
}

pub fn bet(
    user_id: &str,
    product: LotteryProduct,
    bet_type: BetType,
    numbers: Vec<Vec<u32>>,
    issue_id: &str,
) -> BetRequest {
    BetRequest {
        user_id: user(user_id),
        product,
        bet_type,
        numbers,
        multiple: 1,
        stake: Money::from_major(2),
        issue: issue(issue_id),
    }
}

/// In-memory store that counts writes, can slow down issue scans and can fail
/// a number of calls with a transient error
#[derive(Default)]
pub struct InstrumentedStore {
    inner: MemoryStore,
    pub ticket_updates: AtomicUsize,
    pub settlement_writes: AtomicUsize,
    pub issue_scan_delay_ms: AtomicU64,
    pub transient_failures: AtomicU32,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scan_delay(self, delay: Duration) -> Self {
        self.issue_scan_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn fail_next(&self, calls: u32) {
        self.transient_failures.store(calls, Ordering::SeqCst);
    }

    fn maybe_fail(&self) -> Result<(), StorageError> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthoritativeStore for InstrumentedStore {
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.insert_ticket(ticket).await
    }

    async fn update_ticket(&self, ticket: &Ticket, expected_version: u64) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.update_ticket(ticket, expected_version).await?;
        self.ticket_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, StorageError> {
        self.maybe_fail()?;
        self.inner.get_ticket(id).await
    }

    async fn tickets_by_user(&self, user: &UserId) -> Result<Vec<Ticket>, StorageError> {
        self.inner.tickets_by_user(user).await
    }

    async fn tickets_by_issue(&self, product: LotteryProduct, issue: &IssueId) -> Result<Vec<Ticket>, StorageError> {
        let delay = self.issue_scan_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.tickets_by_issue(product, issue).await
    }

    async fn insert_draw_result(&self, result: &DrawResult) -> Result<(), StorageError> {
        self.inner.insert_draw_result(result).await
    }

    async fn complete_draw_settlement(&self, result: &DrawResult) -> Result<(), StorageError> {
        self.inner.complete_draw_settlement(result).await?;
        self.settlement_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_draw_result(&self, product: LotteryProduct, issue: &IssueId) -> Result<Option<DrawResult>, StorageError> {
        self.inner.get_draw_result(product, issue).await
    }

    async fn draw_results_by_product(&self, product: LotteryProduct) -> Result<Vec<DrawResult>, StorageError> {
        self.inner.draw_results_by_product(product).await
    }

    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        self.inner.try_acquire_lease(key, holder, expires_at, now).await
    }

    async fn release_lease(&self, key: &str, holder: &str) -> Result<(), StorageError> {
        self.inner.release_lease(key, holder).await
    }

    fn backend_name(&self) -> &'static str {
        "instrumented"
    }
}

/// Cache whose every call fails
pub struct FailingCache;

#[async_trait]
impl TicketCache for FailingCache {
    async fn get(&self, _id: &TicketId) -> Result<Option<Ticket>, StorageError> {
        Err(StorageError::Unavailable("cache down".to_string()))
    }

    async fn put(&self, _ticket: &Ticket) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("cache down".to_string()))
    }

    async fn invalidate(&self, _id: &TicketId, _version: u64) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("cache down".to_string()))
    }
}

/// Analytics sink that rejects every event
pub struct FailingSink;

#[async_trait]
impl AnalyticsSink for FailingSink {
    async fn record(&self, _event: &LedgerEvent) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("warehouse offline".to_string()))
    }

    async fn user_stats(&self, _user: &UserId) -> Result<Vec<UserProductStats>, StorageError> {
        Err(StorageError::Unavailable("warehouse offline".to_string()))
    }
}

/// Analytics sink whose writes never complete
pub struct StuckSink;

#[async_trait]
impl AnalyticsSink for StuckSink {
    async fn record(&self, _event: &LedgerEvent) -> Result<(), StorageError> {
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn user_stats(&self, _user: &UserId) -> Result<Vec<UserProductStats>, StorageError> {
        Ok(Vec::new())
    }
}

/// Clock that moves forward one microsecond per reading
pub struct SteppingClock {
    start: DateTime<Utc>,
    ticks: AtomicI64,
}

impl SteppingClock {
    pub fn new() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::microseconds(self.ticks.fetch_add(1, Ordering::SeqCst))
    }
}
