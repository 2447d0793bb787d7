//! Operational counters
//!
//! Created once per service and shared by `Arc`; there is no global instance.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct LedgerMetrics {
    start_time: Instant,
    tickets_placed: AtomicU64,
    tickets_won: AtomicU64,
    tickets_lost: AtomicU64,
    tickets_claimed: AtomicU64,
    draws_recorded: AtomicU64,
    settlement_runs: AtomicU64,
    settlement_conflicts: AtomicU64,
    store_retries: AtomicU64,
    store_timeouts: AtomicU64,
    cache_write_failures: AtomicU64,
    analytics_dropped: AtomicU64,
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub tickets_placed: u64,
    pub tickets_won: u64,
    pub tickets_lost: u64,
    pub tickets_claimed: u64,
    pub draws_recorded: u64,
    pub settlement_runs: u64,
    pub settlement_conflicts: u64,
    pub store_retries: u64,
    pub store_timeouts: u64,
    pub cache_write_failures: u64,
    pub analytics_dropped: u64,
}

impl Default for LedgerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            tickets_placed: AtomicU64::new(0),
            tickets_won: AtomicU64::new(0),
            tickets_lost: AtomicU64::new(0),
            tickets_claimed: AtomicU64::new(0),
            draws_recorded: AtomicU64::new(0),
            settlement_runs: AtomicU64::new(0),
            settlement_conflicts: AtomicU64::new(0),
            store_retries: AtomicU64::new(0),
            store_timeouts: AtomicU64::new(0),
            cache_write_failures: AtomicU64::new(0),
            analytics_dropped: AtomicU64::new(0),
        }
    }

    pub fn record_ticket_placed(&self) {
        self.tickets_placed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ticket_won(&self) {
        self.tickets_won.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ticket_lost(&self) {
        self.tickets_lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ticket_claimed(&self) {
        self.tickets_claimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_draw(&self) {
        self.draws_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_settlement_run(&self) {
        self.settlement_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_settlement_conflict(&self) {
        self.settlement_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_retry(&self) {
        self.store_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_timeout(&self) {
        self.store_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_write_failure(&self) {
        self.cache_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_analytics_dropped(&self) {
        self.analytics_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.total_runtime().as_secs(),
            tickets_placed: self.tickets_placed.load(Ordering::Relaxed),
            tickets_won: self.tickets_won.load(Ordering::Relaxed),
            tickets_lost: self.tickets_lost.load(Ordering::Relaxed),
            tickets_claimed: self.tickets_claimed.load(Ordering::Relaxed),
            draws_recorded: self.draws_recorded.load(Ordering::Relaxed),
            settlement_runs: self.settlement_runs.load(Ordering::Relaxed),
            settlement_conflicts: self.settlement_conflicts.load(Ordering::Relaxed),
            store_retries: self.store_retries.load(Ordering::Relaxed),
            store_timeouts: self.store_timeouts.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
            analytics_dropped: self.analytics_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_show_in_snapshot() {
        let metrics = LedgerMetrics::new();
        metrics.record_ticket_placed();
        metrics.record_ticket_placed();
        metrics.record_cache_write_failure();
        metrics.record_settlement_conflict();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tickets_placed, 2);
        assert_eq!(snapshot.cache_write_failures, 1);
        assert_eq!(snapshot.settlement_conflicts, 1);
        assert_eq!(snapshot.tickets_won, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(LedgerMetrics::new().snapshot()).unwrap();
        assert_eq!(json["draws_recorded"], 0);
    }
}
