//! Storage gateway
//!
//! Write order is fixed: authoritative store first (with timeout and retries),
//! then the cache, then the analytics queue. Only the first step can fail the
//! caller. Cache and analytics trouble is logged, counted and absorbed.

use super::analytics::{AnalyticsPipeline, LedgerEvent, UserProductStats};
use super::retry::RetryPolicy;
use crate::common::traits::{AuthoritativeStore, TicketCache};
use crate::common::types::{IssueId, TicketId, UserId};
use crate::draws::DrawResult;
use crate::errors::{LedgerResult, StorageError};
use crate::ledger::Ticket;
use crate::metrics::LedgerMetrics;
use crate::products::LotteryProduct;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct StorageGateway {
    store: Arc<dyn AuthoritativeStore>,
    cache: Option<Arc<dyn TicketCache>>,
    analytics: Option<AnalyticsPipeline>,
    retry: RetryPolicy,
    metrics: Arc<LedgerMetrics>,
}

impl StorageGateway {
    pub fn new(store: Arc<dyn AuthoritativeStore>, metrics: Arc<LedgerMetrics>) -> Self {
        Self {
            store,
            cache: None,
            analytics: None,
            retry: RetryPolicy::default(),
            metrics,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn TicketCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_analytics(mut self, analytics: AnalyticsPipeline) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Insert a new ticket.
    ///
    /// `AlreadyExists` on the first attempt is returned as-is; on a retry it is
    /// accepted when the stored record is exactly this ticket (an earlier
    /// attempt landed but its reply was lost).
    pub async fn save_ticket(&self, ticket: &Ticket) -> LedgerResult<()> {
        let mut attempts = 0u32;
        let result = self
            .retry
            .run("insert_ticket", &self.metrics, || {
                attempts += 1;
                self.store.insert_ticket(ticket)
            })
            .await;

        match result {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(key)) if attempts > 1 => {
                if self.load_ticket(&ticket.id).await?.as_ref() != Some(ticket) {
                    return Err(StorageError::AlreadyExists(key).into());
                }
                debug!(ticket_id = %ticket.id, "Retried insert had already been applied");
            }
            Err(e) => return Err(e.into()),
        }

        self.cache_put(ticket).await;
        self.publish(LedgerEvent::placed(ticket));
        Ok(())
    }

    /// Compare-and-swap a ticket against `expected_version`
    pub async fn update_ticket(&self, ticket: &Ticket, expected_version: u64) -> LedgerResult<()> {
        let mut attempts = 0u32;
        let result = self
            .retry
            .run("update_ticket", &self.metrics, || {
                attempts += 1;
                self.store.update_ticket(ticket, expected_version)
            })
            .await;

        match result {
            Ok(()) => {}
            Err(conflict @ StorageError::VersionConflict { .. }) if attempts > 1 => {
                if self.load_ticket(&ticket.id).await?.as_ref() != Some(ticket) {
                    return Err(conflict.into());
                }
                debug!(ticket_id = %ticket.id, "Retried update had already been applied");
            }
            Err(e) => return Err(e.into()),
        }

        self.cache_put(ticket).await;
        if let Some(event) = LedgerEvent::for_update(ticket) {
            self.publish(event);
        }
        Ok(())
    }

    /// Cache first, authoritative store on a miss (repopulating the cache)
    pub async fn find_ticket(&self, id: &TicketId) -> LedgerResult<Option<Ticket>> {
        if let Some(cache) = &self.cache {
            match self.bounded_call("cache_get", cache.get(id)).await {
                Ok(Some(ticket)) => return Ok(Some(ticket)),
                Ok(None) => {}
                Err(e) => warn!(ticket_id = %id, error = %e, "Cache read failed, falling through"),
            }
        }

        let ticket = self.load_ticket(id).await?;
        if let Some(ticket) = &ticket {
            self.cache_put(ticket).await;
        }
        Ok(ticket)
    }

    /// Authoritative read, bypassing the cache
    pub async fn load_ticket(&self, id: &TicketId) -> LedgerResult<Option<Ticket>> {
        Ok(self
            .retry
            .run("get_ticket", &self.metrics, || self.store.get_ticket(id))
            .await?)
    }

    pub async fn find_tickets_by_user(&self, user: &UserId) -> LedgerResult<Vec<Ticket>> {
        Ok(self
            .retry
            .run("tickets_by_user", &self.metrics, || self.store.tickets_by_user(user))
            .await?)
    }

    /// Every ticket of a draw, always from the authoritative store
    pub async fn find_tickets_by_issue(&self, product: LotteryProduct, issue: &IssueId) -> LedgerResult<Vec<Ticket>> {
        Ok(self
            .retry
            .run("tickets_by_issue", &self.metrics, || self.store.tickets_by_issue(product, issue))
            .await?)
    }

    pub async fn save_draw_result(&self, result: &DrawResult) -> LedgerResult<()> {
        let mut attempts = 0u32;
        let outcome = self
            .retry
            .run("insert_draw_result", &self.metrics, || {
                attempts += 1;
                self.store.insert_draw_result(result)
            })
            .await;

        match outcome {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(key)) if attempts > 1 => {
                let stored = self.find_draw_result(result.product, &result.issue).await?;
                if stored.as_ref() != Some(result) {
                    return Err(StorageError::AlreadyExists(key).into());
                }
            }
            Err(e) => return Err(e.into()),
        }

        self.publish(LedgerEvent::DrawRecorded {
            product: result.product,
            issue: result.issue.clone(),
            jackpot: result.jackpot,
        });
        Ok(())
    }

    pub async fn complete_draw_settlement(&self, result: &DrawResult) -> LedgerResult<()> {
        Ok(self
            .retry
            .run("complete_draw_settlement", &self.metrics, || {
                self.store.complete_draw_settlement(result)
            })
            .await?)
    }

    pub async fn find_draw_result(&self, product: LotteryProduct, issue: &IssueId) -> LedgerResult<Option<DrawResult>> {
        Ok(self
            .retry
            .run("get_draw_result", &self.metrics, || self.store.get_draw_result(product, issue))
            .await?)
    }

    /// Results of one product, newest first
    pub async fn list_draw_results(&self, product: LotteryProduct) -> LedgerResult<Vec<DrawResult>> {
        Ok(self
            .retry
            .run("draw_results_by_product", &self.metrics, || {
                self.store.draw_results_by_product(product)
            })
            .await?)
    }

    pub async fn acquire_lease(
        &self,
        key: &str,
        holder: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        Ok(self
            .retry
            .run("try_acquire_lease", &self.metrics, || {
                self.store.try_acquire_lease(key, holder, expires_at, now)
            })
            .await?)
    }

    pub async fn release_lease(&self, key: &str, holder: &str) -> LedgerResult<()> {
        Ok(self
            .retry
            .run("release_lease", &self.metrics, || self.store.release_lease(key, holder))
            .await?)
    }

    /// Aggregates from the analytical store; empty when analytics is disabled
    pub async fn user_stats(&self, user: &UserId) -> LedgerResult<Vec<UserProductStats>> {
        match &self.analytics {
            Some(analytics) => Ok(self.bounded_call("analytics_user_stats", analytics.user_stats(user)).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Wait, bounded by the store timeout, for queued analytics events to be
    /// applied; `false` when they were not
    pub async fn flush_analytics(&self) -> bool {
        match &self.analytics {
            Some(analytics) => analytics.flush().await,
            None => true,
        }
    }

    /// Cache and analytics calls get the store timeout too
    async fn bounded_call<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        match tokio::time::timeout(self.retry.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout {
                operation: operation.to_string(),
                after_ms: self.retry.timeout.as_millis() as u64,
            }),
        }
    }

    async fn cache_put(&self, ticket: &Ticket) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(e) = self.bounded_call("cache_put", cache.put(ticket)).await {
            self.metrics.record_cache_write_failure();
            warn!(
                ticket_id = %ticket.id,
                version = ticket.version,
                error = %e,
                "Cache write failed after authoritative write, invalidating entry"
            );
            if let Err(e) = self
                .bounded_call("cache_invalidate", cache.invalidate(&ticket.id, ticket.version))
                .await {
                warn!(
                    ticket_id = %ticket.id,
                    error = %e,
                    "Cache invalidation failed, entry stays until its TTL"
                );
            }
        }
    }

    fn publish(&self, event: LedgerEvent) {
        if let Some(analytics) = &self.analytics {
            analytics.publish(event);
        }
    }
}
