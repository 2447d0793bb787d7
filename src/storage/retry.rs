//! Bounded retries with per-attempt timeouts for authoritative store calls

use crate::config::StorageSettings;
use crate::errors::StorageError;
use crate::metrics::LedgerMetrics;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Limit for each individual attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&StorageSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            max_delay: Duration::from_millis(settings.retry_max_delay_ms),
            timeout: settings.store_timeout(),
        }
    }

    /// Backoff before the attempt after `attempt` (1-based), with up to 50% jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exp).min(self.max_delay);
        let jitter_cap = backoff.as_millis() as u64 / 2;
        let jitter = if jitter_cap > 0 {
            rand::thread_rng().gen_range(0..=jitter_cap)
        } else {
            0
        };
        backoff + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds, fails permanently or runs out of attempts.
    ///
    /// Each attempt is cut off after `timeout` and reported as
    /// [`StorageError::Timeout`], which counts as transient.
    pub async fn run<T, F, Fut>(&self, operation: &str, metrics: &LedgerMetrics, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => {
                    metrics.record_store_timeout();
                    Err(StorageError::Timeout {
                        operation: operation.to_string(),
                        after_ms: self.timeout.as_millis() as u64,
                    })
                }
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient store failure, retrying"
                    );
                    metrics.record_store_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        error!(operation, attempts = attempt, error = %e, "Store retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = policy();
        for attempt in 1..10 {
            assert!(policy.delay_for(attempt) <= Duration::from_millis(6));
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let metrics = LedgerMetrics::new();
        let calls = AtomicU32::new(0);

        let result = policy()
            .run("get_ticket", &metrics, || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StorageError::Unavailable("busy".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.snapshot().store_retries, 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let metrics = LedgerMetrics::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy()
            .run("get_ticket", &metrics, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StorageError::CorruptedData("bad".to_string()))
            })
            .await;

        assert!(matches!(result, Err(StorageError::CorruptedData(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_surfaces_after_attempts() {
        let metrics = LedgerMetrics::new();

        let result: Result<(), _> = policy()
            .run("slow", &metrics, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(StorageError::Timeout { .. })));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.store_timeouts, 3);
        assert_eq!(snapshot.store_retries, 2);
    }
}
