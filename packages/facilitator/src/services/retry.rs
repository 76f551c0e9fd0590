use std::time::Duration;

use backoff::{ExponentialBackoff, future::retry_notify};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::error::{FacilitatorError, FacilitatorResult};

/// Bounded exponential backoff for transaction submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2_000,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Doubling waits from `initial_backoff_ms` up to `max_backoff_ms`, without jitter.
    /// Attempts, not elapsed time, bound the schedule.
    pub fn schedule(&self) -> ExponentialBackoff {
        let initial = Duration::from_millis(self.initial_backoff_ms);
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: Duration::from_millis(self.max_backoff_ms),
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error, or attempts run out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> FacilitatorResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FacilitatorResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        retry_notify(
            self.schedule(),
            || {
                attempt += 1;
                let last = attempt >= attempts;
                let call = operation();
                async move {
                    call.await.map_err(|e| {
                        if e.is_retryable() && !last {
                            backoff::Error::transient(e)
                        } else {
                            backoff::Error::permanent(e)
                        }
                    })
                }
            },
            |e: FacilitatorError, wait: Duration| {
                warn!("⚠️  {} failed: {} (retrying in {:?})", label, e, wait);
            },
        )
        .await
    }
}
