//! Bounded retry with exponential backoff for remote calls.

use crate::error::{ChunkBenchError, Result};
use std::future::Future;
use std::time::Duration;

/// Longest single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(32);

/// How a remote call is attempted: per-attempt timeout, retry count and
/// backoff base.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32, backoff: Duration) -> Self {
        Self {
            timeout,
            max_retries,
            backoff,
        }
    }

    /// Delay before attempt number `attempt` (1-based retry count).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt.saturating_sub(1)).min(5);
        (self.backoff * factor).min(MAX_BACKOFF)
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the
    /// retries are used up. Each attempt is bounded by the timeout.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = self.delay_for(attempt);
                tracing::debug!(call = label, attempt, ?delay, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }

            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ChunkBenchError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    tracing::warn!(call = label, attempt, error = %err, "attempt failed");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
