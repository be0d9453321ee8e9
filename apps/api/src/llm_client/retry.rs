//! Bounded retry with exponential backoff for a single upstream call.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::UpstreamError;

/// Retries `Transient` and `QuotaExceeded` failures; `Fatal` propagates at once.
///
/// Total wait is bounded by `initial_delay * (2^max_retries - 1)`,
/// e.g. 1s + 2s + 4s = 7s for the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total calls are at most `max_retries + 1`.
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Runs `operation` until it succeeds, fails fatally, or the budget is spent.
    /// When retries are exhausted the last retryable error is returned as-is so
    /// callers can still tell quota exhaustion from general unavailability.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut delay = self.initial_delay;
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    warn!(
                        "Upstream call failed ({e}); retry {}/{} after {}ms",
                        retries,
                        self.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!("Upstream retries exhausted after {} attempts: {e}", retries + 1);
                    }
                    return Err(e);
                }
            }
        }
    }
}
