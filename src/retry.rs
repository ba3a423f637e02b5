//! Retry logic with fixed exponential backoff
//!
//! Page image fetches are retried a bounded number of times with a fixed
//! delay curve (2s, 4s, 8s). The curve is part of the observable contract —
//! it is computed from the original formula rather than a configurable
//! multiplier, and carries no jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Delay before retry number `attempt` (1-based): `(2 << (attempt - 1))`
/// seconds, i.e. 2s, 4s, 8s for attempts 1..=3.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis((2u64 << (attempt - 1)) * 1000)
}

/// Execute an async operation with bounded retries and the fixed backoff curve.
///
/// Runs `operation` up to `max_attempts` times. After a failed attempt `n`
/// (except the last) it sleeps for [`backoff_delay`]`(n)` before trying
/// again. Returns the first success or the last error once attempts are
/// exhausted.
pub(crate) async fn with_backoff<F, Fut, T>(max_attempts: u32, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if attempt < max_attempts => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    attempts = attempt,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(e);
            }
        }
    }
}
