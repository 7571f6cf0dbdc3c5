//! Bounded polling.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::HarnessError;

/// Fixed-interval retry budget: stop after `max_attempts` probes or once the
/// next sleep would overrun `timeout`, whichever comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_attempts: 120,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Calls `probe` until it yields `Some`, sleeping `policy.interval` between
/// attempts. The attempt number (starting at 1) is passed to `probe`.
///
/// # Errors
/// Returns `HarnessError::VerificationTimeout` once the budget is spent, or
/// the first error `probe` returns.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut probe: F) -> Result<T, HarnessError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, HarnessError>>,
{
    let started = Instant::now();
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if let Some(value) = probe(attempt).await? {
            tracing::debug!(attempt, "poll satisfied");
            return Ok(value);
        }

        let elapsed = started.elapsed();
        if attempt >= policy.max_attempts || elapsed + policy.interval > policy.timeout {
            return Err(HarnessError::VerificationTimeout {
                attempts: attempt,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        tracing::trace!(attempt, "poll not satisfied, sleeping");
        tokio::time::sleep(policy.interval).await;
    }
}
