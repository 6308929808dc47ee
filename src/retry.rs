//! Error Handler: retry policies with exponential backoff,
//! plus domain-specific wrappers that log and swallow for the
//! data-preserving Upload/Delete/Download paths.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first (non-retry) one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub cap: Duration,
    /// Off by default: keeps retry timing deterministic under test. An
    /// operator running many daemons against one REMOTE may enable it to
    /// avoid a thundering herd.
    pub jitter: bool,
}

impl RetryPolicy {
    /// `{max_attempts: 6, base: 2000ms, cap: 32000ms}` — Connection errors.
    pub const CONNECTION: RetryPolicy = RetryPolicy {
        max_attempts: 6,
        base_delay: Duration::from_millis(2000),
        cap: Duration::from_millis(32000),
        jitter: false,
    };

    /// `{max_attempts: 4, base: 2000ms, cap: 8000ms}` — Query errors.
    pub const QUERY: RetryPolicy = RetryPolicy {
        max_attempts: 4,
        base_delay: Duration::from_millis(2000),
        cap: Duration::from_millis(8000),
        jitter: false,
    };

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = scaled.min(self.cap);
        if self.jitter {
            jittered(capped)
        } else {
            capped
        }
    }
}

fn jittered(delay: Duration) -> Duration {
    // ±20%, derived from the delay itself rather than a RNG crate.
    let millis = delay.as_millis() as u64;
    let spread = millis / 5;
    let offset = (millis % (2 * spread + 1)) as i64 - spread as i64;
    Duration::from_millis((millis as i64 + offset).max(0) as u64)
}

/// Runs `op` under `policy`, retrying Connection/Query-classified failures
/// with exponential backoff. `context` is attached to log lines for
/// operator correlation.
pub async fn execute_with_retry<T, F, Fut>(
    mut op: F,
    policy: RetryPolicy,
    context: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 >= policy.max_attempts => {
                error!(context, attempt, error = %err, "retry budget exhausted");
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(context, attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying after failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Upload wrapper: logs and returns the classified error instead of
/// re-raising, so the batch stays on LOCAL untouched.
pub async fn run_upload<T, Fut>(fut: Fut, context: &str) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match fut.await {
        Ok(v) => Ok(v),
        Err(err) => {
            warn!(context, error = %err, "upload step failed, batch preserved on LOCAL");
            Err(SyncError::Upload(err.to_string()))
        }
    }
}

/// Delete wrapper: logs and returns the classified error without retrying —
/// the LOCAL delete is rolled back by the caller.
pub async fn run_delete<T, Fut>(fut: Fut, context: &str) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match fut.await {
        Ok(v) => Ok(v),
        Err(err) => {
            warn!(context, error = %err, "delete step failed, rolled back");
            Err(SyncError::Delete(err.to_string()))
        }
    }
}

/// Download wrapper: isolates a reconciliation sub-step so its failure
/// never blocks the sibling sub-step.
pub async fn run_download<T, Fut>(fut: Fut, context: &str) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match fut.await {
        Ok(v) => Ok(v),
        Err(err) => {
            warn!(context, error = %err, "download step failed, isolated from sibling step");
            Err(SyncError::Download(err.to_string()))
        }
    }
}

/// Unhandled-exception sink: logs structured context at the cycle boundary
/// and lets the caller continue to the next cycle.
pub fn sink_unhandled(context: &str, err: &SyncError) {
    error!(context, error = %err, kind = err.kind(), "unhandled error at cycle boundary");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            cap: Duration::from_millis(4),
            jitter: false,
        };
        let result = execute_with_retry(
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(SyncError::Query("transient".into()))
                    } else {
                        Ok(42)
                    }
                }
            },
            policy,
            "test",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_budget_and_returns_last_error() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            cap: Duration::from_millis(1),
            jitter: false,
        };
        let result: Result<()> =
            execute_with_retry(|| async { Err(SyncError::Query("nope".into())) }, policy, "test")
                .await;
        assert!(result.is_err());
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::CONNECTION;
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(32000));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(32000));
    }
}
