use std::{future::Future, time::Duration};

/// Bounded retry with multiplicative backoff, used for ledger writes and
/// tails-file transfers.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub backoff: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_millis(500),
            backoff: 2,
        }
    }
}

impl RetryPolicy {
    /// Policy for tests and in-process backends where waiting is pointless.
    pub fn no_wait(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            interval: Duration::ZERO,
            backoff: 1,
        }
    }
}

/// Runs `operation` until it succeeds, `retryable` says no, or attempts run
/// out; the error of the last attempt is returned.
pub async fn with_retry<T, E, Fut, Op, Rt>(
    policy: &RetryPolicy,
    op_name: &str,
    mut operation: Op,
    retryable: Rt,
) -> Result<T, E>
where
    E: std::fmt::Display,
    Fut: Future<Output = Result<T, E>>,
    Op: FnMut() -> Fut,
    Rt: Fn(&E) -> bool,
{
    let attempts = policy.max_attempts.max(1);
    let mut interval = policy.interval;
    let mut last_err = None;
    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if retryable(&err) && attempt < attempts => {
                warn!(
                    "with_retry >>> {} failed (attempt {}/{}), retrying in {:?}: {}",
                    op_name, attempt, attempts, interval, err
                );
                tokio::time::sleep(interval).await;
                interval *= policy.backoff;
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    // Unreachable: the loop always returns on the last attempt.
    Err(last_err.expect("retry loop exited without an error"))
}
