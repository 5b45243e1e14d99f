//! Generic retry-with-backoff for fallible async operations.
//!
//! [`retry`] runs an operation up to [`RetryPolicy::tries`] times. Between
//! attempts it sleeps `delay * backoff^(n-1)`, but only while the caller's
//! predicate says the error is worth retrying. The first success is returned;
//! otherwise the last error propagates unchanged.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub tries: u32,
    /// Pause before the second attempt.
    pub delay: Duration,
    /// Multiplier applied to the pause after each failed attempt.
    pub backoff: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            tries: 3,
            delay: Duration::from_secs(2),
            backoff: 2,
        }
    }
}

impl RetryPolicy {
    /// Pause taken after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff.saturating_pow(attempt.saturating_sub(1));
        self.delay.saturating_mul(factor)
    }
}

/// Run `operation` under `policy`, retrying errors accepted by `should_retry`.
///
/// Each failed attempt that will be retried is logged at `warn` with the
/// attempt number and the pause that follows.
///
/// # Arguments
///
/// * `policy` - Attempt count and pause schedule; `tries` of 0 counts as 1
/// * `label` - Name of the operation in the retry log lines
/// * `operation` - Produces a fresh future for every attempt
/// * `should_retry` - Decides whether an error is worth another attempt
///
/// # Returns
///
/// The first `Ok`, or the error of the last attempt made. An error rejected
/// by `should_retry` is returned immediately without sleeping.
///
/// # Examples
///
/// ```ignore
/// let html = retry(RetryPolicy::default(), "medium listing", || fetch(&url), |e| {
///     matches!(e, Error::Http(_))
/// })
/// .await?;
/// ```
pub async fn retry<T, E, F, Fut, P>(
    policy: RetryPolicy,
    label: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let tries = policy.tries.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < tries && should_retry(&e) => {
                let delay = policy.delay_after(attempt);
                warn!(%label, attempt, tries, ?delay, error = %e, "Operation failed; retrying");
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[test]
    fn test_delay_after_grows_geometrically() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_success() {
        let calls = Cell::new(0);
        let result: Result<&str, String> = retry(
            RetryPolicy::default(),
            "test",
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { if n < 2 { Err("boom".to_string()) } else { Ok("ok") } }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_propagates_last_error_after_all_tries() {
        let calls = Cell::new(0);
        let start = Instant::now();
        let result: Result<(), String> = retry(
            RetryPolicy::default(),
            "test",
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Err(format!("failure {n}")) }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.get(), 3);
        // 2s + 4s of backoff between the three attempts
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), String> = retry(
            RetryPolicy::default(),
            "test",
            || {
                calls.set(calls.get() + 1);
                async { Err("permanent".to_string()) }
            },
            |e| e != "permanent",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
