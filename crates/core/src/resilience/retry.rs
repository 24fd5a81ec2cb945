//! Fixed-backoff retry for transient failures.

use std::future::Future;
use std::time::Duration;

use bank_shared::config::EventConfig;
use tokio::time::sleep;
use tracing::{info, warn};

/// How many times to try an operation and how long to wait in between.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `backoff`: 1 second
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero behaves as one.
    pub max_attempts: usize,
    /// Delay between consecutive attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_attempts: usize, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Creates the read-model consumer's policy from configuration.
    #[must_use]
    pub fn from_config(config: &EventConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.backoff_ms))
    }

    /// Attempts actually made before giving up.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }
}

/// Runs `operation` until it succeeds or the policy's attempts are used up.
///
/// # Returns
///
/// The first success, or the error of the last attempt.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt >= attempts => {
                warn!(attempt, error = %err, "Giving up after final attempt");
                return Err(err);
            }
            Err(err) => {
                warn!(
                    attempt,
                    max_attempts = attempts,
                    backoff_ms = u64::try_from(policy.backoff.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Attempt failed, retrying"
                );
                sleep(policy.backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from_config(&EventConfig::default());
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let started = tokio::time::Instant::now();

        let result = retry_with_backoff(&RetryPolicy::default(), || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("transient")
            } else {
                Ok("applied")
            }
        })
        .await;

        assert_eq!(result, Ok("applied"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two fixed one-second waits.
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_error_when_exhausted() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let result: Result<(), String> = retry_with_backoff(&RetryPolicy::default(), || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Err(format!("failure {n}"))
        })
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_success_does_not_wait() {
        let policy = RetryPolicy::new(3, Duration::from_secs(60));
        let result = retry_with_backoff(&policy, || async { Ok::<_, String>(1) }).await;
        assert_eq!(result, Ok(1));
    }
}
