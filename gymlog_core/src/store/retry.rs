//! Bounded retry with exponential backoff for transport failures.

use crate::config::RetryConfig;
use crate::SyncResult;
use std::future::Future;
use std::time::Duration;

/// How often, and how patiently, a failed store call is repeated
///
/// Only [`crate::SyncError::Network`] failures are retried. The default is a
/// single attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the given retry (1-based), doubling each time up to the cap
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// the attempts run out
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "{} failed: {}; retrying in {:?}",
                        operation,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncError;
    use std::cell::Cell;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(30), Duration::from_millis(350));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_server_rejection_is_not_retried() {
        let policy = RetryPolicy::new(4, Duration::ZERO, Duration::ZERO);
        let calls = Cell::new(0);

        let result: SyncResult<()> = policy
            .run("create", || {
                calls.set(calls.get() + 1);
                async {
                    Err(SyncError::ServerRejected {
                        status: Some(500),
                        message: "boom".into(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_network_error_recovers() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO);
        let calls = Cell::new(0);

        let result = policy
            .run("load", || {
                calls.set(calls.get() + 1);
                let attempt = calls.get();
                async move {
                    if attempt < 3 {
                        Err(SyncError::Network("timed out".into()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
    }
}
