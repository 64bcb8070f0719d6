//! Exponential backoff for transient index failures

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::RegistryResult;

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Default backoff with a different retry budget
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay to use after `delay`, capped at `max_delay`
    pub fn next_delay(&self, delay: Duration) -> Duration {
        std::cmp::min(
            Duration::from_millis((delay.as_millis() as f64 * self.multiplier) as u64),
            self.max_delay,
        )
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// Only recoverable errors (fetch and IO failures) are retried; anything
/// else, such as `PackageNotFound`, is returned immediately.
pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, mut operation: F) -> RegistryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RegistryResult<T>>,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) if error.is_recoverable() && attempt < config.max_retries => {
                attempt += 1;
                warn!(
                    attempt,
                    max_retries = config.max_retries,
                    error = %error,
                    "transient index failure, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = config.next_delay(delay);
            },
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_core::error::SprigError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.multiplier, 2.0);
    }

    #[test]
    fn test_next_delay_is_capped() {
        let config = RetryConfig::default();
        assert_eq!(
            config.next_delay(Duration::from_millis(100)),
            Duration::from_millis(200)
        );
        assert_eq!(
            config.next_delay(Duration::from_secs(8)),
            Duration::from_secs(10)
        );
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_with_backoff(&fast(3), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SprigError::fetch_message("timeout"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: RegistryResult<()> = retry_with_backoff(&fast(2), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SprigError::fetch_message("timeout"))
        })
        .await;

        assert!(matches!(result, Err(SprigError::FetchFailure { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: RegistryResult<()> = retry_with_backoff(&fast(5), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SprigError::PackageNotFound {
                name: "ghost".to_string(),
            })
        })
        .await;

        assert!(matches!(result, Err(SprigError::PackageNotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
