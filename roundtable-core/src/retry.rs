//! Retry with bounded exponential backoff
//!
//! External calls are retried only while the error reports itself as
//! recoverable; schema and validation failures surface immediately.

use crate::error::{RoundtableError, RoundtableResult};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, warn};

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: usize,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier (exponential backoff)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Single-attempt configuration, useful in tests
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Retry an async operation with exponential backoff
///
/// Non-recoverable errors are returned on the first attempt; recoverable
/// ones are retried until `max_attempts` is exhausted.
pub async fn retry_async<'a, T, F>(
    operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> RoundtableResult<T>
where
    F: Fn() -> BoxFuture<'a, RoundtableResult<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_recoverable() || attempt >= config.max_attempts {
                    error!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Operation failed"
                    );
                    return Err(err);
                }

                let actual_delay = if config.jitter {
                    let jitter = (fastrand::f64() - 0.5) * 0.2;
                    ((delay as f64) * (1.0 + jitter)) as u64
                } else {
                    delay
                };

                warn!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    delay_ms = actual_delay,
                    "Operation failed, retrying"
                );

                sleep(Duration::from_millis(actual_delay)).await;

                delay = ((delay as f64) * config.backoff_multiplier) as u64;
                delay = delay.min(config.max_delay_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorContext, RoundtableError};
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config(max_attempts: usize) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn recoverable_error_is_retried_until_success() {
        let calls = AtomicUsize::new(0);
        let result = retry_async(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(RoundtableError::service_unavailable("flaky", "generator"))
                    } else {
                        Ok(42)
                    }
                }
                .boxed()
            },
            &fast_config(3),
            "test_op",
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_recoverable_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: RoundtableResult<()> = retry_async(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(RoundtableError::Validation {
                        message: "bad input".to_string(),
                        field: None,
                        context: ErrorContext::new("test"),
                    })
                }
                .boxed()
            },
            &fast_config(5),
            "test_op",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_exhaust_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: RoundtableResult<()> = retry_async(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RoundtableError::service_unavailable("down", "search")) }.boxed()
            },
            &fast_config(3),
            "test_op",
        )
        .await;

        assert!(matches!(
            result,
            Err(RoundtableError::ServiceUnavailable { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
