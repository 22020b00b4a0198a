//! Retry and timeout helpers for gateway requests
//!
//! Only idempotent requests are retried. Hanging up a call that is already
//! gone is harmless, so termination goes through [`retry_with_backoff`].
//! Initiation is never retried: a duplicate request would dial the customer
//! twice.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::error::{CallError, CallResult};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Spread delays by up to ±10%
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Short retries for requests made while the user waits
    pub fn quick() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 1.5,
            use_jitter: true,
        }
    }

    /// Single attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.use_jitter {
            return delay;
        }
        let jitter = (rand::random::<f64>() - 0.5) * 0.2;
        let millis = delay.as_millis() as f64;
        Duration::from_millis((millis * (1.0 + jitter)) as u64)
    }
}

/// Retry an operation with exponential backoff
///
/// Non-recoverable errors (see [`CallError::is_recoverable`]) are returned
/// immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    operation_name: &str,
    config: RetryConfig,
    mut operation: F,
) -> CallResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CallResult<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        debug!(
            operation = operation_name,
            attempt = attempt,
            max_attempts = config.max_attempts,
            "Attempting operation"
        );

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt = attempt, "Operation succeeded after retries");
                }
                return Ok(result);
            }
            Err(e) if e.is_recoverable() && attempt < config.max_attempts => {
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %e,
                    category = e.category(),
                    next_delay_ms = delay.as_millis() as u64,
                    "Recoverable error, will retry"
                );

                sleep(config.jittered(delay)).await;

                let next_delay_ms = (delay.as_millis() as f64 * config.backoff_multiplier) as u64;
                delay = Duration::from_millis(next_delay_ms).min(config.max_delay);
            }
            Err(e) => {
                if attempt >= config.max_attempts {
                    error!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %e,
                        "Operation failed after all retry attempts"
                    );
                } else {
                    error!(
                        operation = operation_name,
                        error = %e,
                        category = e.category(),
                        "Non-recoverable error, not retrying"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Bound a request by a deadline
pub async fn with_timeout<T, F>(operation_name: &str, timeout: Duration, future: F) -> CallResult<T>
where
    F: Future<Output = CallResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            error!(
                operation = operation_name,
                timeout_ms = timeout.as_millis() as u64,
                "Operation timed out"
            );
            Err(CallError::OperationTimeout {
                duration_ms: timeout.as_millis() as u64,
            })
        }
    }
}

/// Prefix an error with what the engine was doing when it failed
pub trait ErrorContext<T> {
    fn context(self, context: &str) -> CallResult<T>;

    fn with_context<F>(self, f: F) -> CallResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ErrorContext<T> for CallResult<T> {
    fn context(self, context: &str) -> CallResult<T> {
        self.with_context(|| context.to_string())
    }

    /// Keeps media and gateway errors in their category; everything else
    /// becomes an internal error
    fn with_context<F>(self, f: F) -> CallResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let context = f();
            debug!(error = %e, context = %context, category = e.category(), "Adding error context");
            match e {
                CallError::NegotiationFailed { reason } => CallError::NegotiationFailed {
                    reason: format!("{context}: {reason}"),
                },
                CallError::MediaError { details } => CallError::MediaError {
                    details: format!("{context}: {details}"),
                },
                other => CallError::InternalError {
                    message: format!("{context}: {other}"),
                },
            }
        })
    }
}
