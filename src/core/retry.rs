//! Bounded exponential backoff for delivery attempts.
//!
//! The delay is computed before each retry, never before the first
//! attempt, and is capped. A server-provided retry-after hint takes
//! precedence over the computed delay. Sleeps go through
//! `tokio::time::sleep`, so dropping the future (caller timeout,
//! shutdown) cancels an in-flight backoff.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::DeliveryError;

/// Retry behavior for one delivery call. Immutable per call; no state
/// is shared across concurrent calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-indexed), capped at
    /// `max_delay_ms`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(retry as i32);
        let delay_ms = (self.initial_delay_ms as f64 * multiplier).min(self.max_delay_ms as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

/// What one `retry_with_backoff` call produced, with the attempt count
/// either way.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, DeliveryError>,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails with a non-retryable error,
/// or the attempt budget is spent.
///
/// Error details are expected to be scrubbed at construction, so the
/// exhausted-retries detail (the last error's display form) is safe to
/// surface.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeliveryError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(err) if !err.is_retryable() => {
                return RetryOutcome {
                    result: Err(err),
                    attempts: attempt,
                }
            }
            Err(err) => {
                if attempt >= max_attempts {
                    return RetryOutcome {
                        result: Err(DeliveryError::ExhaustedRetries {
                            attempts: attempt,
                            detail: err.to_string(),
                        }),
                        attempts: attempt,
                    };
                }

                let delay = err
                    .retry_after_hint()
                    .unwrap_or_else(|| policy.delay_for_retry(attempt - 1));
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
