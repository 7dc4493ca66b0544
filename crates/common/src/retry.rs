//! Retry utilities.
//!
//! Retries async operations with exponential backoff. Callers decide which
//! errors are worth retrying.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_attempts: u32,

    #[serde(with = "millis")]
    pub initial_delay: Duration,

    #[serde(with = "millis")]
    pub max_delay: Duration,

    /// Backoff multiplier (e.g., 2.0 for doubling)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::exponential(3)
    }
}

impl RetryConfig {
    /// Exponential backoff starting at 100ms, capped at 10s.
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.powi(retry.saturating_sub(1) as i32);
        let delay_ms = self.initial_delay.as_millis() as f64 * factor;
        Duration::from_millis(delay_ms.min(u64::MAX as f64) as u64).min(self.max_delay)
    }
}

/// Retry an async operation while `should_retry` accepts the error.
///
/// # Examples
///
/// ```no_run
/// use customer_analytics_common::retry::{retry_with_predicate, RetryConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let result = retry_with_predicate(
///         RetryConfig::exponential(3),
///         || async {
///             Err::<(), _>(std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout"))
///         },
///         |err| err.kind() == std::io::ErrorKind::TimedOut,
///     )
///     .await;
///     assert!(result.is_err());
/// }
/// ```
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    config: RetryConfig,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut retry = 0u32;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if !should_retry(&error) || retry >= config.max_attempts {
                    return Err(error);
                }

                retry += 1;
                let delay = config.delay_for(retry);
                tracing::debug!(
                    attempt = retry,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying operation after retryable error"
                );
                sleep(delay).await;
            }
        }
    }
}

/// Retry an async operation on any error.
pub async fn retry_with_backoff<F, Fut, T, E>(config: RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_predicate(config, operation, |_| true).await
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
