//! Bounded retry for a single outbound provider request.
//!
//! Transient failures (rate limiting, overload, transport errors,
//! timeouts) wait and retry; anything else propagates immediately
//! without consuming a retry. The delay before attempt `k+1` is
//! `min(max_delay, initial_delay * k)` — non-decreasing and capped.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::provider::ProviderError;

/// Retry bounds for provider requests.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Maximum total attempts (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay in milliseconds; grows linearly with the attempt count.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Cap for the backoff delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = self
            .initial_delay_ms
            .saturating_mul(u64::from(attempt))
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Runs `op` with bounded retries for transient failures.
///
/// At most `max_attempts` attempts are made; after exhaustion the last
/// transient error propagates. Non-transient errors propagate on first
/// sight.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < config.max_attempts => {
                let delay = config.delay_for(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient provider error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Zero-delay config so tests don't sleep.
    fn instant(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success_is_three_attempts() {
        let calls = AtomicU32::new(0);
        let config = instant(5);

        let result = with_retry(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::RateLimited("429".into()))
                } else {
                    Ok("answer")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_does_not_retry() {
        let calls = AtomicU32::new(0);
        let config = instant(5);

        let result: Result<(), _> = with_retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::InvalidRequest("bad schema".into())) }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_propagates_last_error() {
        let calls = AtomicU32::new(0);
        let config = instant(3);

        let result: Result<(), _> = with_retry(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::Overloaded("529".into()))
                } else {
                    Err(ProviderError::Network("connection reset".into()))
                }
            }
        })
        .await;

        // Exactly max_attempts attempts, last error wins.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let config = instant(3);

        let result = with_retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProviderError>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delays_grow_linearly_and_cap() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay_ms: 500,
            max_delay_ms: 1_200,
        };

        assert_eq!(config.delay_for(1), Duration::from_millis(500));
        assert_eq!(config.delay_for(2), Duration::from_millis(1_000));
        // 1500 capped at 1200
        assert_eq!(config.delay_for(3), Duration::from_millis(1_200));
        assert_eq!(config.delay_for(4), Duration::from_millis(1_200));
    }

    #[test]
    fn test_delays_are_non_decreasing() {
        let config = RetryConfig::default();
        let mut prev = Duration::ZERO;
        for attempt in 1..=20 {
            let d = config.delay_for(attempt);
            assert!(d >= prev, "delay shrank at attempt {attempt}");
            prev = d;
        }
    }

    #[test]
    fn test_default_config_from_empty_toml() {
        let config: RetryConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 8_000);
    }
}
