//! Bounded retry with exponential backoff
//!
//! `retry` runs an async operation until it succeeds, the error is
//! classified as permanent, or the attempt budget is spent. Between attempts
//! it sleeps `min(base * 2^retry, cap)`, or the server-provided delay for
//! rate-limited responses (also capped).

use crate::config::HttpConfig;
use crate::FetchError;
use std::future::Future;
use std::time::Duration;

/// Retry parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
        )
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Permanent failure
    Stop,
    /// Retry after the exponential backoff
    Retry,
    /// Retry after the given delay (capped at the policy maximum)
    RetryAfter(Duration),
}

impl RetryDecision {
    /// Classifies a fetch error
    ///
    /// | Error | Decision |
    /// |-------|----------|
    /// | 404 / 410 | Stop |
    /// | 429 | RetryAfter(Retry-After) or Retry |
    /// | 408, 5xx | Retry |
    /// | other 4xx | Stop |
    /// | timeout, connect, transport | Retry |
    pub fn for_fetch_error(error: &FetchError) -> Self {
        match error {
            FetchError::NotFound(_) => Self::Stop,
            FetchError::RateLimited {
                retry_after: Some(delay),
            } => Self::RetryAfter(*delay),
            FetchError::RateLimited { retry_after: None } => Self::Retry,
            FetchError::Status(code) if *code == 408 || *code >= 500 => Self::Retry,
            FetchError::Status(_) => Self::Stop,
            FetchError::Timeout | FetchError::Connect(_) | FetchError::Request(_) => Self::Retry,
        }
    }
}

/// Final error of a retried operation
#[derive(Debug)]
pub struct Exhausted<E> {
    pub error: E,
    /// Attempts made, including the first
    pub attempts: u32,
}

/// Runs `op` under `policy`
///
/// `op` receives the 0-based attempt number. `classify` decides whether a
/// failed attempt may be retried.
///
/// # Returns
///
/// * `Ok(T)` - An attempt succeeded
/// * `Err(Exhausted<E>)` - The last error and the number of attempts made
pub async fn retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    mut op: F,
    classify: C,
) -> Result<T, Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryDecision,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let decision = classify(&error);
        if decision == RetryDecision::Stop || attempt >= policy.max_retries {
            return Err(Exhausted {
                error,
                attempts: attempt + 1,
            });
        }

        let delay = match decision {
            RetryDecision::RetryAfter(delay) => delay.min(policy.max_delay),
            _ => policy.delay_for(attempt),
        };

        tracing::debug!(
            "Attempt {}/{} failed ({}), retrying in {:?}",
            attempt + 1,
            policy.max_attempts(),
            error,
            delay
        );

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(500));

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_max_attempts() {
        assert_eq!(instant_policy(3).max_attempts(), 4);
        assert_eq!(instant_policy(0).max_attempts(), 1);
    }

    #[test]
    fn test_fetch_error_classification() {
        assert_eq!(
            RetryDecision::for_fetch_error(&FetchError::NotFound(404)),
            RetryDecision::Stop
        );
        assert_eq!(
            RetryDecision::for_fetch_error(&FetchError::Status(503)),
            RetryDecision::Retry
        );
        assert_eq!(
            RetryDecision::for_fetch_error(&FetchError::Status(403)),
            RetryDecision::Stop
        );
        assert_eq!(
            RetryDecision::for_fetch_error(&FetchError::Timeout),
            RetryDecision::Retry
        );
        assert_eq!(
            RetryDecision::for_fetch_error(&FetchError::RateLimited {
                retry_after: Some(Duration::from_secs(2))
            }),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let result: Result<&str, Exhausted<FetchError>> = retry(
            &instant_policy(3),
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(FetchError::Status(502))
                    } else {
                        Ok("body")
                    }
                }
            },
            RetryDecision::for_fetch_error,
        )
        .await;

        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_never_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), Exhausted<FetchError>> = retry(
            &instant_policy(3),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::NotFound(404)) }
            },
            RetryDecision::for_fetch_error,
        )
        .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 1);
        assert!(matches!(exhausted.error, FetchError::NotFound(404)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);

        let result: Result<(), Exhausted<FetchError>> = retry(
            &instant_policy(2),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Timeout) }
            },
            RetryDecision::for_fetch_error,
        )
        .await;

        assert_eq!(result.unwrap_err().attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_after_is_capped() {
        let policy = RetryPolicy::new(1, Duration::ZERO, Duration::from_millis(10));
        let started = std::time::Instant::now();

        let _: Result<(), Exhausted<FetchError>> = retry(
            &policy,
            |_| async {
                Err(FetchError::RateLimited {
                    retry_after: Some(Duration::from_secs(3600)),
                })
            },
            RetryDecision::for_fetch_error,
        )
        .await;

        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
