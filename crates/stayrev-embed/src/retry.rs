//! Quota-aware retry for embedding requests.
//!
//! [`retry_on_quota`] retries an operation only while it fails with
//! [`EmbedError::RateLimited`]. Every other error is returned on the spot.
//! When the attempt budget runs out the caller gets
//! [`EmbedError::QuotaExceeded`]. There is no cancellation hook: callers that
//! need a deadline wrap the whole call in `tokio::time::timeout`.

use std::future::Future;
use std::time::Duration;

use stayrev_core::{AppConfig, EmbedBackoff};

use crate::error::EmbedError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_DELAY: Duration = Duration::from_secs(20);
const MAX_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never below 1.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub delay: Duration,
    pub backoff: EmbedBackoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
            backoff: EmbedBackoff::Fixed,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.embed_max_attempts.max(1),
            delay: Duration::from_secs(config.embed_retry_delay_secs),
            backoff: config.embed_backoff,
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// | Backoff       | Delay                                     |
    /// |---------------|-------------------------------------------|
    /// | `Fixed`       | `delay`                                   |
    /// | `Exponential` | `min(delay × 2^(retry-1), 5 min)` ± 25 % jitter |
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            EmbedBackoff::Fixed => self.delay,
            EmbedBackoff::Exponential => {
                let factor = 1u32 << retry.saturating_sub(1).min(10);
                let capped = self.delay.saturating_mul(factor).min(MAX_DELAY);
                capped.mul_f64(rand::random::<f64>() * 0.5 + 0.75)
            }
        }
    }
}

/// Run `operation`, retrying on rate limits according to `policy`.
///
/// # Errors
///
/// Returns [`EmbedError::QuotaExceeded`] once `policy.max_attempts` attempts
/// have all been rate limited. Any other error from `operation` is returned
/// immediately without retry.
pub async fn retry_on_quota<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, EmbedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EmbedError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(EmbedError::RateLimited(reason)) => {
                if attempt >= max_attempts {
                    tracing::error!(
                        attempts = attempt,
                        reason = %reason,
                        "embedding quota exhausted"
                    );
                    return Err(EmbedError::QuotaExceeded { attempts: attempt });
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    reason = %reason,
                    "embedding rate limited; retrying after delay"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn fixed(max_attempts: u32, secs: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_secs(secs),
            backoff: EmbedBackoff::Fixed,
        }
    }

    /// Operation that is rate limited `failures` times, then returns 7.
    fn flaky(
        calls: &Arc<AtomicU32>,
        failures: u32,
    ) -> impl FnMut() -> std::future::Ready<Result<u32, EmbedError>> {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < failures {
                Err(EmbedError::RateLimited("429".to_owned()))
            } else {
                Ok(7)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_quota_errors_then_success_waits_forty_seconds() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let result = retry_on_quota(&fixed(3, 20), flaky(&calls, 2)).await;

        assert_eq!(result.expect("third attempt succeeds"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn three_quota_errors_is_quota_exceeded() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let result = retry_on_quota(&fixed(3, 20), flaky(&calls, 3)).await;

        assert!(matches!(result, Err(EmbedError::QuotaExceeded { attempts: 3 })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // No sleep after the final attempt.
        assert!(start.elapsed() < Duration::from_secs(41));
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_on_quota(&fixed(3, 20), || {
            c.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<u32, _>(EmbedError::Api {
                    status: 500,
                    body: "boom".to_owned(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(EmbedError::Api { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_immediately_without_sleeping() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_on_quota(&fixed(3, 3600), flaky(&calls, 0)).await;
        assert_eq!(result.expect("first attempt succeeds"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_never_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_on_quota(&fixed(1, 20), flaky(&calls, 1)).await;
        assert!(matches!(result, Err(EmbedError::QuotaExceeded { attempts: 1 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exponential_delay_doubles_within_jitter_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_secs(20),
            backoff: EmbedBackoff::Exponential,
        };
        let second = policy.delay_for(2);
        assert!(second >= Duration::from_secs(30) && second <= Duration::from_secs(50));
        assert!(policy.delay_for(10) <= MAX_DELAY.mul_f64(1.25));
    }

    #[test]
    fn fixed_delay_is_constant() {
        let policy = fixed(3, 20);
        assert_eq!(policy.delay_for(1), Duration::from_secs(20));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
    }

    #[test]
    fn default_policy_is_three_attempts_twenty_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(20));
        assert_eq!(policy.backoff, EmbedBackoff::Fixed);
    }
}
