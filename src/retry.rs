//! Retry policies for the two transient failure classes of the API.
//!
//! [`RateLimitRetry`] handles 429 responses, waiting until the instant named
//! by `X-RateLimit-Reset` (or `Retry-After`) when the remote provides one.
//! [`ConflictRetry`] handles 409 responses, re-reading the target object
//! before each new attempt. Both are bounded; once the budget is spent the
//! last error is returned unchanged and the caller maps it.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use tracing::debug;

use crate::api::{ApiError, ApiResult};

/// Retry bounds and sleep window shared by both policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Retries after a 429 before giving up.
    pub max_rate_limit_retries: u32,
    /// Retries after a 409 before giving up.
    pub max_conflict_retries: u32,
    /// Lower bound of the random sleep.
    pub min_sleep: Duration,
    /// Upper bound of the random sleep.
    pub max_sleep: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 20,
            max_conflict_retries: 5,
            min_sleep: Duration::from_millis(200),
            max_sleep: Duration::from_millis(500),
        }
    }
}

impl RetrySettings {
    /// Same bounds as the default, without sleeping between attempts.
    pub fn immediate() -> Self {
        Self {
            min_sleep: Duration::ZERO,
            max_sleep: Duration::ZERO,
            ..Self::default()
        }
    }

    /// A sleep drawn uniformly from `min_sleep..=max_sleep`.
    pub fn random_sleep(&self) -> Duration {
        if self.max_sleep <= self.min_sleep {
            return self.min_sleep;
        }
        rand::thread_rng().gen_range(self.min_sleep..=self.max_sleep)
    }
}

/// Retries a call while the remote answers 429.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRetry<'a> {
    settings: &'a RetrySettings,
}

impl<'a> RateLimitRetry<'a> {
    /// Create a policy bound by `settings`.
    pub fn new(settings: &'a RetrySettings) -> Self {
        Self { settings }
    }

    /// Run `call` until it stops answering 429 or the budget is spent.
    pub async fn run<T, F, Fut>(&self, op: &str, mut call: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Err(err) if err.is_rate_limited() && attempt < self.settings.max_rate_limit_retries => {
                    attempt += 1;
                    let sleep = self.sleep_for(&err);
                    debug!(
                        op,
                        attempt,
                        sleep_ms = sleep.as_millis() as u64,
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(sleep).await;
                },
                other => return other,
            }
        }
    }

    fn sleep_for(&self, err: &ApiError) -> Duration {
        if let Some(reset) = err.rate_limit_reset() {
            return reset_delay(reset, now_millis(), self.settings);
        }
        if let Some(after) = err.retry_after() {
            return after;
        }
        self.settings.random_sleep()
    }
}

/// Retries a call while the remote answers 409, refreshing in between.
#[derive(Debug, Clone, Copy)]
pub struct ConflictRetry<'a> {
    settings: &'a RetrySettings,
}

impl<'a> ConflictRetry<'a> {
    /// Create a policy bound by `settings`.
    pub fn new(settings: &'a RetrySettings) -> Self {
        Self { settings }
    }

    /// Run `call` until it stops answering 409 or the budget is spent.
    ///
    /// `refresh` re-reads the target before every retry; a failing refresh
    /// ends the loop with its error.
    pub async fn run<T, R, F, RFut, Fut>(&self, op: &str, mut refresh: R, mut call: F) -> ApiResult<T>
    where
        R: FnMut() -> RFut,
        RFut: Future<Output = ApiResult<()>>,
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Err(err) if err.is_conflict() && attempt < self.settings.max_conflict_retries => {
                    attempt += 1;
                    let sleep = self.settings.random_sleep();
                    debug!(
                        op,
                        attempt,
                        sleep_ms = sleep.as_millis() as u64,
                        "Conflict, refreshing and retrying"
                    );
                    tokio::time::sleep(sleep).await;
                    refresh().await?;
                },
                other => return other,
            }
        }
    }
}

/// Time to wait for a reset instant given in epoch milliseconds.
///
/// A reset already reached only waits the random sleep. Anything further out
/// than [`MAX_RESET_WAIT`] is clamped to it.
pub fn reset_delay(reset_millis: u64, now_millis: u64, settings: &RetrySettings) -> Duration {
    if reset_millis <= now_millis {
        return settings.random_sleep();
    }
    Duration::from_millis(reset_millis - now_millis).min(MAX_RESET_WAIT)
}

/// Upper bound on a sleep derived from `X-RateLimit-Reset`.
pub const MAX_RESET_WAIT: Duration = Duration::from_secs(60);

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn status(code: u16) -> ApiError {
        ApiError::status(code, "try again")
    }

    #[test]
    fn test_default_bounds() {
        let settings = RetrySettings::default();
        assert_eq!(settings.max_rate_limit_retries, 20);
        assert_eq!(settings.max_conflict_retries, 5);
    }

    #[test]
    fn test_random_sleep_within_window() {
        let settings = RetrySettings::default();
        for _ in 0..50 {
            let sleep = settings.random_sleep();
            assert!(sleep >= Duration::from_millis(200));
            assert!(sleep <= Duration::from_millis(500));
        }
        assert_eq!(RetrySettings::immediate().random_sleep(), Duration::ZERO);
    }

    #[test]
    fn test_reset_delay() {
        let settings = RetrySettings::default();
        assert_eq!(reset_delay(1_500, 1_000, &settings), Duration::from_millis(500));
    }

    #[test]
    fn test_past_reset_waits_only_the_random_sleep() {
        let settings = RetrySettings::default();
        for now in [1_000, 1_300, 90_000_000] {
            let sleep = reset_delay(1_000, now, &settings);
            assert!(sleep >= settings.min_sleep);
            assert!(sleep <= settings.max_sleep);
        }
        assert_eq!(
            reset_delay(1_000, 1_300, &RetrySettings::immediate()),
            Duration::ZERO
        );
    }

    #[test]
    fn test_far_reset_is_clamped() {
        let settings = RetrySettings::default();
        let now = 1_700_000_000_000;
        // Seconds mistaken for milliseconds land decades away.
        let reset = now + 1_700_000_000_000;
        assert_eq!(reset_delay(reset, now, &settings), MAX_RESET_WAIT);
        assert_eq!(
            reset_delay(now + 120_000, now, &settings),
            MAX_RESET_WAIT
        );
    }

    #[tokio::test]
    async fn test_rate_limit_retries_until_success() {
        let settings = RetrySettings::immediate();
        let calls = &AtomicU32::new(0);

        let result = RateLimitRetry::new(&settings)
            .run("get webhook", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(status(429))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(assert_ok!(result), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_rate_limit_is_bounded() {
        let settings = RetrySettings {
            max_rate_limit_retries: 2,
            ..RetrySettings::immediate()
        };
        let calls = &AtomicU32::new(0);

        let result: ApiResult<()> = RateLimitRetry::new(&settings)
            .run("get webhook", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(status(429))
            })
            .await;

        assert!(assert_err!(result).is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_passes_other_errors_through() {
        let settings = RetrySettings::immediate();
        let calls = &AtomicU32::new(0);

        let result: ApiResult<()> = RateLimitRetry::new(&settings)
            .run("get webhook", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(status(409))
            })
            .await;

        assert!(assert_err!(result).is_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_conflict_refreshes_between_attempts() {
        let settings = RetrySettings::immediate();
        let calls = &AtomicU32::new(0);
        let refreshes = &AtomicU32::new(0);

        let result = ConflictRetry::new(&settings)
            .run(
                "update segment",
                || async move {
                    refreshes.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                || async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(status(409))
                    } else {
                        Ok(7)
                    }
                },
            )
            .await;

        assert_eq!(assert_ok!(result), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_conflict_is_bounded() {
        let settings = RetrySettings::immediate();
        let calls = &AtomicU32::new(0);

        let result: ApiResult<()> = ConflictRetry::new(&settings)
            .run(
                "update segment",
                || async move { Ok(()) },
                || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(status(409))
                },
            )
            .await;

        assert!(assert_err!(result).is_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_conflict_stops_on_failed_refresh() {
        let settings = RetrySettings::immediate();

        let result: ApiResult<()> = ConflictRetry::new(&settings)
            .run(
                "update segment",
                || async move { Err(status(404)) },
                || async move { Err(status(409)) },
            )
            .await;

        assert_eq!(assert_err!(result).status_code(), Some(404));
    }
}
