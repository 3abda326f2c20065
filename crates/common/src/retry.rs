//! Retry executor with exponential backoff.
//!
//! Every remote call that can fail for transient reasons (gateway hiccups,
//! timeouts, 5xx responses) goes through [`RetryPolicy::execute`] or
//! [`RetryPolicy::execute_when`]. The delay before retry `n` (0-based) is
//! `base_delay * 2^n`, optionally capped by `max_delay`.

use std::{future::Future, time::Duration};

use tracing::debug;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Observer payload handed to the `on_retry` callback before each retry.
#[derive(Debug)]
pub struct RetryAttempt<'a, E> {
    /// 1-based number of the attempt that just failed.
    pub attempt: u32,
    pub max_attempts: u32,
    /// How long the executor will sleep before the next attempt.
    pub delay: Duration,
    pub error: &'a E,
}

/// Attempt budget and backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay. `None` means uncapped.
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: None,
        }
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Backoff before the retry following failure number `attempt_index + 1`.
    #[must_use]
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt_index));
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Run `op`, retrying every failure until the attempt budget is spent.
    ///
    /// The last error is returned unchanged.
    pub async fn execute<T, E, Op, Fut, R>(&self, op: Op, on_retry: R) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnMut(&RetryAttempt<'_, E>),
    {
        self.execute_when(op, |_| true, on_retry).await
    }

    /// Like [`execute`](Self::execute), but errors for which `should_retry`
    /// returns `false` are propagated immediately without consuming attempts.
    pub async fn execute_when<T, E, Op, Fut, P, R>(
        &self,
        mut op: Op,
        should_retry: P,
        mut on_retry: R,
    ) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        R: FnMut(&RetryAttempt<'_, E>),
    {
        let max_attempts = self.attempt_budget();
        let mut attempt = 0;

        loop {
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            attempt += 1;

            if attempt >= max_attempts || !should_retry(&error) {
                return Err(error);
            }

            let delay = self.delay_for(attempt - 1);
            on_retry(&RetryAttempt {
                attempt,
                max_attempts,
                delay,
                error: &error,
            });
            debug!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "operation failed, backing off before retry"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::atomic::{AtomicU32, Ordering},
    };

    #[derive(Debug, PartialEq, Eq)]
    enum Failure {
        Flaky(u32),
        Fatal,
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn first_success_skips_observer() {
        let mut observed = 0;
        let result: Result<u32, Failure> = fast(3)
            .execute(|| async { Ok(7) }, |_| observed += 1)
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(observed, 0);
    }

    #[tokio::test]
    async fn two_failures_then_success_notifies_twice() {
        let calls = AtomicU32::new(0);
        let mut observed = Vec::new();
        let result = fast(3)
            .execute(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(Failure::Flaky(n))
                        } else {
                            Ok("done")
                        }
                    }
                },
                |attempt| observed.push(attempt.attempt),
            )
            .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(observed, vec![1, 2]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_returns_last_error() {
        let calls = AtomicU32::new(0);
        let mut observed = 0;
        let result: Result<(), Failure> = fast(4)
            .execute(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move { Err(Failure::Flaky(n)) }
                },
                |_| observed += 1,
            )
            .await;
        assert_eq!(result, Err(Failure::Flaky(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(observed, 3);
    }

    #[tokio::test]
    async fn non_retryable_error_is_not_repeated() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> = fast(5)
            .execute_when(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(Failure::Fatal) }
                },
                |e| matches!(e, Failure::Flaky(_)),
                |_| panic!("observer must not run for fatal errors"),
            )
            .await;
        assert_eq!(result, Err(Failure::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let _ = fast(0)
            .execute(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(Failure::Fatal) }
                },
                |_| {},
            )
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_respects_cap() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));

        let capped = policy.with_max_delay(Duration::from_millis(250));
        assert_eq!(capped.delay_for(1), Duration::from_millis(200));
        assert_eq!(capped.delay_for(6), Duration::from_millis(250));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new(100, Duration::from_secs(1));
        assert_eq!(
            policy.delay_for(64),
            Duration::from_secs(u64::from(u32::MAX))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_exponentially_between_attempts() {
        let start = tokio::time::Instant::now();
        let result: Result<(), Failure> = RetryPolicy::new(3, Duration::from_millis(500))
            .execute(|| async { Err(Failure::Flaky(0)) }, |_| {})
            .await;
        assert!(result.is_err());
        // 500ms after the first failure, 1000ms after the second.
        assert_eq!(start.elapsed(), Duration::from_millis(1_500));
    }
}
