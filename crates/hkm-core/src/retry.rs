//! Exponential backoff around a fallible async operation.
//!
//! The loop is result-based: errors say whether they are worth another
//! attempt via [`Retryable`]. Two bounds apply and whichever triggers first
//! stops retrying: total attempts, and total elapsed time.

use std::{future::Future, time::Duration};

use tokio::time::{sleep, Instant};

/// Classification hook for the retry loop.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. `0` is treated as `1`.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after every failure.
    pub base_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// No new attempt starts once this much time has passed since the first.
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_elapsed: Duration::ZERO,
        }
    }

    /// Delay after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy is exhausted. The last error is returned on exhaustion.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };

        if !err.is_retryable() {
            return Err(err);
        }
        if attempt >= max_attempts {
            tracing::warn!(attempt, error = %err, "giving up: max attempts reached");
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        if started.elapsed() + delay > policy.max_elapsed {
            tracing::warn!(attempt, error = %err, "giving up: max retry time exceeded");
            return Err(err);
        }

        tracing::warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after transient failure"
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum FakeError {
        Transient,
        Fatal,
    }

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for FakeError {
        fn is_retryable(&self) -> bool {
            matches!(self, FakeError::Transient)
        }
    }

    fn policy(max_attempts: u32, max_elapsed_secs: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_elapsed: Duration::from_secs(max_elapsed_secs),
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let p = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
            max_elapsed: Duration::from_secs(60),
        };
        assert_eq!(p.delay_for(1), Duration::from_millis(500));
        assert_eq!(p.delay_for(2), Duration::from_secs(1));
        assert_eq!(p.delay_for(3), Duration::from_secs(2));
        assert_eq!(p.delay_for(4), Duration::from_secs(3));
        assert_eq!(p.delay_for(64), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_op_stops_at_max_attempts() {
        let calls = AtomicU32::new(0);
        let out: Result<(), FakeError> = retry(&policy(4, 3600), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FakeError::Transient) }
        })
        .await;

        assert_eq!(out, Err(FakeError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_early_when_time_budget_is_spent() {
        // Delays: 1s, 2s, 4s ... the third sleep would cross the 5s budget.
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let out: Result<(), FakeError> = retry(&policy(100, 5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FakeError::Transient) }
        })
        .await;

        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() <= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let out: Result<(), FakeError> = retry(&policy(5, 3600), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FakeError::Fatal) }
        })
        .await;

        assert_eq!(out, Err(FakeError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let out: Result<u32, FakeError> = retry(&policy(5, 3600), |attempt| async move {
            if attempt < 3 {
                Err(FakeError::Transient)
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(out, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let _: Result<(), FakeError> = retry(&policy(0, 3600), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FakeError::Transient) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
