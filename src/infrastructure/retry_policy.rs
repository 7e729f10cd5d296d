//! Retry policy for network calls
//!
//! `RetryPolicy::decide` is a pure function of the attempt number and the
//! error class. `RetryPolicy::execute` drives an operation through it and
//! records every attempt, retry and final outcome in [`Statistics`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::Statistics;
use crate::infrastructure::config::{BackoffConfig, RetryConfig};

/// Whether an error is worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network, timeout or server-side failure
    Transient,
    /// Anything else; propagated immediately
    Fatal,
}

/// Outcome of [`RetryPolicy::decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

/// Errors that can be fed to a [`RetryPolicy`]
pub trait RetryableError: Display {
    fn class(&self) -> ErrorClass;

    /// Stable key used for the failures-by-kind counter
    fn kind(&self) -> &'static str;
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    multiplier: u64,
    min_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, multiplier: u64, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            multiplier,
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.multiplier,
            Duration::from_secs(config.min_delay_seconds),
            Duration::from_secs(config.max_delay_seconds),
        )
    }

    /// Login policy: 3 attempts, 2-10s backoff
    pub fn login() -> Self {
        Self::from_config(&RetryConfig::default().login)
    }

    /// List page and profile policy: 3 attempts, 1-5s backoff
    pub fn fetch() -> Self {
        Self::from_config(&RetryConfig::default().fetch)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let secs = self.multiplier.saturating_mul(2_u64.saturating_pow(exponent));
        Duration::from_secs(secs).clamp(self.min_delay, self.max_delay)
    }

    /// Decide what to do after `attempt` attempts have failed with `class`
    pub fn decide(&self, attempt: u32, class: ErrorClass) -> RetryDecision {
        match class {
            ErrorClass::Fatal => RetryDecision::GiveUp,
            ErrorClass::Transient if attempt >= self.max_attempts => RetryDecision::GiveUp,
            ErrorClass::Transient => RetryDecision::Retry(self.backoff(attempt)),
        }
    }

    /// Run `op` until it succeeds or the policy gives up.
    ///
    /// Statistics: one request per attempt, one success or one failure per
    /// call, one retry per retry decision (recorded before the delay).
    pub async fn execute<T, E, F, Fut>(&self, stats: &Statistics, label: &str, mut op: F) -> Result<T, E>
    where
        E: RetryableError,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            stats.record_request().await;
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    stats.record_success().await;
                    return Ok(value);
                }
                Err(error) => match self.decide(attempt, error.class()) {
                    RetryDecision::Retry(delay) => {
                        stats.record_retry().await;
                        warn!(
                            "{} failed (attempt {}/{}), retrying in {:?}: {}",
                            label, attempt, self.max_attempts, delay, error
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::GiveUp => {
                        stats.record_failure(error.kind()).await;
                        return Err(error);
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Debug)]
    struct TestError(ErrorClass);

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error ({:?})", self.0)
        }
    }

    impl RetryableError for TestError {
        fn class(&self) -> ErrorClass {
            self.0
        }

        fn kind(&self) -> &'static str {
            "test"
        }
    }

    #[rstest]
    #[case(1, Duration::from_secs(1))]
    #[case(2, Duration::from_secs(2))]
    #[case(3, Duration::from_secs(4))]
    #[case(4, Duration::from_secs(5))]
    #[case(30, Duration::from_secs(5))]
    fn fetch_backoff_is_bounded(#[case] attempt: u32, #[case] expected: Duration) {
        assert_eq!(RetryPolicy::fetch().backoff(attempt), expected);
    }

    #[rstest]
    #[case(1, Duration::from_secs(2))]
    #[case(2, Duration::from_secs(2))]
    #[case(3, Duration::from_secs(4))]
    #[case(5, Duration::from_secs(10))]
    fn login_backoff_is_bounded(#[case] attempt: u32, #[case] expected: Duration) {
        assert_eq!(RetryPolicy::login().backoff(attempt), expected);
    }

    #[test]
    fn fatal_errors_give_up_immediately() {
        assert_eq!(RetryPolicy::fetch().decide(1, ErrorClass::Fatal), RetryDecision::GiveUp);
    }

    #[test]
    fn transient_errors_stop_at_max_attempts() {
        let policy = RetryPolicy::fetch();
        assert_eq!(
            policy.decide(1, ErrorClass::Transient),
            RetryDecision::Retry(Duration::from_secs(1))
        );
        assert_eq!(
            policy.decide(2, ErrorClass::Transient),
            RetryDecision::Retry(Duration::from_secs(2))
        );
        assert_eq!(policy.decide(3, ErrorClass::Transient), RetryDecision::GiveUp);
    }

    proptest! {
        #[test]
        fn backoff_stays_within_bounds_and_never_shrinks(
            min in 0u64..20,
            extra in 0u64..60,
            multiplier in 0u64..8,
            attempt in 1u32..64,
        ) {
            let policy = RetryPolicy::new(
                5,
                multiplier,
                Duration::from_secs(min),
                Duration::from_secs(min + extra),
            );
            let delay = policy.backoff(attempt);
            prop_assert!(delay >= Duration::from_secs(min));
            prop_assert!(delay <= Duration::from_secs(min + extra));
            prop_assert!(policy.backoff(attempt + 1) >= delay);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_transient_failures_then_success() {
        let stats = Statistics::new();
        let attempt_times = Mutex::new(Vec::new());

        let result = RetryPolicy::fetch()
            .execute(&stats, "flaky", |attempt| {
                attempt_times.lock().unwrap().push(Instant::now());
                async move {
                    if attempt < 3 {
                        Err(TestError(ErrorClass::Transient))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot.retries, 2);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.requests_made, 3);
        assert_eq!(snapshot.total_failures(), 0);

        let times = attempt_times.lock().unwrap();
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_secs(1));
        assert!(second_gap >= first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_count_one_failure() {
        let stats = Statistics::new();

        let result: Result<(), _> = RetryPolicy::fetch()
            .execute(&stats, "down", |_| async { Err(TestError(ErrorClass::Transient)) })
            .await;

        assert!(result.is_err());
        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot.requests_made, 3);
        assert_eq!(snapshot.retries, 2);
        assert_eq!(snapshot.failures_of("test"), 1);
        assert_eq!(snapshot.successes, 0);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let stats = Statistics::new();

        let result: Result<(), _> = RetryPolicy::login()
            .execute(&stats, "login", |_| async { Err(TestError(ErrorClass::Fatal)) })
            .await;

        assert!(result.is_err());
        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot.requests_made, 1);
        assert_eq!(snapshot.retries, 0);
        assert_eq!(snapshot.failures_of("test"), 1);
    }
}
