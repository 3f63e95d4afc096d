//! Retry and pacing for channel writes.
//!
//! [`RetryPolicy`] turns into a backon exponential schedule; the executor
//! walks that schedule itself so every sleep goes through a [`Sleeper`]
//! and tests never wait on the wall clock.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use rand::Rng;

use crate::channel::{ChannelError, short_error_message};

/// Default number of attempts per action, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default first backoff delay.
pub const DEFAULT_MIN_DELAY_MS: u64 = 2_000;
/// Default backoff ceiling.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Bounded exponential backoff for transient channel failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per action, including the first. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay before the first retry. Later delays double from here.
    pub min_delay: Duration,
    /// Upper bound for any single delay, including a server's `Retry-After`.
    pub max_delay: Duration,
    /// Randomize each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_delay: Duration::from_millis(DEFAULT_MIN_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            min_delay,
            max_delay,
            jitter: true,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Build the backon schedule: one delay per retry.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBuilder {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay.max(self.min_delay))
            .with_max_times(retries);
        if self.jitter {
            builder = builder.with_jitter();
        }
        builder
    }

    /// Delays to sleep between attempts, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + Send + use<> {
        self.backoff().build()
    }
}

/// Suspension point for backoff and pacing delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Randomized delay between successive writes of the same kind.
///
/// Marketplaces flag accounts that write at a fixed cadence; each gap is
/// drawn uniformly from `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Shortest gap between two writes of the same kind.
    pub min: Duration,
    /// Longest gap; the actual gap is drawn uniformly from `min..=max`.
    pub max: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(500),
            max: Duration::from_millis(2_000),
        }
    }
}

impl Pacing {
    /// No delay between writes.
    #[must_use]
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// A transient failure that is about to be retried.
#[derive(Debug, Clone)]
pub struct RetryNotice {
    /// The attempt that just failed (1-indexed).
    pub attempt: u32,
    pub delay: Duration,
    pub error: String,
}

/// Run `operation`, retrying transient [`ChannelError`]s per `policy`.
///
/// Permanent and already-converged errors return immediately. When the
/// channel sends a retry-after hint, the longer of hint and backoff is
/// used, capped at `policy.max_delay`. `on_retry` sees each retry before
/// the sleep.
pub async fn with_retry<T, F, Fut, N>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, ChannelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChannelError>>,
    N: FnMut(&RetryNotice),
{
    let mut delays = policy.delays();
    let mut attempt: u32 = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_transient() {
            return Err(err);
        }
        let Some(backoff) = delays.next() else {
            return Err(err);
        };
        let delay = match err.retry_after() {
            Some(hint) => hint.max(backoff).min(policy.max_delay.max(backoff)),
            None => backoff,
        };

        let notice = RetryNotice {
            attempt,
            delay,
            error: short_error_message(&err),
        };
        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %notice.error,
            "Transient channel error, retrying"
        );
        on_retry(&notice);

        sleeper.sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(duration);
        }
    }

    fn whole_secs(d: Duration) -> u64 {
        d.as_secs_f64().round() as u64
    }

    fn fixed(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_secs(1), Duration::from_secs(8))
            .with_jitter(false)
    }

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(policy.min_delay, Duration::from_millis(DEFAULT_MIN_DELAY_MS));
        assert!(policy.jitter);
    }

    #[test]
    fn delays_double_up_to_the_ceiling() {
        let delays: Vec<u64> = fixed(6).delays().map(whole_secs).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 8]);
    }

    #[test]
    fn no_retry_has_no_delays() {
        assert_eq!(RetryPolicy::no_retry().delays().count(), 0);
    }

    #[test]
    fn pacing_stays_in_bounds() {
        let pacing = Pacing {
            min: Duration::from_millis(100),
            max: Duration::from_millis(300),
        };
        for _ in 0..100 {
            let d = pacing.next_delay();
            assert!(d >= pacing.min && d <= pacing.max, "{d:?}");
        }
        assert_eq!(Pacing::none().next_delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_after_two_transient_failures() {
        let calls = AtomicU32::new(0);
        let sleeper = RecordingSleeper::default();
        let mut notices = Vec::new();

        let result = with_retry(
            &fixed(3),
            &sleeper,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ChannelError::network("connection reset"))
                    } else {
                        Ok("remote-1")
                    }
                }
            },
            |notice| notices.push(notice.clone()),
        )
        .await;

        assert_eq!(result.expect("third attempt succeeds"), "remote-1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[1].attempt, 2);
        let slept: Vec<u64> = sleeper
            .slept
            .lock()
            .unwrap()
            .iter()
            .copied()
            .map(whole_secs)
            .collect();
        assert_eq!(slept, vec![1, 2]);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let sleeper = RecordingSleeper::default();

        let err = with_retry(
            &fixed(2),
            &sleeper,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ChannelError::timeout("30s")) }
            },
            |_| {},
        )
        .await
        .expect_err("exhausted");

        assert!(matches!(err, ChannelError::Timeout { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let sleeper = RecordingSleeper::default();

        let err = with_retry(
            &fixed(5),
            &sleeper,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ChannelError::rejected("price below floor")) }
            },
            |_| {},
        )
        .await
        .expect_err("permanent");

        assert!(matches!(err, ChannelError::Rejected { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn retry_after_hint_stretches_the_delay() {
        let calls = AtomicU32::new(0);
        let sleeper = RecordingSleeper::default();

        with_retry(
            &fixed(2),
            &sleeper,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ChannelError::RateLimited {
                            retry_after: Some(Duration::from_secs(5)),
                        })
                    } else {
                        Ok(())
                    }
                }
            },
            |_| {},
        )
        .await
        .expect("second attempt succeeds");

        assert_eq!(*sleeper.slept.lock().unwrap(), vec![Duration::from_secs(5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_advances_paused_clock() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
