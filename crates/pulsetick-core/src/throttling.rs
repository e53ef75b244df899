//! Token-bucket throttling for upstream market data calls.

use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::policy::BackoffPolicy;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// In-memory token bucket guarding one upstream source.
///
/// The quota window/limit pair is spread into a per-cell refill period so
/// effective throughput stays under the source's published limit even when
/// the burst capacity is consumed at once.
pub struct ThrottleQueue {
    limiter: DirectRateLimiter,
    retry_backoff: BackoffPolicy,
    /// Set when an acquire fails; cleared by the next success. Lets health
    /// snapshots report budget state without consuming a token.
    exhausted_until: Mutex<Option<Instant>>,
}

impl ThrottleQueue {
    pub fn new(quota_window: Duration, quota_limit: u32, retry_backoff: BackoffPolicy) -> Self {
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: RateLimiter::direct(quota),
            retry_backoff,
            exhausted_until: Mutex::new(None),
        }
    }

    /// Tries to take one token. When the bucket is empty the recommended
    /// backoff delay for a first retry is returned instead.
    pub fn acquire(&self) -> Result<(), Duration> {
        let mut exhausted = self
            .exhausted_until
            .lock()
            .expect("throttle state lock is not poisoned");

        if self.limiter.check().is_ok() {
            *exhausted = None;
            return Ok(());
        }

        let delay = self.retry_delay(0).unwrap_or(self.retry_backoff.max_delay);
        *exhausted = Some(Instant::now() + delay);
        Err(delay)
    }

    /// Whether rate budget is believed available, without consuming any.
    ///
    /// Reports the outcome of the most recent acquire: pessimistic for the
    /// backoff window after a failure, optimistic otherwise.
    pub fn budget_available(&self) -> bool {
        let exhausted = self
            .exhausted_until
            .lock()
            .expect("throttle state lock is not poisoned");
        match *exhausted {
            Some(until) => Instant::now() >= until,
            None => true,
        }
    }

    /// Delay before retry attempt `retry_count`, `None` once the budget is spent.
    pub fn retry_delay(&self, retry_count: u32) -> Option<Duration> {
        if retry_count > self.retry_backoff.max_retries {
            return None;
        }

        let scale = self.retry_backoff.multiplier.powf(f64::from(retry_count));
        let seconds = self.retry_backoff.initial_delay.as_secs_f64() * scale;
        let capped_seconds = seconds.min(self.retry_backoff.max_delay.as_secs_f64());
        Some(Duration::from_secs_f64(capped_seconds))
    }

    pub fn max_retries(&self) -> u32 {
        self.retry_backoff.max_retries
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit must be non-zero");

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_retries: 3,
        }
    }

    #[test]
    fn rejects_once_burst_is_spent() {
        let queue = ThrottleQueue::new(Duration::from_secs(60), 2, backoff());

        assert!(queue.acquire().is_ok());
        assert!(queue.acquire().is_ok());

        let retry_delay = queue.acquire().expect_err("third request must be throttled");
        assert_eq!(retry_delay, Duration::from_secs(1));
        assert!(!queue.budget_available());
    }

    #[test]
    fn budget_probe_does_not_consume_tokens() {
        let queue = ThrottleQueue::new(Duration::from_secs(60), 1, backoff());

        for _ in 0..10 {
            assert!(queue.budget_available());
        }

        // The single burst token is still there after the probes.
        assert!(queue.acquire().is_ok());
    }

    #[test]
    fn retry_backoff_is_exponential_and_capped() {
        let queue = ThrottleQueue::new(Duration::from_secs(60), 1, backoff());

        assert_eq!(queue.retry_delay(0), Some(Duration::from_secs(1)));
        assert_eq!(queue.retry_delay(1), Some(Duration::from_secs(2)));
        assert_eq!(queue.retry_delay(2), Some(Duration::from_secs(4)));
        assert_eq!(queue.retry_delay(3), Some(Duration::from_secs(8)));
        assert_eq!(queue.retry_delay(4), None);
    }
}
