//! Rate-limited fetch decorator around a raw market data source.
//!
//! Wraps any [`MarketDataSource`] with a token bucket, bounded retry with
//! exponential backoff, batch-mode pacing, and rolling request metrics that
//! feed health-based chain ordering.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::data_source::{
    CandlesRequest, CapabilitySet, HealthState, HealthStatus, MarketDataSource, QuoteRequest,
    SourceError, SourceErrorKind,
};
use crate::policy::ProviderPolicy;
use crate::retry::RetryConfig;
use crate::throttling::ThrottleQueue;
use crate::{CandleSeries, ProviderId, Quote};

/// Behavior when the token bucket is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingMode {
    /// Fail immediately with `RateLimited`.
    Fail,
    /// Block for tokens up to the given deadline, then fail with `RateLimited`.
    WaitUpTo(Duration),
}

/// Rolling request statistics for one wrapped source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceMetrics {
    pub requests: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    /// Exponentially weighted moving average of response latency.
    pub ewma_latency_ms: f64,
}

impl SourceMetrics {
    const fn zero() -> Self {
        Self {
            requests: 0,
            failures: 0,
            consecutive_failures: 0,
            ewma_latency_ms: 0.0,
        }
    }
}

const EWMA_ALPHA: f64 = 0.2;
const UNHEALTHY_AFTER: u32 = 5;
const DEGRADED_AFTER: u32 = 2;

#[derive(Debug)]
struct MetricsInner {
    metrics: SourceMetrics,
}

impl MetricsInner {
    fn record(&mut self, latency: Duration, failed: bool) {
        let m = &mut self.metrics;
        m.requests = m.requests.saturating_add(1);
        if failed {
            m.failures = m.failures.saturating_add(1);
            m.consecutive_failures = m.consecutive_failures.saturating_add(1);
        } else {
            m.consecutive_failures = 0;
        }

        let sample = latency.as_secs_f64() * 1_000.0;
        m.ewma_latency_ms = if m.requests == 1 {
            sample
        } else {
            EWMA_ALPHA * sample + (1.0 - EWMA_ALPHA) * m.ewma_latency_ms
        };
    }
}

/// Token-bucket + retry decorator implementing [`MarketDataSource`].
pub struct RateLimitedFetcher {
    inner: Arc<dyn MarketDataSource>,
    throttle: ThrottleQueue,
    retry: RetryConfig,
    blocking: BlockingMode,
    pacing_delay: Duration,
    last_request: tokio::sync::Mutex<Option<Instant>>,
    metrics: Mutex<MetricsInner>,
}

impl RateLimitedFetcher {
    pub fn new(
        inner: Arc<dyn MarketDataSource>,
        policy: &ProviderPolicy,
        retry: RetryConfig,
        blocking: BlockingMode,
    ) -> Self {
        Self {
            inner,
            throttle: ThrottleQueue::new(
                policy.quota_window,
                policy.quota_limit,
                policy.retry_backoff.clone(),
            ),
            retry,
            blocking,
            pacing_delay: policy.pacing_delay,
            last_request: tokio::sync::Mutex::new(None),
            metrics: Mutex::new(MetricsInner {
                metrics: SourceMetrics::zero(),
            }),
        }
    }

    /// Wrap a source with its built-in policy, or pass it through untouched
    /// when the provider has none (the synthetic generator).
    pub fn wrap(inner: Arc<dyn MarketDataSource>, blocking: BlockingMode) -> Arc<dyn MarketDataSource> {
        match ProviderPolicy::default_for(inner.id()) {
            Some(policy) => Arc::new(Self::new(inner, &policy, RetryConfig::default(), blocking)),
            None => inner,
        }
    }

    pub fn metrics(&self) -> SourceMetrics {
        self.metrics
            .lock()
            .expect("fetcher metrics lock is not poisoned")
            .metrics
    }

    /// Take a token, honoring the configured blocking mode.
    async fn acquire_token(&self) -> Result<(), SourceError> {
        let deadline = match self.blocking {
            BlockingMode::Fail => {
                return self.throttle.acquire().map_err(|_| {
                    SourceError::rate_limited(format!(
                        "rate budget exhausted for '{}'",
                        self.inner.id()
                    ))
                });
            }
            BlockingMode::WaitUpTo(timeout) => Instant::now() + timeout,
        };

        loop {
            match self.throttle.acquire() {
                Ok(()) => return Ok(()),
                Err(delay) => {
                    if Instant::now() + delay > deadline {
                        return Err(SourceError::rate_limited(format!(
                            "rate budget exhausted for '{}' within wait deadline",
                            self.inner.id()
                        )));
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Enforce the fixed inter-request gap used in batch mode.
    async fn pace(&self) {
        if self.pacing_delay.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.pacing_delay {
                tokio::time::sleep(self.pacing_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn call_with_retry<'a, T, F>(&'a self, mut invoke: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>,
    {
        self.acquire_token().await?;
        self.pace().await;

        let max_attempts = if self.retry.enabled {
            self.retry.max_retries + 1
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            let started = Instant::now();
            let outcome = invoke().await;
            let latency = started.elapsed();

            {
                let mut inner = self
                    .metrics
                    .lock()
                    .expect("fetcher metrics lock is not poisoned");
                inner.record(latency, outcome.is_err());
            }

            match outcome {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let transient = error.retryable()
                        && error.kind() != SourceErrorKind::RateLimited;
                    if !transient || attempt + 1 >= max_attempts {
                        if transient {
                            return Err(SourceError::unavailable(format!(
                                "'{}' failed after {} attempt(s): {}",
                                self.inner.id(),
                                attempt + 1,
                                error.message()
                            )));
                        }
                        return Err(error);
                    }

                    tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl MarketDataSource for RateLimitedFetcher {
    fn id(&self) -> ProviderId {
        self.inner.id()
    }

    fn capabilities(&self) -> CapabilitySet {
        self.inner.capabilities()
    }

    fn fetch_quote<'a>(
        &'a self,
        req: QuoteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Quote, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.call_with_retry(|| self.inner.fetch_quote(req.clone()))
                .await
        })
    }

    fn fetch_candles<'a>(
        &'a self,
        req: CandlesRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CandleSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.call_with_retry(|| self.inner.fetch_candles(req.clone()))
                .await
        })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move {
            let inner_health = self.inner.health().await;
            let metrics = self.metrics();

            let state = if inner_health.state == HealthState::Unhealthy
                || metrics.consecutive_failures >= UNHEALTHY_AFTER
            {
                HealthState::Unhealthy
            } else if inner_health.state == HealthState::Degraded
                || metrics.consecutive_failures >= DEGRADED_AFTER
            {
                HealthState::Degraded
            } else {
                HealthState::Healthy
            };

            HealthStatus::new(state, self.throttle.budget_available())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::policy::BackoffPolicy;
    use crate::{Symbol, UtcDateTime};

    struct FlakySource {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl FlakySource {
        fn new(fail_first: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
            }
        }
    }

    impl MarketDataSource for FlakySource {
        fn id(&self) -> ProviderId {
            ProviderId::Schwab
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::full()
        }

        fn fetch_quote<'a>(
            &'a self,
            req: QuoteRequest,
        ) -> Pin<Box<dyn Future<Output = Result<Quote, SourceError>> + Send + 'a>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.fail_first {
                    return Err(SourceError::timeout("simulated timeout"));
                }
                Quote::new(
                    req.symbol,
                    101.5,
                    Some(101.4),
                    Some(101.6),
                    Some(10_000),
                    UtcDateTime::parse("2024-06-03T14:30:00Z").expect("timestamp"),
                )
                .map_err(|e| SourceError::internal(e.to_string()))
            })
        }

        fn fetch_candles<'a>(
            &'a self,
            _req: CandlesRequest,
        ) -> Pin<Box<dyn Future<Output = Result<CandleSeries, SourceError>> + Send + 'a>> {
            Box::pin(async move { Err(SourceError::unavailable("no candles in this fixture")) })
        }

        fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
            Box::pin(async move { HealthStatus::healthy() })
        }
    }

    fn tight_policy(limit: u32) -> ProviderPolicy {
        ProviderPolicy {
            provider_id: ProviderId::Schwab,
            quota_window: Duration::from_secs(60),
            quota_limit: limit,
            pacing_delay: Duration::ZERO,
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(60),
                multiplier: 2.0,
                max_retries: 2,
            },
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let fetcher = RateLimitedFetcher::new(
            Arc::new(FlakySource::new(2)),
            &tight_policy(10),
            RetryConfig::fixed(Duration::from_millis(1), 3),
            BlockingMode::Fail,
        );

        let symbol = Symbol::parse("NVDA").expect("symbol");
        let quote = fetcher
            .fetch_quote(QuoteRequest::new(symbol))
            .await
            .expect("third attempt should succeed");

        assert_eq!(quote.price, 101.5);
        assert_eq!(fetcher.metrics().requests, 3);
        assert_eq!(fetcher.metrics().failures, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_map_to_unavailable() {
        let fetcher = RateLimitedFetcher::new(
            Arc::new(FlakySource::new(10)),
            &tight_policy(10),
            RetryConfig::fixed(Duration::from_millis(1), 1),
            BlockingMode::Fail,
        );

        let symbol = Symbol::parse("NVDA").expect("symbol");
        let err = fetcher
            .fetch_quote(QuoteRequest::new(symbol))
            .await
            .expect_err("must exhaust retries");

        assert_eq!(err.kind(), SourceErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn empty_bucket_fails_fast_in_non_blocking_mode() {
        let fetcher = RateLimitedFetcher::new(
            Arc::new(FlakySource::new(0)),
            &tight_policy(1),
            RetryConfig::no_retry(),
            BlockingMode::Fail,
        );

        let symbol = Symbol::parse("NVDA").expect("symbol");
        fetcher
            .fetch_quote(QuoteRequest::new(symbol.clone()))
            .await
            .expect("first call has budget");

        let err = fetcher
            .fetch_quote(QuoteRequest::new(symbol))
            .await
            .expect_err("second call must be rate limited");
        assert_eq!(err.kind(), SourceErrorKind::RateLimited);

        // The throttled call never reached the upstream source.
        assert_eq!(fetcher.metrics().requests, 1);
    }

    #[tokio::test]
    async fn consecutive_failures_degrade_health() {
        let fetcher = RateLimitedFetcher::new(
            Arc::new(FlakySource::new(10)),
            &tight_policy(10),
            RetryConfig::fixed(Duration::from_millis(1), 1),
            BlockingMode::Fail,
        );

        let symbol = Symbol::parse("NVDA").expect("symbol");
        let _ = fetcher.fetch_quote(QuoteRequest::new(symbol)).await;

        let health = fetcher.health().await;
        assert_eq!(health.state, HealthState::Degraded);
    }
}
