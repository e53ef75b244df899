//! Behavior-driven tests for the data acquisition pipeline.
//!
//! These tests verify HOW the system behaves under concurrent access,
//! provider failure, and rate exhaustion: single-flight deduplication,
//! ordered fallback, and the degraded-data flag.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pulsetick_core::cache::{CacheMode, FailurePolicy, SingleFlightCache};
use pulsetick_core::data_source::{
    CandlesRequest, CapabilitySet, HealthStatus, MarketDataSource, QuoteRequest, SourceError,
};
use pulsetick_core::policy::{BackoffPolicy, ProviderPolicy};
use pulsetick_core::{
    AlphaVantageAdapter, BlockingMode, CandleSeries, ChainOutcome, Interval, ProviderId, Quote,
    RateLimitedFetcher, RetryConfig, SchwabAdapter, SourceChain, Symbol, UtcDateTime,
};
use pulsetick_signals::{IndicatorEngine, ScoringEngine};

// =============================================================================
// Cache layer: single-flight coalescing
// =============================================================================

#[tokio::test]
async fn when_sixteen_callers_race_on_one_key_exactly_one_upstream_fetch_happens() {
    // Given: A cache shared by many concurrent workers
    let cache: Arc<SingleFlightCache<String>> =
        Arc::new(SingleFlightCache::new(FailurePolicy::ServeLastGood));
    let upstream_calls = Arc::new(AtomicUsize::new(0));

    // When: Sixteen tasks request the same key inside its TTL
    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = Arc::clone(&cache);
        let upstream_calls = Arc::clone(&upstream_calls);
        handles.push(tokio::spawn(async move {
            cache
                .get_or_fetch("spy:1m:120", Duration::from_secs(60), CacheMode::Use, || {
                    let upstream_calls = Arc::clone(&upstream_calls);
                    async move {
                        upstream_calls.fetch_add(1, Ordering::SeqCst);
                        // Simulated upstream latency widens the race window.
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(String::from("candles"))
                    }
                })
                .await
        }));
    }

    // Then: Every caller gets the payload and the upstream saw one call
    for handle in handles {
        let fetched = handle.await.expect("task").expect("fetch");
        assert_eq!(fetched.value, "candles");
    }
    assert_eq!(upstream_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn when_a_refresh_fails_the_prior_valid_entry_survives() {
    // Given: A cache holding a healthy entry
    let cache: SingleFlightCache<String> = SingleFlightCache::new(FailurePolicy::ServeLastGood);
    cache
        .store("key", String::from("healthy"), Duration::from_secs(60))
        .await;

    // When: A forced refresh hits a dead upstream
    let result = cache
        .get_or_fetch("key", Duration::from_secs(60), CacheMode::Refresh, || async {
            Err(SourceError::unavailable("upstream outage"))
        })
        .await;

    // Then: The failure does not poison the cache
    assert_eq!(result.expect("served from last good").value, "healthy");
    assert_eq!(cache.get_fresh("key").await, Some(String::from("healthy")));
}

// =============================================================================
// Source chain: ordered fallback and the degraded flag
// =============================================================================

struct DeadSource(ProviderId);

impl MarketDataSource for DeadSource {
    fn id(&self) -> ProviderId {
        self.0
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn fetch_quote<'a>(
        &'a self,
        _req: QuoteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Quote, SourceError>> + Send + 'a>> {
        Box::pin(async move { Err(SourceError::unavailable("dead fixture")) })
    }

    fn fetch_candles<'a>(
        &'a self,
        _req: CandlesRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CandleSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move { Err(SourceError::unavailable("dead fixture")) })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { HealthStatus::healthy() })
    }
}

#[tokio::test]
async fn when_the_primary_dies_the_secondary_serves_live_data() {
    // Given: A dead primary ahead of a working secondary
    let chain = SourceChain::new(vec![
        Arc::new(DeadSource(ProviderId::Schwab)),
        Arc::new(AlphaVantageAdapter::default()),
    ]);

    // When: Candles are requested
    let req = CandlesRequest::new(Symbol::parse("NVDA").expect("valid"), Interval::OneMinute, 60)
        .expect("valid request");
    let outcome = chain.fetch_candles(&req).await.expect("fallback succeeds");

    // Then: The secondary answered and the data is NOT degraded
    assert_eq!(outcome.selected_source, ProviderId::Alphavantage);
    assert!(!outcome.degraded);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].provider, ProviderId::Schwab);
}

#[tokio::test]
async fn when_every_live_source_dies_synthetic_data_arrives_flagged() {
    // Given: A chain where every real provider is down
    let chain = SourceChain::new(vec![
        Arc::new(DeadSource(ProviderId::Schwab)),
        Arc::new(DeadSource(ProviderId::Alphavantage)),
    ]);

    // When: Candles are requested
    let req = CandlesRequest::new(Symbol::parse("NVDA").expect("valid"), Interval::OneMinute, 60)
        .expect("valid request");
    let outcome = chain.fetch_candles(&req).await.expect("synthetic fallback");

    // Then: Data is served, explicitly marked degraded
    assert!(outcome.degraded);
    assert_eq!(outcome.selected_source, ProviderId::Synthetic);
    assert_eq!(outcome.data.len(), 60);
}

#[tokio::test]
async fn when_chain_data_is_degraded_the_score_record_carries_the_flag() {
    // Given: Synthetic-only data for a symbol
    let chain = SourceChain::new(Vec::new());
    let req = CandlesRequest::new(Symbol::parse("TSLA").expect("valid"), Interval::OneMinute, 120)
        .expect("valid request");
    let outcome: ChainOutcome<CandleSeries> =
        chain.fetch_candles(&req).await.expect("synthetic fallback");

    // When: The pipeline scores it
    let vector = IndicatorEngine::default().compute(&outcome.data);
    let record = ScoringEngine::default().score(
        outcome.data.symbol.clone(),
        &vector,
        outcome.degraded,
        UtcDateTime::parse("2024-06-03T15:00:00Z").expect("timestamp"),
    );

    // Then: The degraded flag survives all the way into the ranking record
    assert!(record.degraded);
}

// =============================================================================
// Rate limiting: exhausted budget falls through the chain
// =============================================================================

#[tokio::test]
async fn when_the_primary_budget_is_spent_the_chain_moves_on() {
    // Given: A primary allowed one request per minute
    let policy = ProviderPolicy {
        provider_id: ProviderId::Schwab,
        quota_window: Duration::from_secs(60),
        quota_limit: 1,
        pacing_delay: Duration::ZERO,
        retry_backoff: BackoffPolicy {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_retries: 2,
        },
    };
    let limited = RateLimitedFetcher::new(
        Arc::new(SchwabAdapter::default()),
        &policy,
        RetryConfig::no_retry(),
        BlockingMode::Fail,
    );
    let chain = SourceChain::new(vec![
        Arc::new(limited),
        Arc::new(AlphaVantageAdapter::default()),
    ]);

    let symbol = Symbol::parse("SPY").expect("valid");

    // When: Two quotes are requested back to back
    let first = chain
        .fetch_quote(&QuoteRequest::new(symbol.clone()))
        .await
        .expect("first fetch");
    let second = chain
        .fetch_quote(&QuoteRequest::new(symbol))
        .await
        .expect("second fetch");

    // Then: The first came from the primary, the second fell through
    assert_eq!(first.selected_source, ProviderId::Schwab);
    assert_eq!(second.selected_source, ProviderId::Alphavantage);
    assert!(!second.degraded);
}

// =============================================================================
// Mock adapters: domain invariants hold
// =============================================================================

#[tokio::test]
async fn when_mock_adapters_serve_candles_ohlc_invariants_hold() {
    let adapter = SchwabAdapter::default();
    let req = CandlesRequest::new(Symbol::parse("QQQ").expect("valid"), Interval::FiveMinutes, 50)
        .expect("valid request");

    let series = adapter.fetch_candles(req).await.expect("candles");
    assert_eq!(series.len(), 50);

    let candles = series.candles();
    for candle in candles {
        assert!(candle.high >= candle.low);
        assert!(candle.open >= candle.low && candle.open <= candle.high);
        assert!(candle.close >= candle.low && candle.close <= candle.high);
    }
    for pair in candles.windows(2) {
        assert!(pair[1].ts > pair[0].ts, "timestamps must strictly increase");
    }
}
