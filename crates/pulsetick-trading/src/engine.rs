//! Fixed-interval polling engine.
//!
//! Each tick fans symbol fetches out over a bounded worker pool, computes
//! indicators and scores per symbol (pure, fully parallel), publishes a
//! rankings snapshot, and drives the position lifecycle. Every fetch is
//! bounded by the remaining tick budget: a fetch that cannot finish in time
//! keeps running in the background (its result lands in cache for the next
//! tick) while the current tick proceeds with stale data marked degraded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, info};

use pulsetick_core::cache::{CacheMode, FailurePolicy, SingleFlightCache};
use pulsetick_core::{
    CandleSeries, CandlesRequest, ChainOutcome, Quote, QuoteRequest, SourceChain, Symbol,
    UtcDateTime,
};
use pulsetick_signals::{
    rank, IndicatorEngine, IndicatorVector, ScoreRecord, ScoringEngine,
};

use crate::config::{ConfigError, TradingConfig};
use crate::execution::ExecutionClient;
use crate::lifecycle::{CycleContext, LifecycleEvent, PositionLifecycle};

type CandleCache = SingleFlightCache<ChainOutcome<CandleSeries>>;
type QuoteCache = SingleFlightCache<ChainOutcome<Quote>>;

/// The most recent completed cycle's ranked output.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingsSnapshot {
    pub cycle: u64,
    pub computed_at: UtcDateTime,
    pub records: Vec<ScoreRecord>,
}

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub scored: usize,
    /// Symbols served from the synthetic fallback or stale cache.
    pub degraded: usize,
    pub events: Vec<LifecycleEvent>,
}

/// Orchestrates fetch -> indicators -> scoring -> lifecycle on a fixed tick.
pub struct TradingEngine {
    config: TradingConfig,
    chain: Arc<SourceChain>,
    candle_cache: Arc<CandleCache>,
    quote_cache: Arc<QuoteCache>,
    indicators: Arc<IndicatorEngine>,
    scorer: ScoringEngine,
    lifecycle: tokio::sync::Mutex<PositionLifecycle>,
    rankings: RwLock<Option<RankingsSnapshot>>,
    cycle: AtomicU64,
}

impl TradingEngine {
    pub fn new(
        config: TradingConfig,
        chain: SourceChain,
        executor: Arc<dyn ExecutionClient>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let scorer = ScoringEngine::new(config.weights);
        let lifecycle = PositionLifecycle::new(config.clone(), executor);

        Ok(Self {
            config,
            chain: Arc::new(chain),
            candle_cache: Arc::new(SingleFlightCache::new(FailurePolicy::ServeLastGood)),
            quote_cache: Arc::new(SingleFlightCache::new(FailurePolicy::ServeLastGood)),
            indicators: Arc::new(IndicatorEngine::default()),
            scorer,
            lifecycle: tokio::sync::Mutex::new(lifecycle),
            rankings: RwLock::new(None),
            cycle: AtomicU64::new(0),
        })
    }

    pub const fn config(&self) -> &TradingConfig {
        &self.config
    }

    /// Most recent completed cycle's records, best first, filtered and
    /// truncated. Non-blocking; never waits on an in-progress cycle.
    pub fn rankings(&self, min_score: f64, max_results: usize) -> Vec<ScoreRecord> {
        let snapshot = self.rankings.read().expect("rankings lock not poisoned");
        match snapshot.as_ref() {
            Some(snapshot) => snapshot
                .records
                .iter()
                .filter(|record| record.overall_score >= min_score)
                .take(max_results)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn snapshot(&self) -> Option<RankingsSnapshot> {
        self.rankings
            .read()
            .expect("rankings lock not poisoned")
            .clone()
    }

    /// Run ticks until the shutdown signal flips.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.run_cycle().await;
                    info!(
                        cycle = report.cycle,
                        scored = report.scored,
                        degraded = report.degraded,
                        events = report.events.len(),
                        "cycle complete"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested, stopping engine loop");
                        break;
                    }
                }
            }
        }
    }

    /// One full tick across the watch-list.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        let now = UtcDateTime::now();
        let deadline = Instant::now() + self.config.tick_budget();
        let workers = Arc::new(Semaphore::new(self.config.worker_count()));

        let mut handles = Vec::with_capacity(self.config.watchlist.len());
        for symbol in self.config.watchlist.clone() {
            let workers = Arc::clone(&workers);
            let chain = Arc::clone(&self.chain);
            let cache = Arc::clone(&self.candle_cache);
            let indicators = Arc::clone(&self.indicators);
            let scorer = self.scorer.clone();
            let interval = self.config.interval;
            let lookback = self.config.candle_lookback;
            let ttl = self.config.candle_ttl();

            handles.push(tokio::spawn(async move {
                let _permit = workers.acquire_owned().await.expect("semaphore open");
                let fetched =
                    fetch_candles_bounded(chain, cache, symbol.clone(), interval, lookback, ttl, deadline)
                        .await;

                let (vector, degraded) = match fetched {
                    Some((series, degraded)) => (indicators.compute(&series), degraded),
                    None => (IndicatorVector::unavailable(), true),
                };
                let record = scorer.score(symbol.clone(), &vector, degraded, now);
                (symbol, vector, record)
            }));
        }

        let mut vectors: HashMap<Symbol, IndicatorVector> = HashMap::new();
        let mut records = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok((symbol, vector, record)) = handle.await {
                vectors.insert(symbol, vector);
                records.push(record);
            }
        }

        let records = rank(records);
        let degraded = records.iter().filter(|r| r.degraded).count();

        {
            let mut snapshot = self.rankings.write().expect("rankings lock not poisoned");
            *snapshot = Some(RankingsSnapshot {
                cycle,
                computed_at: now,
                records: records.clone(),
            });
        }

        // Fresh quotes for symbols with capital at risk.
        let active = {
            let lifecycle = self.lifecycle.lock().await;
            lifecycle.active_symbols()
        };
        let mut quotes: HashMap<Symbol, Quote> = HashMap::new();
        for symbol in active {
            if let Some(quote) = self
                .fetch_quote_bounded(symbol.clone(), deadline)
                .await
            {
                quotes.insert(symbol, quote);
            }
        }

        let events = {
            let mut lifecycle = self.lifecycle.lock().await;
            let ctx = CycleContext {
                rankings: &records,
                quotes: &quotes,
                vectors: &vectors,
                now,
            };
            lifecycle.on_cycle(&ctx).await
        };

        self.candle_cache.purge_expired().await;
        self.quote_cache.purge_expired().await;

        CycleReport {
            cycle,
            scored: records.len(),
            degraded,
            events,
        }
    }

    /// Explicit operator reset of the session halt.
    pub async fn reset_session(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        lifecycle.reset_session();
    }

    pub async fn session_halted(&self) -> bool {
        let lifecycle = self.lifecycle.lock().await;
        lifecycle.risk().halted()
    }

    async fn fetch_quote_bounded(&self, symbol: Symbol, deadline: Instant) -> Option<Quote> {
        let chain = Arc::clone(&self.chain);
        let cache = Arc::clone(&self.quote_cache);
        let ttl = self.config.quote_ttl();
        let key = format!("quote:{symbol}");
        let req = QuoteRequest::new(symbol.clone());

        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            cache
                .get_or_fetch(&task_key, ttl, CacheMode::Use, || async {
                    chain.fetch_quote(&req).await
                })
                .await
        });

        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, handle).await {
            Ok(Ok(Ok(cached))) => Some(cached.value.data),
            Ok(_) => self
                .quote_cache
                .get_stale(&key)
                .await
                .map(|outcome| outcome.data),
            Err(_) => {
                // Leader continues in the background; serve the last quote.
                debug!(symbol = %symbol, "quote fetch missed the tick budget");
                self.quote_cache
                    .get_stale(&key)
                    .await
                    .map(|outcome| outcome.data)
            }
        }
    }
}

/// Candle fetch bounded by the tick deadline.
///
/// Returns the series plus a degraded flag covering both synthetic fallback
/// data and stale cache fallbacks. `None` means no data has ever been seen
/// for the key.
async fn fetch_candles_bounded(
    chain: Arc<SourceChain>,
    cache: Arc<CandleCache>,
    symbol: Symbol,
    interval: pulsetick_core::Interval,
    lookback: usize,
    ttl: std::time::Duration,
    deadline: Instant,
) -> Option<(CandleSeries, bool)> {
    let req = match CandlesRequest::new(symbol.clone(), interval, lookback) {
        Ok(req) => req,
        Err(_) => return None,
    };
    let key = req.cache_key();

    let task_cache = Arc::clone(&cache);
    let task_req = req.clone();
    let handle = tokio::spawn(async move {
        task_cache
            .get_or_fetch(&key, ttl, CacheMode::Use, || async {
                chain.fetch_candles(&task_req).await
            })
            .await
    });

    let remaining = deadline.saturating_duration_since(Instant::now());
    match tokio::time::timeout(remaining, handle).await {
        Ok(Ok(Ok(cached))) => Some((cached.value.data, cached.value.degraded)),
        Ok(_) => cache
            .get_stale(&req.cache_key())
            .await
            .map(|outcome| (outcome.data, true)),
        Err(_) => {
            // The in-flight fetch is not aborted: the leader task finishes in
            // the background and caches for the next tick.
            debug!(symbol = %symbol, "candle fetch missed the tick budget, serving stale data");
            cache
                .get_stale(&req.cache_key())
                .await
                .map(|outcome| (outcome.data, true))
        }
    }
}
