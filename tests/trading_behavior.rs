//! Behavior-driven tests for the scoring and trading half of the system.
//!
//! These tests verify HOW insufficient history, degraded data, and the
//! session guard shape the end-to-end pipeline from candles to lifecycle
//! decisions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use pulsetick_core::adapters::synthetic;
use pulsetick_core::{
    CandleSeries, Interval, Quote, SourceChain, SourceChainBuilder, Symbol, UtcDateTime,
};
use pulsetick_signals::{
    rank, Direction, FactorScores, IndicatorEngine, IndicatorValue, RecommendationTier,
    ScoreRecord, ScoringEngine,
};
use pulsetick_trading::{
    CloseRequest, CycleContext, ExecutionClient, ExecutionConfirmation, ExecutionError,
    LifecycleEvent, OrderSpec, PaperExecution, PositionLifecycle, TradingConfig, TradingEngine,
};

fn when() -> UtcDateTime {
    UtcDateTime::parse("2024-06-03T15:00:00Z").expect("timestamp")
}

fn series(symbol: &str, count: usize) -> CandleSeries {
    let sym = Symbol::parse(symbol).expect("valid");
    let candles =
        synthetic::generate_candles(&sym, Interval::OneMinute, count, when()).expect("candles");
    CandleSeries::new(sym, Interval::OneMinute, candles).expect("series")
}

// =============================================================================
// Insufficient history: Unavailable all the way down
// =============================================================================

#[test]
fn when_history_is_short_every_windowed_indicator_is_unavailable_and_scores_zero() {
    // Given: A symbol with only 10 candles against 14-50 bar windows
    let short = series("NVDA", 10);

    // When: The pipeline computes and scores the vector
    let vector = IndicatorEngine::default().compute(&short);
    let record = ScoringEngine::default().score(short.symbol.clone(), &vector, false, when());

    // Then: Windowed indicators are unavailable, not partial estimates
    assert_eq!(vector.rsi, IndicatorValue::Unavailable);
    assert_eq!(vector.adx, IndicatorValue::Unavailable);
    assert_eq!(vector.atr_pct, IndicatorValue::Unavailable);
    assert_eq!(vector.macd_histogram, IndicatorValue::Unavailable);

    // And: Their factors contribute exactly zero to the weighted sum
    assert_eq!(record.factors.volatility, IndicatorValue::Unavailable);
    assert_eq!(record.factors.trend_strength, IndicatorValue::Unavailable);
    assert_eq!(record.factors.momentum, IndicatorValue::Unavailable);
    assert_eq!(record.overall_score, 0.0);
    assert_eq!(record.tier, RecommendationTier::Avoid);
}

// =============================================================================
// Ranking: determinism and idempotence
// =============================================================================

#[test]
fn when_scoring_reruns_on_an_unchanged_snapshot_the_ranking_is_identical() {
    // Given: Indicator vectors for three symbols from deterministic data
    let engine = IndicatorEngine::default();
    let scorer = ScoringEngine::default();

    let score_all = || {
        let records: Vec<ScoreRecord> = ["NVDA", "TSLA", "SPY"]
            .iter()
            .map(|name| {
                let s = series(name, 120);
                let vector = engine.compute(&s);
                scorer.score(s.symbol.clone(), &vector, false, when())
            })
            .collect();
        rank(records)
    };

    // When: The same snapshot is scored twice
    let first = score_all();
    let second = score_all();

    // Then: Ordering and every score are bit-for-bit identical
    assert_eq!(first, second);
}

// =============================================================================
// Engine: degraded sources surface in the ranking query
// =============================================================================

#[tokio::test]
async fn when_the_engine_runs_on_a_dead_chain_the_ranking_query_reports_degraded_records() {
    // Given: An engine whose chain has no live sources at all
    let engine = TradingEngine::new(
        TradingConfig::default(),
        SourceChain::new(Vec::new()),
        Arc::new(PaperExecution),
    )
    .expect("valid config");

    // When: One cycle completes and a consumer asks for rankings
    engine.run_cycle().await;
    let rankings = engine.rankings(0.0, usize::MAX);

    // Then: Every record carries the degraded flag for the UI to show
    assert!(!rankings.is_empty());
    assert!(rankings.iter().all(|record| record.degraded));
}

#[tokio::test]
async fn when_no_cycle_has_completed_the_ranking_query_returns_empty_not_blocking() {
    let engine = TradingEngine::new(
        TradingConfig::default(),
        SourceChainBuilder::new().with_mock_mode().build(),
        Arc::new(PaperExecution),
    )
    .expect("valid config");

    // The query never waits on an in-progress cycle.
    assert!(engine.rankings(0.0, usize::MAX).is_empty());
    assert!(engine.snapshot().is_none());
}

// =============================================================================
// Lifecycle: the session guard survives tempting scores
// =============================================================================

struct FlakyCloseExecutor {
    fail_first: std::sync::atomic::AtomicU32,
}

#[async_trait]
impl ExecutionClient for FlakyCloseExecutor {
    async fn open_position(
        &self,
        spec: &OrderSpec,
    ) -> Result<ExecutionConfirmation, ExecutionError> {
        Ok(ExecutionConfirmation {
            order_id: Uuid::new_v4(),
            fill_price: spec.mark_price,
            filled_at: when(),
        })
    }

    async fn close_position(
        &self,
        request: &CloseRequest,
    ) -> Result<ExecutionConfirmation, ExecutionError> {
        use std::sync::atomic::Ordering;
        if self.fail_first.load(Ordering::SeqCst) > 0 {
            self.fail_first.fetch_sub(1, Ordering::SeqCst);
            return Err(ExecutionError::transport("close window glitch"));
        }
        Ok(ExecutionConfirmation {
            order_id: Uuid::new_v4(),
            fill_price: request.mark_price,
            filled_at: when(),
        })
    }
}

fn strong_record(symbol: &str, score: f64) -> ScoreRecord {
    let value = IndicatorValue::Value(70.0);
    ScoreRecord {
        symbol: Symbol::parse(symbol).expect("valid"),
        overall_score: score,
        factors: FactorScores {
            signal_strength: value,
            volatility: value,
            volume: value,
            momentum: value,
            trend_strength: value,
            price_action: value,
            liquidity: value,
        },
        tier: RecommendationTier::from_score(score),
        direction: Direction::Bullish,
        aligned_signals: 6,
        degraded: false,
        computed_at: when(),
    }
}

fn quote_at(symbol: &str, price: f64) -> (Symbol, Quote) {
    let sym = Symbol::parse(symbol).expect("valid");
    let quote = Quote::new(sym.clone(), price, None, None, Some(100_000), when()).expect("quote");
    (sym, quote)
}

#[tokio::test]
async fn when_a_transient_close_failure_resolves_the_slot_frees_cleanly() {
    // Given: An executor whose first close attempt fails
    let mut config = TradingConfig::default();
    config.close_retry_limit = 3;
    config.session_loss_floor = 10_000.0;
    let mut lifecycle = PositionLifecycle::new(
        config,
        Arc::new(FlakyCloseExecutor {
            fail_first: std::sync::atomic::AtomicU32::new(1),
        }),
    );

    let rankings = vec![strong_record("NVDA", 80.0)];
    let entry_quotes: HashMap<_, _> = [quote_at("NVDA", 100.0)].into();
    let vectors = HashMap::new();

    fn cycle<'a>(
        rankings: &'a [ScoreRecord],
        quotes: &'a HashMap<Symbol, Quote>,
        vectors: &'a HashMap<Symbol, pulsetick_signals::IndicatorVector>,
        minute: i64,
    ) -> CycleContext<'a> {
        CycleContext {
            rankings,
            quotes,
            vectors,
            now: UtcDateTime::from_unix_timestamp(when().unix_timestamp() + minute * 60)
                .expect("timestamp"),
        }
    }

    // When: The position enters, stops out, and the close glitches once
    lifecycle
        .on_cycle(&cycle(&rankings, &entry_quotes, &vectors, 0))
        .await;
    lifecycle
        .on_cycle(&cycle(&rankings, &entry_quotes, &vectors, 1))
        .await;

    let stop_quotes: HashMap<_, _> = [quote_at("NVDA", 96.0)].into();
    let first_try = lifecycle
        .on_cycle(&cycle(&rankings, &stop_quotes, &vectors, 2))
        .await;
    let second_try = lifecycle
        .on_cycle(&cycle(&rankings, &stop_quotes, &vectors, 3))
        .await;

    // Then: The retry succeeds, the loss is booked, the slot is idle again
    assert!(first_try
        .iter()
        .any(|e| matches!(e, LifecycleEvent::ExitTriggered { .. })));
    assert!(second_try
        .iter()
        .any(|e| matches!(e, LifecycleEvent::PositionClosed { .. })));
    assert_eq!(lifecycle.slots()[0].state.name(), "idle");
    assert!(lifecycle.risk().session_pnl() < 0.0);
}
