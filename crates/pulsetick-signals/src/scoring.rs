//! Opportunity scoring: combines the indicator battery into a weighted
//! 0-100 score with a discrete recommendation tier.
//!
//! The weighted sum is deterministic. A factor whose inputs are unavailable
//! contributes exactly 0 without renormalizing the remaining weights; this
//! conservative bias keeps rankings bit-for-bit comparable across runs and
//! is deliberate policy, not an accident of implementation.

use serde::{Deserialize, Serialize};

use pulsetick_core::{Symbol, UtcDateTime};

use crate::{IndicatorValue, IndicatorVector};

/// Per-factor weights. Policy values, not physical constants; the defaults
/// are the documented product weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub signal_strength: f64,
    pub volatility: f64,
    pub volume: f64,
    pub momentum: f64,
    pub trend_strength: f64,
    pub price_action: f64,
    pub liquidity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            signal_strength: 0.25,
            volatility: 0.20,
            volume: 0.15,
            momentum: 0.15,
            trend_strength: 0.10,
            price_action: 0.10,
            liquidity: 0.05,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.signal_strength
            + self.volatility
            + self.volume
            + self.momentum
            + self.trend_strength
            + self.price_action
            + self.liquidity
    }
}

/// Net signal direction for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

/// Discrete recommendation bands over the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationTier {
    Exceptional,
    Favorable,
    Watch,
    Hold,
    Avoid,
}

impl RecommendationTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Exceptional
        } else if score >= 70.0 {
            Self::Favorable
        } else if score >= 60.0 {
            Self::Watch
        } else if score >= 50.0 {
            Self::Hold
        } else {
            Self::Avoid
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exceptional => "exceptional",
            Self::Favorable => "favorable",
            Self::Watch => "watch",
            Self::Hold => "hold",
            Self::Avoid => "avoid",
        }
    }
}

/// Normalized 0-100 value per factor; `Unavailable` when the underlying
/// indicators were.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorScores {
    pub signal_strength: IndicatorValue,
    pub volatility: IndicatorValue,
    pub volume: IndicatorValue,
    pub momentum: IndicatorValue,
    pub trend_strength: IndicatorValue,
    pub price_action: IndicatorValue,
    pub liquidity: IndicatorValue,
}

/// One symbol's scored snapshot for one cycle. Previous records are
/// replaced, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub symbol: Symbol,
    pub overall_score: f64,
    pub factors: FactorScores,
    pub tier: RecommendationTier,
    pub direction: Direction,
    /// Directional checks agreeing with `direction`, out of 7.
    pub aligned_signals: u8,
    /// True when the underlying candle data came from the synthetic
    /// fallback or a stale cache entry.
    pub degraded: bool,
    pub computed_at: UtcDateTime,
}

/// Outcome of the seven directional checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirectionTally {
    bullish: u8,
    bearish: u8,
    evaluated: u8,
}

/// Deterministic scorer over indicator vectors.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    weights: ScoringWeights,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub const fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score(
        &self,
        symbol: Symbol,
        vector: &IndicatorVector,
        degraded: bool,
        computed_at: UtcDateTime,
    ) -> ScoreRecord {
        let tally = directional_tally(vector);
        let (direction, aligned_signals) = if tally.bullish > tally.bearish {
            (Direction::Bullish, tally.bullish)
        } else if tally.bearish > tally.bullish {
            (Direction::Bearish, tally.bearish)
        } else {
            (Direction::Neutral, tally.bullish)
        };

        let factors = FactorScores {
            signal_strength: signal_strength(vector, direction, aligned_signals, tally.evaluated),
            volatility: normalize_volatility(vector.atr_pct),
            volume: normalize_volume(vector.volume_ratio),
            momentum: normalize_momentum(vector.rsi, direction),
            trend_strength: normalize_trend(vector.adx),
            price_action: normalize_price_action(vector.bollinger_percent_b, direction),
            liquidity: normalize_liquidity(vector.average_volume),
        };

        let w = &self.weights;
        let overall_score = (w.signal_strength * factors.signal_strength.or_zero()
            + w.volatility * factors.volatility.or_zero()
            + w.volume * factors.volume.or_zero()
            + w.momentum * factors.momentum.or_zero()
            + w.trend_strength * factors.trend_strength.or_zero()
            + w.price_action * factors.price_action.or_zero()
            + w.liquidity * factors.liquidity.or_zero())
        .clamp(0.0, 100.0);

        ScoreRecord {
            symbol,
            overall_score,
            factors,
            tier: RecommendationTier::from_score(overall_score),
            direction,
            aligned_signals,
            degraded,
            computed_at,
        }
    }
}

/// Stable descending ranking: overall score, then liquidity factor, then
/// lexical symbol order. Deterministic for reproducible output.
pub fn rank(mut records: Vec<ScoreRecord>) -> Vec<ScoreRecord> {
    records.sort_by(|left, right| {
        right
            .overall_score
            .total_cmp(&left.overall_score)
            .then_with(|| {
                right
                    .factors
                    .liquidity
                    .or_zero()
                    .total_cmp(&left.factors.liquidity.or_zero())
            })
            .then_with(|| left.symbol.cmp(&right.symbol))
    });
    records
}

fn directional_tally(v: &IndicatorVector) -> DirectionTally {
    let mut tally = DirectionTally {
        bullish: 0,
        bearish: 0,
        evaluated: 0,
    };

    let mut check = |bullish: Option<bool>| {
        if let Some(is_bullish) = bullish {
            tally.evaluated += 1;
            if is_bullish {
                tally.bullish += 1;
            } else {
                tally.bearish += 1;
            }
        }
    };

    // RSI zone: only extreme readings vote.
    check(v.rsi.value().and_then(|rsi| {
        if rsi < 35.0 {
            Some(true)
        } else if rsi > 65.0 {
            Some(false)
        } else {
            None
        }
    }));

    // MACD histogram sign.
    check(v.macd_histogram.value().and_then(|h| {
        if h > 0.0 {
            Some(true)
        } else if h < 0.0 {
            Some(false)
        } else {
            None
        }
    }));

    // Close relative to VWAP.
    check(match (v.last_close.value(), v.vwap.value()) {
        (Some(close), Some(vwap)) if close != vwap => Some(close > vwap),
        _ => None,
    });

    // Moving average alignment.
    check(match (v.sma_fast.value(), v.sma_slow.value()) {
        (Some(fast), Some(slow)) if fast != slow => Some(fast > slow),
        _ => None,
    });

    // Volume flow.
    check(v.obv_delta.value().and_then(|delta| {
        if delta > 0.0 {
            Some(true)
        } else if delta < 0.0 {
            Some(false)
        } else {
            None
        }
    }));

    // Short-term momentum.
    check(v.price_change_pct.value().and_then(|pct| {
        if pct > 0.2 {
            Some(true)
        } else if pct < -0.2 {
            Some(false)
        } else {
            None
        }
    }));

    // Stochastic RSI extremes (oversold favors entry, overbought exit).
    check(v.stoch_rsi.value().and_then(|stoch| {
        if stoch < 20.0 {
            Some(true)
        } else if stoch > 80.0 {
            Some(false)
        } else {
            None
        }
    }));

    tally
}

/// Graded signal-strength factor: 15 points per aligned check plus graded
/// oscillator, trend-convergence, volume, and momentum contributions,
/// capped at 100.
fn signal_strength(
    v: &IndicatorVector,
    direction: Direction,
    aligned: u8,
    evaluated: u8,
) -> IndicatorValue {
    if evaluated == 0 {
        return IndicatorValue::Unavailable;
    }

    let mut strength = f64::from(aligned) * 15.0;

    if let Some(rsi) = v.rsi.value() {
        let zone = match direction {
            Direction::Bearish => 100.0 - rsi,
            _ => rsi,
        };
        // Deep oversold (or overbought, for shorts) grades highest.
        if zone < 25.0 {
            strength += 20.0;
        } else if zone < 30.0 {
            strength += 15.0;
        } else if zone < 35.0 {
            strength += 10.0;
        }
    }

    if let (Some(line), Some(signal)) = (v.macd_line.value(), v.macd_signal.value()) {
        let crossed = match direction {
            Direction::Bearish => line < signal,
            _ => line > signal,
        };
        let extended = match direction {
            Direction::Bearish => line < 0.0,
            _ => line > 0.0,
        };
        if crossed && extended {
            strength += 20.0;
        } else if crossed {
            strength += 15.0;
        }
    }

    if let Some(ratio) = v.volume_ratio.value() {
        if ratio > 2.5 {
            strength += 20.0;
        } else if ratio > 2.0 {
            strength += 15.0;
        } else if ratio > 1.5 {
            strength += 10.0;
        }
    }

    if let Some(pct) = v.price_change_pct.value() {
        let magnitude = match direction {
            Direction::Bearish => -pct,
            _ => pct,
        };
        if magnitude > 1.0 {
            strength += 20.0;
        } else if magnitude > 0.5 {
            strength += 15.0;
        } else if magnitude > 0.2 {
            strength += 10.0;
        }
    }

    IndicatorValue::from_computed(strength.min(100.0))
}

/// ATR%: 0.5% reads 50, 2%+ reads 100, linear between and below.
fn normalize_volatility(atr_pct: IndicatorValue) -> IndicatorValue {
    atr_pct.map(|x| {
        if x >= 2.0 {
            100.0
        } else if x >= 0.5 {
            50.0 + (x - 0.5) / 1.5 * 50.0
        } else {
            (x / 0.5 * 50.0).max(0.0)
        }
    })
}

/// Volume ratio: 1.0x reads 50, 2.5x+ reads 100, linear between and below.
fn normalize_volume(ratio: IndicatorValue) -> IndicatorValue {
    ratio.map(|r| {
        if r >= 2.5 {
            100.0
        } else if r >= 1.0 {
            50.0 + (r - 1.0) / 1.5 * 50.0
        } else {
            (r * 50.0).max(0.0)
        }
    })
}

/// RSI displacement from neutral toward the prevailing direction.
fn normalize_momentum(rsi: IndicatorValue, direction: Direction) -> IndicatorValue {
    rsi.map(|rsi| {
        let displacement = match direction {
            Direction::Bullish => rsi - 50.0,
            Direction::Bearish => 50.0 - rsi,
            Direction::Neutral => (rsi - 50.0).abs(),
        };
        (displacement * 2.0).clamp(0.0, 100.0)
    })
}

/// ADX: 25 reads 50, 50+ reads 100, linear between and below.
fn normalize_trend(adx: IndicatorValue) -> IndicatorValue {
    adx.map(|adx| {
        if adx >= 50.0 {
            100.0
        } else if adx >= 25.0 {
            50.0 + (adx - 25.0) / 25.0 * 50.0
        } else {
            (adx / 25.0 * 50.0).max(0.0)
        }
    })
}

/// Band position in the direction of travel: bulls want a high %B, bears a
/// low one, neutral prefers mid-band calm.
fn normalize_price_action(percent_b: IndicatorValue, direction: Direction) -> IndicatorValue {
    percent_b.map(|b| {
        let score = match direction {
            Direction::Bullish => b,
            Direction::Bearish => 100.0 - b,
            Direction::Neutral => 100.0 - (b - 50.0).abs() * 2.0,
        };
        score.clamp(0.0, 100.0)
    })
}

/// Average volume banded by absolute share turnover.
fn normalize_liquidity(average_volume: IndicatorValue) -> IndicatorValue {
    average_volume.map(|avg| {
        if avg >= 5_000_000.0 {
            100.0
        } else if avg >= 1_000_000.0 {
            75.0 + (avg - 1_000_000.0) / 4_000_000.0 * 25.0
        } else if avg >= 500_000.0 {
            50.0 + (avg - 500_000.0) / 500_000.0 * 25.0
        } else if avg >= 100_000.0 {
            25.0 + (avg - 100_000.0) / 400_000.0 * 25.0
        } else {
            (avg / 100_000.0 * 25.0).max(0.0)
        }
    })
}
