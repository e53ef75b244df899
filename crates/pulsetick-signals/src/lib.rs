//! # Pulsetick Signals
//!
//! Pure technical-indicator computation and opportunity scoring.
//!
//! ## Overview
//!
//! - **Indicator battery**: momentum oscillator, trend convergence, VWAP,
//!   volatility bands, directional strength, volume flow, true-range
//!   volatility, and stochastic-of-oscillator over an ordered candle series
//! - **Availability semantics**: short history or zero denominators yield
//!   [`IndicatorValue::Unavailable`], never a partial estimate
//! - **Scoring**: deterministic weighted 0-100 score with recommendation
//!   tiers, direction, and stable tie-broken ranking
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`indicators`] | Pure indicator functions |
//! | [`scoring`] | Weighted scoring engine and ranking |
//! | [`value`] | `IndicatorValue` availability type |
//! | [`vector`] | Indicator vector and computation engine |

pub mod indicators;
pub mod scoring;
pub mod value;
pub mod vector;

pub use scoring::{
    rank, Direction, FactorScores, RecommendationTier, ScoreRecord, ScoringEngine, ScoringWeights,
};
pub use value::IndicatorValue;
pub use vector::{IndicatorEngine, IndicatorVector, IndicatorWindows};
