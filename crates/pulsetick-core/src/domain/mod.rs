//! Canonical domain types for pulsetick market data.
//!
//! All models validate their invariants at construction time: symbols are
//! normalized uppercase tickers, timestamps are RFC3339 UTC, candles have
//! coherent OHLC bounds, and candle series have strictly increasing
//! timestamps with no duplicates.

mod interval;
mod models;
mod symbol;
mod timestamp;

pub use interval::Interval;
pub use models::{Candle, CandleSeries, Quote};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
