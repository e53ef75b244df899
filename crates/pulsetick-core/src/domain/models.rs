use serde::{Deserialize, Serialize};

use crate::{Interval, Symbol, UtcDateTime, ValidationError};

/// Canonical top-of-book quote. Superseded per symbol by newer quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: Option<u64>,
    pub as_of: UtcDateTime,
}

impl Quote {
    pub fn new(
        symbol: Symbol,
        price: f64,
        bid: Option<f64>,
        ask: Option<f64>,
        volume: Option<u64>,
        as_of: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("price", price)?;
        validate_optional_non_negative("bid", bid)?;
        validate_optional_non_negative("ask", ask)?;

        Ok(Self {
            symbol,
            price,
            bid,
            ask,
            volume,
            as_of,
        })
    }
}

/// OHLCV candle for one time bucket. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    pub fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidCandleRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidCandleBounds);
        }

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Typical price used by volume-weighted computations.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Ordered candle sequence for one symbol/interval.
///
/// Construction enforces strictly increasing timestamps; duplicates are
/// rejected rather than deduplicated so upstream ordering bugs surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    pub symbol: Symbol,
    pub interval: Interval,
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(
        symbol: Symbol,
        interval: Interval,
        candles: Vec<Candle>,
    ) -> Result<Self, ValidationError> {
        for (index, pair) in candles.windows(2).enumerate() {
            if pair[1].ts <= pair[0].ts {
                return Err(ValidationError::NonMonotonicTimestamps { index: index + 1 });
            }
        }

        Ok(Self {
            symbol,
            interval,
            candles,
        })
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Fold a newer fetch into this series.
    ///
    /// Candles at or after the first incoming timestamp replace the existing
    /// tail (the still-forming bucket refreshes in place); older history is
    /// untouched.
    pub fn merge_tail(&mut self, incoming: CandleSeries) -> Result<(), ValidationError> {
        let Some(first_new) = incoming.candles.first() else {
            return Ok(());
        };

        let keep = self
            .candles
            .iter()
            .position(|candle| candle.ts >= first_new.ts)
            .unwrap_or(self.candles.len());
        self.candles.truncate(keep);
        self.candles.extend(incoming.candles);

        for (index, pair) in self.candles.windows(2).enumerate() {
            if pair[1].ts <= pair[0].ts {
                return Err(ValidationError::NonMonotonicTimestamps { index: index + 1 });
            }
        }

        Ok(())
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}
