//! Bollinger band position and width.
//!
//! Bands are `SMA(window) +/- k * sample_std(window)`. Position (%B) is the
//! close's location within the band on a 0-100 scale; width is the band
//! span as a percentage of the middle band.

use crate::indicators::{rolling_std, sma};
use crate::IndicatorValue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    /// Close position within the band: 0 at the lower band, 100 at the
    /// upper. May exceed the range on band breaks.
    pub percent_b: IndicatorValue,
    /// Band width as a percentage of the middle band.
    pub width_pct: IndicatorValue,
}

impl BollingerOutput {
    const fn unavailable() -> Self {
        Self {
            percent_b: IndicatorValue::Unavailable,
            width_pct: IndicatorValue::Unavailable,
        }
    }
}

pub fn bollinger(closes: &[f64], window: usize, k: f64) -> BollingerOutput {
    let IndicatorValue::Value(middle) = sma(closes, window) else {
        return BollingerOutput::unavailable();
    };
    let Some(std) = rolling_std(closes, window) else {
        return BollingerOutput::unavailable();
    };
    let Some(close) = closes.last().copied() else {
        return BollingerOutput::unavailable();
    };

    let upper = middle + k * std;
    let lower = middle - k * std;
    let span = upper - lower;

    let percent_b = if span > 0.0 {
        IndicatorValue::from_computed((close - lower) / span * 100.0)
    } else {
        // Flat series has no band to position against.
        IndicatorValue::Unavailable
    };

    let width_pct = if middle > 0.0 {
        IndicatorValue::from_computed(span / middle * 100.0)
    } else {
        IndicatorValue::Unavailable
    };

    BollingerOutput {
        percent_b,
        width_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_series_is_unavailable() {
        let closes: Vec<f64> = (0..19).map(|i| 100.0 + i as f64).collect();
        assert_eq!(bollinger(&closes, 20, 2.0), BollingerOutput::unavailable());
    }

    #[test]
    fn flat_series_has_no_band_position() {
        let closes = vec![100.0; 25];
        let out = bollinger(&closes, 20, 2.0);

        assert_eq!(out.percent_b, IndicatorValue::Unavailable);
        assert_eq!(out.width_pct, IndicatorValue::Value(0.0));
    }

    #[test]
    fn close_at_upper_band_reads_high() {
        let mut closes: Vec<f64> = (0..25).map(|i| 100.0 + ((i % 5) as f64)).collect();
        closes.push(110.0);
        let out = bollinger(&closes, 20, 2.0);

        let percent_b = out.percent_b.value().expect("available");
        assert!(percent_b > 90.0, "breakout close should read near/above 100, got {percent_b}");
    }
}
