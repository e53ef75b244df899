//! Pure indicator computations over an ordered candle sequence.
//!
//! Every rolling computation requires at least `window` observations;
//! shorter inputs yield [`IndicatorValue::Unavailable`], never a partial or
//! biased estimate. Zero denominators are trapped internally.

mod adx;
mod atr;
mod bollinger;
mod macd;
mod obv;
mod rsi;
mod stoch_rsi;
mod vwap;

pub use adx::{adx, AdxOutput};
pub use atr::{atr, atr_pct};
pub use bollinger::{bollinger, BollingerOutput};
pub use macd::{macd, MacdOutput};
pub use obv::{obv, ObvOutput};
pub use rsi::rsi;
pub use stoch_rsi::stoch_rsi;
pub use vwap::vwap;

pub(crate) use rsi::rsi_series;

use crate::IndicatorValue;

/// Simple moving average of the trailing `window` values.
pub fn sma(values: &[f64], window: usize) -> IndicatorValue {
    if window == 0 || values.len() < window {
        return IndicatorValue::Unavailable;
    }
    let tail = &values[values.len() - window..];
    IndicatorValue::from_computed(tail.iter().sum::<f64>() / window as f64)
}

/// EMA series seeded with the SMA of the first `window` values.
///
/// Entries before the seed index are `None`.
pub(crate) fn ema_series(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }

    let seed = values[..window].iter().sum::<f64>() / window as f64;
    out[window - 1] = Some(seed);

    let k = 2.0 / (window as f64 + 1.0);
    let mut ema = seed;
    for (index, value) in values.iter().enumerate().skip(window) {
        ema = value * k + ema * (1.0 - k);
        out[index] = Some(ema);
    }

    out
}

/// Sample standard deviation of the trailing `window` values.
pub(crate) fn rolling_std(values: &[f64], window: usize) -> Option<f64> {
    if window < 2 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    let mean = tail.iter().sum::<f64>() / window as f64;
    let variance =
        tail.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window as f64 - 1.0);
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_requires_full_window() {
        assert_eq!(sma(&[1.0, 2.0], 3), IndicatorValue::Unavailable);
        assert_eq!(sma(&[1.0, 2.0, 3.0], 3), IndicatorValue::Value(2.0));
    }

    #[test]
    fn ema_seed_is_the_initial_sma() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let series = ema_series(&values, 3);

        assert_eq!(series[0], None);
        assert_eq!(series[1], None);
        assert_eq!(series[2], Some(2.0));
        assert!(series[3].expect("warm") > 2.0);
    }

    #[test]
    fn rolling_std_matches_sample_formula() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let std = rolling_std(&values, 8).expect("std");
        assert!((std - 2.138).abs() < 0.01);
    }
}
