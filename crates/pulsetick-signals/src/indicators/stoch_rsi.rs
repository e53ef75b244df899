//! Stochastic RSI: the RSI's position within its own rolling range,
//! used for finer entry timing than the raw oscillator.

use crate::indicators::rsi_series;
use crate::IndicatorValue;

/// `(rsi - min) / (max - min) * 100` over the trailing `stoch_window` RSI
/// readings. A flat RSI range yields `Unavailable`.
pub fn stoch_rsi(closes: &[f64], rsi_window: usize, stoch_window: usize) -> IndicatorValue {
    if stoch_window == 0 {
        return IndicatorValue::Unavailable;
    }

    let readings: Vec<f64> = rsi_series(closes, rsi_window)
        .into_iter()
        .flatten()
        .collect();
    if readings.len() < stoch_window {
        return IndicatorValue::Unavailable;
    }

    let tail = &readings[readings.len() - stoch_window..];
    let min = tail.iter().copied().fold(f64::INFINITY, f64::min);
    let max = tail.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if span <= 0.0 {
        return IndicatorValue::Unavailable;
    }

    let last = tail[tail.len() - 1];
    IndicatorValue::from_computed((last - min) / span * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_rsi_warmup_plus_stoch_window() {
        // 14-period RSI over 27 closes yields 13 readings, one short of 14.
        let closes: Vec<f64> = (0..27)
            .map(|i| 100.0 + ((i % 5) as f64 - 2.0))
            .collect();
        assert_eq!(stoch_rsi(&closes, 14, 14), IndicatorValue::Unavailable);
    }

    #[test]
    fn reads_high_when_rsi_is_at_its_range_top() {
        let mut closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + ((i % 7) as f64 - 3.0))
            .collect();
        // Strong push at the end drives RSI to its local maximum.
        for step in 1..=5 {
            closes.push(104.0 + step as f64 * 2.0);
        }

        let value = stoch_rsi(&closes, 14, 14).value().expect("available");
        assert!(value > 80.0, "expected top-of-range reading, got {value}");
    }

    #[test]
    fn flat_rsi_range_is_unavailable() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        // Monotonic gains pin RSI at 100, collapsing the range.
        assert_eq!(stoch_rsi(&closes, 14, 14), IndicatorValue::Unavailable);
    }
}
