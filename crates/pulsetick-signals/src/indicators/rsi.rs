//! Relative Strength Index with Wilder's smoothing.
//!
//! First average gain/loss is a simple mean over the first `window` price
//! changes; afterwards `avg = (prev_avg * (n-1) + current) / n`.
//! All losses yields 0, all gains yields 100.

use crate::IndicatorValue;

/// Per-index RSI readings; `None` until `window` changes have accumulated.
pub(crate) fn rsi_series(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if window == 0 || closes.len() < window + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i <= window {
            avg_gain += gain;
            avg_loss += loss;
            if i == window {
                avg_gain /= window as f64;
                avg_loss /= window as f64;
                out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
            }
        } else {
            avg_gain = (avg_gain * (window as f64 - 1.0) + gain) / window as f64;
            avg_loss = (avg_loss * (window as f64 - 1.0) + loss) / window as f64;
            out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
        }
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
}

/// Latest RSI reading over `window` periods.
pub fn rsi(closes: &[f64], window: usize) -> IndicatorValue {
    IndicatorValue::from_option(rsi_series(closes, window).last().copied().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_period_is_unavailable() {
        let closes: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&closes, 14), IndicatorValue::Unavailable);

        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert!(rsi(&closes, 14).is_available());
    }

    #[test]
    fn all_gains_saturate_at_hundred() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&closes, 14), IndicatorValue::Value(100.0));
    }

    #[test]
    fn all_losses_pin_to_zero() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let value = rsi(&closes, 14).value().expect("available");
        assert!(value.abs() < f64::EPSILON);
    }

    #[test]
    fn oscillates_within_bounds() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + ((i % 7) as f64 - 3.0) * 2.0)
            .collect();
        let series = rsi_series(&closes, 14);

        for reading in series.into_iter().flatten() {
            assert!((0.0..=100.0).contains(&reading), "RSI {reading} out of range");
        }
    }
}
