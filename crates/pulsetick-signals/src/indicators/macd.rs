//! Moving Average Convergence Divergence.
//!
//! Line = EMA(fast) - EMA(slow); signal = EMA(signal_window) of the line;
//! histogram = line - signal. Warmup is `slow - 1 + signal_window - 1` bars.

use crate::indicators::ema_series;
use crate::IndicatorValue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    pub line: IndicatorValue,
    pub signal: IndicatorValue,
    pub histogram: IndicatorValue,
}

impl MacdOutput {
    const fn unavailable() -> Self {
        Self {
            line: IndicatorValue::Unavailable,
            signal: IndicatorValue::Unavailable,
            histogram: IndicatorValue::Unavailable,
        }
    }
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_window: usize) -> MacdOutput {
    if fast == 0 || slow == 0 || signal_window == 0 || fast >= slow {
        return MacdOutput::unavailable();
    }
    if closes.len() < slow + signal_window - 1 {
        return MacdOutput::unavailable();
    }

    let ema_fast = ema_series(closes, fast);
    let ema_slow = ema_series(closes, slow);

    // Line values exist from index slow-1 onwards.
    let line: Vec<f64> = (slow - 1..closes.len())
        .map(|i| {
            let fast_v = ema_fast[i].unwrap_or(0.0);
            let slow_v = ema_slow[i].unwrap_or(0.0);
            fast_v - slow_v
        })
        .collect();

    let signal = ema_series(&line, signal_window);

    let Some(last_line) = line.last().copied() else {
        return MacdOutput::unavailable();
    };
    let Some(last_signal) = signal.last().copied().flatten() else {
        return MacdOutput::unavailable();
    };

    MacdOutput {
        line: IndicatorValue::from_computed(last_line),
        signal: IndicatorValue::from_computed(last_signal),
        histogram: IndicatorValue::from_computed(last_line - last_signal),
    }
}
