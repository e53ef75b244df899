//! Volume-weighted average price over the trailing session window.

use pulsetick_core::Candle;

use crate::IndicatorValue;

/// VWAP of the trailing `window` candles: sum(typical * volume) / sum(volume).
///
/// Zero total volume yields `Unavailable` rather than a division error.
pub fn vwap(candles: &[Candle], window: usize) -> IndicatorValue {
    if window == 0 || candles.len() < window {
        return IndicatorValue::Unavailable;
    }

    let tail = &candles[candles.len() - window..];
    let total_volume: u64 = tail.iter().map(|c| c.volume).sum();
    if total_volume == 0 {
        return IndicatorValue::Unavailable;
    }

    let weighted: f64 = tail
        .iter()
        .map(|c| c.typical_price() * c.volume as f64)
        .sum();

    IndicatorValue::from_computed(weighted / total_volume as f64)
}
