//! The fixed indicator battery computed per symbol per cycle.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use pulsetick_core::{CandleSeries, Symbol};

use crate::indicators::{
    adx, atr_pct, bollinger, macd, obv, rsi, sma, stoch_rsi, vwap,
};
use crate::IndicatorValue;

/// Rolling windows for the indicator battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorWindows {
    pub rsi: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub vwap: usize,
    pub bollinger: usize,
    pub adx: usize,
    pub atr: usize,
    pub stoch: usize,
    pub volume_average: usize,
    pub sma_fast: usize,
    pub sma_slow: usize,
}

impl Default for IndicatorWindows {
    fn default() -> Self {
        Self {
            rsi: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            vwap: 20,
            bollinger: 20,
            adx: 14,
            atr: 14,
            stoch: 14,
            volume_average: 20,
            sma_fast: 20,
            sma_slow: 50,
        }
    }
}

/// One cycle's indicator readings for a symbol.
///
/// Derived data: recomputed every cycle, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorVector {
    pub last_close: IndicatorValue,
    /// Latest close-to-close change, percent.
    pub price_change_pct: IndicatorValue,
    /// Latest volume relative to its rolling average.
    pub volume_ratio: IndicatorValue,
    pub average_volume: IndicatorValue,
    pub sma_fast: IndicatorValue,
    pub sma_slow: IndicatorValue,
    pub rsi: IndicatorValue,
    pub macd_line: IndicatorValue,
    pub macd_signal: IndicatorValue,
    pub macd_histogram: IndicatorValue,
    pub vwap: IndicatorValue,
    pub bollinger_percent_b: IndicatorValue,
    pub bollinger_width_pct: IndicatorValue,
    pub adx: IndicatorValue,
    pub obv: IndicatorValue,
    pub obv_delta: IndicatorValue,
    pub atr_pct: IndicatorValue,
    pub stoch_rsi: IndicatorValue,
}

impl IndicatorVector {
    /// A vector with every entry unavailable, used when no candle data could
    /// be obtained within the tick budget.
    pub fn unavailable() -> Self {
        Self {
            last_close: IndicatorValue::Unavailable,
            price_change_pct: IndicatorValue::Unavailable,
            volume_ratio: IndicatorValue::Unavailable,
            average_volume: IndicatorValue::Unavailable,
            sma_fast: IndicatorValue::Unavailable,
            sma_slow: IndicatorValue::Unavailable,
            rsi: IndicatorValue::Unavailable,
            macd_line: IndicatorValue::Unavailable,
            macd_signal: IndicatorValue::Unavailable,
            macd_histogram: IndicatorValue::Unavailable,
            vwap: IndicatorValue::Unavailable,
            bollinger_percent_b: IndicatorValue::Unavailable,
            bollinger_width_pct: IndicatorValue::Unavailable,
            adx: IndicatorValue::Unavailable,
            obv: IndicatorValue::Unavailable,
            obv_delta: IndicatorValue::Unavailable,
            atr_pct: IndicatorValue::Unavailable,
            stoch_rsi: IndicatorValue::Unavailable,
        }
    }
}

const RESULT_CACHE_CAP: usize = 64;

/// Pure indicator computation with a bounded per-series result cache.
///
/// The cache key is (symbol, last candle timestamp, series length): a series
/// whose tail has not advanced reuses the previous vector.
pub struct IndicatorEngine {
    windows: IndicatorWindows,
    cache: Mutex<HashMap<(Symbol, i64, usize), IndicatorVector>>,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(IndicatorWindows::default())
    }
}

impl IndicatorEngine {
    pub fn new(windows: IndicatorWindows) -> Self {
        Self {
            windows,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub const fn windows(&self) -> &IndicatorWindows {
        &self.windows
    }

    pub fn compute(&self, series: &CandleSeries) -> IndicatorVector {
        let key = match series.last() {
            Some(last) => (
                series.symbol.clone(),
                last.ts.unix_timestamp(),
                series.len(),
            ),
            None => return IndicatorVector::unavailable(),
        };

        {
            let cache = self.cache.lock().expect("indicator cache lock not poisoned");
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }

        let vector = self.compute_uncached(series);

        let mut cache = self.cache.lock().expect("indicator cache lock not poisoned");
        if cache.len() >= RESULT_CACHE_CAP {
            cache.clear();
        }
        cache.insert(key, vector.clone());

        vector
    }

    fn compute_uncached(&self, series: &CandleSeries) -> IndicatorVector {
        let candles = series.candles();
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let w = &self.windows;

        let last_close = IndicatorValue::from_option(closes.last().copied());

        let price_change_pct = match closes.len() {
            len if len >= 2 => {
                let prev = closes[len - 2];
                if prev > 0.0 {
                    IndicatorValue::from_computed((closes[len - 1] - prev) / prev * 100.0)
                } else {
                    IndicatorValue::Unavailable
                }
            }
            _ => IndicatorValue::Unavailable,
        };

        let volumes: Vec<f64> = candles.iter().map(|c| c.volume as f64).collect();
        let average_volume = sma(&volumes, w.volume_average);
        let volume_ratio = match (volumes.last(), average_volume.value()) {
            (Some(last), Some(avg)) if avg > 0.0 => {
                IndicatorValue::from_computed(last / avg)
            }
            _ => IndicatorValue::Unavailable,
        };

        let macd_out = macd(&closes, w.macd_fast, w.macd_slow, w.macd_signal);
        let boll_out = bollinger(&closes, w.bollinger, 2.0);
        let adx_out = adx(candles, w.adx);
        let obv_out = obv(candles);

        IndicatorVector {
            last_close,
            price_change_pct,
            volume_ratio,
            average_volume,
            sma_fast: sma(&closes, w.sma_fast),
            sma_slow: sma(&closes, w.sma_slow),
            rsi: rsi(&closes, w.rsi),
            macd_line: macd_out.line,
            macd_signal: macd_out.signal,
            macd_histogram: macd_out.histogram,
            vwap: vwap(candles, w.vwap),
            bollinger_percent_b: boll_out.percent_b,
            bollinger_width_pct: boll_out.width_pct,
            adx: adx_out.adx,
            obv: obv_out.obv,
            obv_delta: obv_out.delta,
            atr_pct: atr_pct(candles, w.atr),
            stoch_rsi: stoch_rsi(&closes, w.rsi, w.stoch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsetick_core::{Candle, Interval, UtcDateTime};

    fn series(symbol: &str, count: usize) -> CandleSeries {
        let candles: Vec<Candle> = (0..count)
            .map(|i| {
                let ts = UtcDateTime::from_unix_timestamp(1_717_000_000 + i as i64 * 60)
                    .expect("timestamp");
                let close = 100.0 + ((i % 9) as f64 - 4.0) * 0.8;
                Candle::new(ts, close, close + 0.6, close - 0.6, close, 10_000 + i as u64 * 100)
                    .expect("candle")
            })
            .collect();
        CandleSeries::new(Symbol::parse(symbol).expect("symbol"), Interval::OneMinute, candles)
            .expect("series")
    }

    #[test]
    fn short_history_yields_unavailable_entries() {
        let engine = IndicatorEngine::default();
        let vector = engine.compute(&series("SPY", 10));

        assert_eq!(vector.rsi, IndicatorValue::Unavailable);
        assert_eq!(vector.macd_histogram, IndicatorValue::Unavailable);
        assert_eq!(vector.adx, IndicatorValue::Unavailable);
        assert_eq!(vector.sma_slow, IndicatorValue::Unavailable);
        // The close itself is known even with a short series.
        assert!(vector.last_close.is_available());
    }

    #[test]
    fn full_history_populates_the_battery() {
        let engine = IndicatorEngine::default();
        let vector = engine.compute(&series("SPY", 120));

        assert!(vector.rsi.is_available());
        assert!(vector.macd_histogram.is_available());
        assert!(vector.vwap.is_available());
        assert!(vector.adx.is_available());
        assert!(vector.atr_pct.is_available());
        assert!(vector.volume_ratio.is_available());
        assert!(vector.sma_slow.is_available());
    }

    #[test]
    fn identical_series_hits_the_result_cache() {
        let engine = IndicatorEngine::default();
        let input = series("SPY", 120);

        let first = engine.compute(&input);
        let second = engine.compute(&input);

        assert_eq!(first, second);
    }
}
