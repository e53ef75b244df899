//! Average True Range volatility.

use pulsetick_core::Candle;

use crate::IndicatorValue;

/// Rolling mean of the true range over `window` bars.
pub fn atr(candles: &[Candle], window: usize) -> IndicatorValue {
    if window == 0 || candles.len() < window + 1 {
        return IndicatorValue::Unavailable;
    }

    let ranges: Vec<f64> = candles
        .windows(2)
        .map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            (curr.high - curr.low)
                .max((curr.high - prev.close).abs())
                .max((curr.low - prev.close).abs())
        })
        .collect();

    let tail = &ranges[ranges.len() - window..];
    IndicatorValue::from_computed(tail.iter().sum::<f64>() / window as f64)
}

/// ATR expressed as a percentage of the latest close.
pub fn atr_pct(candles: &[Candle], window: usize) -> IndicatorValue {
    let IndicatorValue::Value(range) = atr(candles, window) else {
        return IndicatorValue::Unavailable;
    };
    let Some(close) = candles.last().map(|c| c.close) else {
        return IndicatorValue::Unavailable;
    };
    if close <= 0.0 {
        return IndicatorValue::Unavailable;
    }

    IndicatorValue::from_computed(range / close * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsetick_core::UtcDateTime;

    fn candle(index: usize, low: f64, high: f64) -> Candle {
        let ts = UtcDateTime::from_unix_timestamp(1_717_000_000 + index as i64 * 60)
            .expect("timestamp");
        let close = (low + high) / 2.0;
        Candle::new(ts, close, high, low, close, 1_000).expect("candle")
    }

    #[test]
    fn flat_bars_have_constant_range() {
        let candles: Vec<Candle> = (0..20).map(|i| candle(i, 99.0, 101.0)).collect();
        let value = atr(&candles, 14).value().expect("available");
        assert!((value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn percentage_normalizes_by_close() {
        let candles: Vec<Candle> = (0..20).map(|i| candle(i, 99.0, 101.0)).collect();
        let value = atr_pct(&candles, 14).value().expect("available");
        assert!((value - 2.0).abs() < 1e-6);
    }

    #[test]
    fn warmup_is_unavailable() {
        let candles: Vec<Candle> = (0..14).map(|i| candle(i, 99.0, 101.0)).collect();
        assert_eq!(atr(&candles, 14), IndicatorValue::Unavailable);
    }
}
