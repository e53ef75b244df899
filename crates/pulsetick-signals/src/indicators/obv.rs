//! On-balance volume: signed running total driven by close-to-close
//! direction.

use pulsetick_core::Candle;

use crate::IndicatorValue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObvOutput {
    /// Accumulated signed volume over the full series.
    pub obv: IndicatorValue,
    /// Change contributed by the latest bar.
    pub delta: IndicatorValue,
}

pub fn obv(candles: &[Candle]) -> ObvOutput {
    if candles.len() < 2 {
        return ObvOutput {
            obv: IndicatorValue::Unavailable,
            delta: IndicatorValue::Unavailable,
        };
    }

    let mut total = candles[0].volume as f64;
    let mut last_step = 0.0;

    for pair in candles.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        last_step = if curr.close > prev.close {
            curr.volume as f64
        } else if curr.close < prev.close {
            -(curr.volume as f64)
        } else {
            0.0
        };
        total += last_step;
    }

    ObvOutput {
        obv: IndicatorValue::from_computed(total),
        delta: IndicatorValue::from_computed(last_step),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsetick_core::UtcDateTime;

    fn candle(index: usize, close: f64, volume: u64) -> Candle {
        let ts = UtcDateTime::from_unix_timestamp(1_717_000_000 + index as i64 * 60)
            .expect("timestamp");
        Candle::new(ts, close, close + 1.0, close - 1.0, close, volume).expect("candle")
    }

    #[test]
    fn up_bars_add_and_down_bars_subtract() {
        let candles = vec![
            candle(0, 100.0, 1_000),
            candle(1, 101.0, 500),
            candle(2, 100.5, 200),
            candle(3, 100.5, 900),
        ];

        let out = obv(&candles);
        assert_eq!(out.obv, IndicatorValue::Value(1_300.0));
        // Unchanged close contributes nothing.
        assert_eq!(out.delta, IndicatorValue::Value(0.0));
    }

    #[test]
    fn single_bar_is_unavailable() {
        let candles = vec![candle(0, 100.0, 1_000)];
        assert_eq!(obv(&candles).obv, IndicatorValue::Unavailable);
    }
}
