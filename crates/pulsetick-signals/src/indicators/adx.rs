//! Average Directional Index: trend strength irrespective of direction.
//!
//! Rolling-mean formulation:
//! 1. True range and directional movement (+DM/-DM) per bar
//! 2. `window` rolling means of TR, +DM, -DM
//! 3. +DI / -DI = 100 * smoothed DM / smoothed TR
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 5. ADX = `window` rolling mean of DX
//!
//! Full warmup therefore needs `2 * window` candles.

use pulsetick_core::Candle;

use crate::IndicatorValue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxOutput {
    pub adx: IndicatorValue,
    pub di_plus: IndicatorValue,
    pub di_minus: IndicatorValue,
}

impl AdxOutput {
    const fn unavailable() -> Self {
        Self {
            adx: IndicatorValue::Unavailable,
            di_plus: IndicatorValue::Unavailable,
            di_minus: IndicatorValue::Unavailable,
        }
    }
}

pub fn adx(candles: &[Candle], window: usize) -> AdxOutput {
    if window == 0 || candles.len() < 2 * window {
        return AdxOutput::unavailable();
    }

    let n = candles.len() - 1;
    let mut tr = Vec::with_capacity(n);
    let mut dm_plus = Vec::with_capacity(n);
    let mut dm_minus = Vec::with_capacity(n);

    for pair in candles.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);

        let range = (curr.high - curr.low)
            .max((curr.high - prev.close).abs())
            .max((curr.low - prev.close).abs());
        tr.push(range);

        let up_move = curr.high - prev.high;
        let down_move = prev.low - curr.low;
        dm_plus.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        dm_minus.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
    }

    // Rolling means over the movement arrays; index i covers bars i-window+1..=i.
    let mut dx = Vec::new();
    let mut last_di = None;
    for end in window..=n {
        let window_tr: f64 = tr[end - window..end].iter().sum::<f64>() / window as f64;
        if window_tr <= 0.0 {
            continue;
        }
        let window_plus: f64 = dm_plus[end - window..end].iter().sum::<f64>() / window as f64;
        let window_minus: f64 = dm_minus[end - window..end].iter().sum::<f64>() / window as f64;

        let di_plus = 100.0 * window_plus / window_tr;
        let di_minus = 100.0 * window_minus / window_tr;
        last_di = Some((di_plus, di_minus));

        let di_sum = di_plus + di_minus;
        if di_sum > 0.0 {
            dx.push(100.0 * (di_plus - di_minus).abs() / di_sum);
        }
    }

    let Some((di_plus, di_minus)) = last_di else {
        return AdxOutput::unavailable();
    };

    if dx.len() < window {
        return AdxOutput {
            adx: IndicatorValue::Unavailable,
            di_plus: IndicatorValue::from_computed(di_plus),
            di_minus: IndicatorValue::from_computed(di_minus),
        };
    }

    let adx = dx[dx.len() - window..].iter().sum::<f64>() / window as f64;

    AdxOutput {
        adx: IndicatorValue::from_computed(adx),
        di_plus: IndicatorValue::from_computed(di_plus),
        di_minus: IndicatorValue::from_computed(di_minus),
    }
}
