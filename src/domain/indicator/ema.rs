//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_ema(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let dates: Vec<_> = bars.iter().map(|b| b.date).collect();
    let ema = ema_over(&closes, period);

    let values = dates
        .into_iter()
        .zip(ema)
        .map(|(date, v)| IndicatorPoint {
            date,
            valid: !v.is_nan(),
            value: IndicatorValue::Simple(v),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// EMA over a raw value slice, NaN for the warmup prefix. NaN inputs are
/// skipped when accumulating the seed, so this can be chained (MACD signal
/// line runs an EMA over a series that itself has a warmup prefix).
pub fn ema_over(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut seed_sum = 0.0;
    let mut seed_count = 0usize;
    let mut ema = f64::NAN;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if ema.is_nan() {
            seed_sum += v;
            seed_count += 1;
            if seed_count == period {
                ema = seed_sum / period as f64;
                out[i] = ema;
            }
        } else {
            ema = v * k + ema * (1.0 - k);
            out[i] = ema;
        }
    }

    out
}
