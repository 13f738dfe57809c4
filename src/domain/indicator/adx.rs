//! ADX (Average Directional Index).
//!
//! Wilder's method: +DM/-DM and TR are Wilder-smoothed over n bars to give
//! +DI and -DI, DX = 100 * |+DI - -DI| / (+DI + -DI), and ADX is the
//! Wilder-smoothed DX (seeded with the SMA of the first n DX values).
//! Warmup: first (2n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_adx(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint {
            date: b.date,
            valid: false,
            value: IndicatorValue::Simple(f64::NAN),
        })
        .collect();

    if period == 0 || bars.len() < 2 * period {
        return IndicatorSeries {
            indicator_type: IndicatorType::Adx(period),
            values,
        };
    }

    // per-bar directional movement and true range, from bar 1
    let mut plus_dm = vec![0.0; bars.len()];
    let mut minus_dm = vec![0.0; bars.len()];
    let mut tr = vec![0.0; bars.len()];
    for i in 1..bars.len() {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
        tr[i] = bars[i].true_range(bars[i - 1].close);
    }

    // Wilder-smoothed sums, seeded with the plain sum of the first n values
    let mut sm_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut sm_minus: f64 = minus_dm[1..=period].iter().sum();
    let mut sm_tr: f64 = tr[1..=period].iter().sum();

    let mut dx = vec![f64::NAN; bars.len()];
    for i in period..bars.len() {
        if i > period {
            sm_plus = sm_plus - sm_plus / period as f64 + plus_dm[i];
            sm_minus = sm_minus - sm_minus / period as f64 + minus_dm[i];
            sm_tr = sm_tr - sm_tr / period as f64 + tr[i];
        }
        if sm_tr > 0.0 {
            let plus_di = 100.0 * sm_plus / sm_tr;
            let minus_di = 100.0 * sm_minus / sm_tr;
            let di_sum = plus_di + minus_di;
            if di_sum > 0.0 {
                dx[i] = 100.0 * (plus_di - minus_di).abs() / di_sum;
            }
        }
    }

    // ADX: SMA seed over the first n DX values, then Wilder smoothing
    let mut adx = f64::NAN;
    for i in (2 * period - 1)..bars.len() {
        if adx.is_nan() {
            let window = &dx[period..=i];
            if window.iter().any(|v| v.is_nan()) {
                continue;
            }
            adx = window.iter().sum::<f64>() / period as f64;
        } else if !dx[i].is_nan() {
            adx = (adx * (period - 1) as f64 + dx[i]) / period as f64;
        }
        values[i] = IndicatorPoint {
            date: bars[i].date,
            valid: true,
            value: IndicatorValue::Simple(adx),
        };
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values,
    }
}
