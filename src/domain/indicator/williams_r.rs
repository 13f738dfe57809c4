//! Williams %R.
//!
//! %R = -100 * (HH(n) - C) / (HH(n) - LL(n)), range -100..0.
//! Undefined when the window's high equals its low.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_williams_r(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let mut r = f64::NAN;
        if period > 0 && i + 1 >= period {
            let window = &bars[i + 1 - period..=i];
            let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            if highest > lowest {
                r = -100.0 * (highest - bar.close) / (highest - lowest);
            }
        }

        values.push(IndicatorPoint {
            date: bar.date,
            valid: !r.is_nan(),
            value: IndicatorValue::Simple(r),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::WilliamsR(period),
        values,
    }
}
