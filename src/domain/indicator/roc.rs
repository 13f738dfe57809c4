//! ROC (Rate of Change).
//!
//! ROC(n)[i] = 100 * (C[i] - C[i-n]) / C[i-n]. Undefined when C[i-n] == 0.
//! Warmup: first n bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_roc(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let mut roc = f64::NAN;
        if period > 0 && i >= period {
            let prev_close = bars[i - period].close;
            if prev_close != 0.0 {
                roc = 100.0 * (bar.close - prev_close) / prev_close;
            }
        }

        values.push(IndicatorPoint {
            date: bar.date,
            valid: !roc.is_nan(),
            value: IndicatorValue::Simple(roc),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Roc(period),
        values,
    }
}
