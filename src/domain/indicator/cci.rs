//! CCI (Commodity Channel Index).
//!
//! CCI(n) = (TP - SMA(TP, n)) / (0.015 * mean deviation), where TP is the
//! typical price. Undefined when the mean deviation is zero.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_cci(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let typical: Vec<f64> = bars.iter().map(|b| b.typical_price()).collect();
    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let mut cci = f64::NAN;
        if period > 0 && i + 1 >= period {
            let window = &typical[i + 1 - period..=i];
            let sma = window.iter().sum::<f64>() / period as f64;
            let mean_dev = window.iter().map(|tp| (tp - sma).abs()).sum::<f64>() / period as f64;
            if mean_dev > 0.0 {
                cci = (typical[i] - sma) / (0.015 * mean_dev);
            }
        }

        values.push(IndicatorPoint {
            date: bar.date,
            valid: !cci.is_nan(),
            value: IndicatorValue::Simple(cci),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Cci(period),
        values,
    }
}
