//! VWAP (Volume Weighted Average Price).
//!
//! Cumulative over the whole series: VWAP[i] = Σ(typical * volume) / Σvolume
//! for bars 0..=i. Undefined while the cumulative volume is zero.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_vwap(bars: &[OhlcvBar]) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut cum_pv = 0.0;
    let mut cum_volume = 0.0;

    for bar in bars {
        cum_pv += bar.typical_price() * bar.volume as f64;
        cum_volume += bar.volume as f64;

        let vwap = if cum_volume > 0.0 {
            cum_pv / cum_volume
        } else {
            f64::NAN
        };

        values.push(IndicatorPoint {
            date: bar.date,
            valid: !vwap.is_nan(),
            value: IndicatorValue::Simple(vwap),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Vwap,
        values,
    }
}
