//! Stochastic oscillator.
//!
//! %K = 100 * (C - LL(k)) / (HH(k) - LL(k)), %D = SMA(%K, d).
//! %K is undefined when the window's high equals its low.
//! Warmup: %K needs k bars, %D needs k+d-1 bars.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_stochastic(bars: &[OhlcvBar], k_period: usize, d_period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };
    if k_period == 0 || d_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: bars
                .iter()
                .map(|b| IndicatorPoint {
                    date: b.date,
                    valid: false,
                    value: IndicatorValue::Stochastic {
                        k: f64::NAN,
                        d: f64::NAN,
                    },
                })
                .collect(),
        };
    }

    let mut k_values = vec![f64::NAN; bars.len()];
    for i in 0..bars.len() {
        if i + 1 < k_period {
            continue;
        }
        let window = &bars[i + 1 - k_period..=i];
        let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        if highest > lowest {
            k_values[i] = 100.0 * (bars[i].close - lowest) / (highest - lowest);
        }
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let k = k_values[i];
            let d = if i + 1 >= k_period + d_period - 1 {
                let window = &k_values[i + 1 - d_period..=i];
                if window.iter().any(|v| v.is_nan()) {
                    f64::NAN
                } else {
                    window.iter().sum::<f64>() / d_period as f64
                }
            } else {
                f64::NAN
            };

            IndicatorPoint {
                date: bar.date,
                valid: !k.is_nan(),
                value: IndicatorValue::Stochastic { k, d },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
