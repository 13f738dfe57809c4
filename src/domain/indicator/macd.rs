//! MACD (Moving Average Convergence Divergence).
//!
//! line = EMA(fast) - EMA(slow); signal = EMA(line, signal_period) seeded
//! with the SMA of the line's first defined values; histogram = line - signal.
//! Warmup: line from bar (slow-1); signal and histogram from bar
//! (slow + signal_period - 2). Points where only the line is defined carry
//! NaN signal/histogram fields.

use crate::domain::indicator::ema::ema_over;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_macd(
    bars: &[OhlcvBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let fast_ema = ema_over(&closes, fast);
    let slow_ema = ema_over(&closes, slow);

    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema_over(&line, signal_period);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let l = line[i];
            let s = signal[i];
            IndicatorPoint {
                date: bar.date,
                valid: !l.is_nan(),
                value: IndicatorValue::Macd {
                    line: l,
                    signal: s,
                    histogram: l - s,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Macd {
            fast,
            slow,
            signal: signal_period,
        },
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                code: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn macd_line_warmup() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let series = calculate_macd(&bars, 2, 4, 2);

        // line defined from index slow-1 = 3
        assert!(!series.values[2].valid);
        assert!(series.values[3].valid);
    }

    #[test]
    fn macd_signal_warmup() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
        let series = calculate_macd(&bars, 2, 4, 2);

        // signal defined from index slow + signal - 2 = 4
        if let IndicatorValue::Macd { signal, .. } = series.values[3].value {
            assert!(signal.is_nan());
        }
        if let IndicatorValue::Macd { signal, .. } = series.values[4].value {
            assert!(!signal.is_nan());
        }
    }

    #[test]
    fn macd_line_is_ema_difference() {
        let prices = [10.0, 12.0, 11.0, 13.0, 15.0, 14.0];
        let bars = make_bars(&prices);
        let series = calculate_macd(&bars, 2, 3, 2);

        let fast = ema_over(&prices, 2);
        let slow = ema_over(&prices, 3);

        for i in 2..prices.len() {
            if let IndicatorValue::Macd { line, .. } = series.values[i].value {
                assert!((line - (fast[i] - slow[i])).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let bars = make_bars(&[10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0, 17.0]);
        let series = calculate_macd(&bars, 2, 3, 3);

        for point in &series.values {
            if let IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } = point.value
            {
                if !signal.is_nan() {
                    assert!((histogram - (line - signal)).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn macd_flat_series_is_zero() {
        let bars = make_bars(&[100.0; 40]);
        let series = calculate_macd(&bars, 12, 26, 9);

        let last = series.values.last().unwrap();
        if let IndicatorValue::Macd {
            line,
            signal,
            histogram,
        } = last.value
        {
            assert!((line - 0.0).abs() < 1e-9);
            assert!((signal - 0.0).abs() < 1e-9);
            assert!((histogram - 0.0).abs() < 1e-9);
        }
    }

    #[test]
    fn macd_series_length() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let series = calculate_macd(&bars, 12, 26, 9);
        assert_eq!(series.values.len(), 3);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
