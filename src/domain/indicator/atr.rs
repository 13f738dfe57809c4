//! ATR (Average True Range).
//!
//! Wilder smoothing: seed with the simple mean of the first n true ranges,
//! then ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n. The first bar's true range
//! is high - low. Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint {
            date: b.date,
            valid: false,
            value: IndicatorValue::Simple(f64::NAN),
        })
        .collect();

    if period == 0 || bars.len() < period {
        return IndicatorSeries {
            indicator_type: IndicatorType::Atr(period),
            values,
        };
    }

    let mut tr_values: Vec<f64> = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };
        tr_values.push(tr);
    }

    let mut atr = 0.0;
    for i in (period - 1)..bars.len() {
        if i == period - 1 {
            atr = tr_values[..period].iter().sum::<f64>() / period as f64;
        } else {
            atr = (atr * (period - 1) as f64 + tr_values[i]) / period as f64;
        }
        values[i] = IndicatorPoint {
            date: bars[i].date,
            valid: true,
            value: IndicatorValue::Simple(atr),
        };
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(i: usize, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            code: "TEST".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64),
            open: close,
            high,
            low,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn atr_warmup() {
        let bars: Vec<OhlcvBar> = (0..5).map(|i| make_bar(i, 110.0, 90.0, 100.0)).collect();
        let series = calculate_atr(&bars, 3);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn atr_seed_is_average_tr() {
        let bars = vec![
            make_bar(0, 110.0, 100.0, 105.0),
            make_bar(1, 115.0, 105.0, 110.0),
            make_bar(2, 120.0, 110.0, 115.0),
        ];
        let series = calculate_atr(&bars, 3);

        // each TR is 10 → seed 10
        if let IndicatorValue::Simple(v) = series.values[2].value {
            assert!((v - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn atr_wilder_smoothing() {
        let bars = vec![
            make_bar(0, 110.0, 100.0, 105.0),
            make_bar(1, 115.0, 105.0, 110.0),
            make_bar(2, 120.0, 110.0, 115.0),
            make_bar(3, 125.0, 115.0, 120.0),
        ];
        let series = calculate_atr(&bars, 3);

        let seed = 10.0;
        let expected = (seed * 2.0 + 10.0) / 3.0;
        if let IndicatorValue::Simple(v) = series.values[3].value {
            assert!((v - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn atr_gap_uses_true_range() {
        let bars = vec![
            make_bar(0, 110.0, 100.0, 105.0),
            // gap up: TR = max(10, |130-105|, |120-105|) = 25
            make_bar(1, 130.0, 120.0, 125.0),
        ];
        let series = calculate_atr(&bars, 2);

        if let IndicatorValue::Simple(v) = series.values[1].value {
            assert!((v - (10.0 + 25.0) / 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn atr_insufficient_bars_all_invalid() {
        let bars: Vec<OhlcvBar> = (0..2).map(|i| make_bar(i, 110.0, 90.0, 100.0)).collect();
        let series = calculate_atr(&bars, 5);
        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
