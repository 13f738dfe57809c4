//! Daily OHLCV bar representation.

use crate::domain::error::StratsimError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Check that a bar series is usable for simulation: non-empty and dated in
/// strictly increasing order (no duplicates).
pub fn validate_series(code: &str, bars: &[OhlcvBar]) -> Result<(), StratsimError> {
    if bars.is_empty() {
        return Err(StratsimError::NoData { code: code.into() });
    }
    for pair in bars.windows(2) {
        if pair[1].date <= pair[0].date {
            return Err(StratsimError::Data {
                reason: format!(
                    "{}: bars out of order at {} -> {}",
                    code, pair[0].date, pair[1].date
                ),
            });
        }
    }
    Ok(())
}
