//! Per-code bar series and the unified timeline for multi-code runs.

use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

/// One code's bar series, indexed by date for timeline iteration.
#[derive(Debug, Clone)]
pub struct CodeData {
    pub code: String,
    pub bars: Vec<OhlcvBar>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl CodeData {
    pub fn new(code: String, bars: Vec<OhlcvBar>) -> Self {
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            code,
            bars,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn index_on(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    pub fn bar_on(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.index_on(date).map(|i| &self.bars[i])
    }
}

/// All distinct trading dates across the given codes, ascending. Codes with
/// holes in their history simply skip the dates they have no bar for.
pub fn build_unified_timeline(data: &[CodeData]) -> Vec<NaiveDate> {
    let dates: BTreeSet<NaiveDate> = data
        .iter()
        .flat_map(|cd| cd.bars.iter().map(|b| b.date))
        .collect();
    dates.into_iter().collect()
}
