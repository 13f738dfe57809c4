#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use stratsim::domain::backtest::BacktestConfig;
use stratsim::domain::error::StratsimError;
pub use stratsim::domain::ohlcv::OhlcvBar;
use stratsim::domain::rule_parser::compile;
use stratsim::domain::strategy::{SizingMode, Strategy};
use stratsim::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StratsimError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(StratsimError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(code)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, StratsimError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StratsimError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(StratsimError::Data {
                reason: reason.clone(),
            });
        }
        match self.data.get(code) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(code: &str, day_offset: i64, close: f64) -> OhlcvBar {
    OhlcvBar {
        code: code.to_string(),
        date: date(2024, 1, 1) + chrono::Duration::days(day_offset),
        open: close,
        high: close,
        low: close,
        close,
        volume: 10_000,
    }
}

pub fn bars_from_closes(code: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(code, i as i64, c))
        .collect()
}

pub fn make_strategy(entry: &str, exit: &str) -> Strategy {
    Strategy {
        name: "test".into(),
        description: String::new(),
        entry: compile(entry).unwrap(),
        exit: compile(exit).unwrap(),
        sizing_mode: SizingMode::PctCapital,
        sizing_param: 100.0,
        stop_loss_pct: 0.0,
        take_profit_pct: 0.0,
        trailing_stop_pct: 0.0,
        atr_period: 14,
        atr_multiplier: 2.0,
    }
}

pub fn zero_cost_config() -> BacktestConfig {
    BacktestConfig::default()
}
