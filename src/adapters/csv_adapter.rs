//! CSV file data adapter.
//!
//! Reads `<code>.csv` files from a base directory with the header
//! `date,open,high,low,close,volume`, dates as YYYY-MM-DD.

use crate::domain::error::StratsimError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }

    fn read_all(&self, code: &str) -> Result<Vec<OhlcvBar>, StratsimError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path).map_err(|e| StratsimError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| StratsimError::Data {
                reason: format!("{}: CSV parse error: {}", code, e),
            })?;

            let field = |i: usize, name: &str| -> Result<&str, StratsimError> {
                record.get(i).ok_or_else(|| StratsimError::Data {
                    reason: format!("{}: missing {} column", code, name),
                })
            };
            let number = |i: usize, name: &str| -> Result<f64, StratsimError> {
                field(i, name)?.trim().parse().map_err(|e| StratsimError::Data {
                    reason: format!("{}: invalid {} value: {}", code, name, e),
                })
            };

            let date = NaiveDate::parse_from_str(field(0, "date")?.trim(), "%Y-%m-%d").map_err(
                |e| StratsimError::Data {
                    reason: format!("{}: invalid date: {}", code, e),
                },
            )?;

            bars.push(OhlcvBar {
                code: code.to_string(),
                date,
                open: number(1, "open")?,
                high: number(2, "high")?,
                low: number(3, "low")?,
                close: number(4, "close")?,
                volume: field(5, "volume")?.trim().parse().map_err(|e| {
                    StratsimError::Data {
                        reason: format!("{}: invalid volume value: {}", code, e),
                    }
                })?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StratsimError> {
        let bars = self
            .read_all(code)?
            .into_iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .collect();
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, StratsimError> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    symbols.push(stem.to_string());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StratsimError> {
        let bars = self.read_all(code)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
