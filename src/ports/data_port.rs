//! Data access port trait. Bars are fetched up front; the simulation core
//! itself never performs I/O.

use crate::domain::error::StratsimError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StratsimError>;

    fn list_symbols(&self) -> Result<Vec<String>, StratsimError>;

    fn get_data_range(&self, code: &str)
        -> Result<Option<(NaiveDate, NaiveDate, usize)>, StratsimError>;
}
