//! Historical price source port trait.

use crate::domain::error::QuantError;
use crate::domain::ohlcv::PriceTable;
use chrono::NaiveDate;

pub trait PriceSource {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Daily bars for `instrument` with `start <= date <= end`.
    ///
    /// An instrument that did not trade in the window yields an empty table,
    /// not an error.
    fn fetch_range(
        &self,
        instrument: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, QuantError>;
}
