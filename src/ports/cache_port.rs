//! Persistent price cache port trait.

use crate::domain::error::QuantError;
use crate::domain::ohlcv::PriceTable;

pub trait CachePort {
    /// Previously saved table, or an empty table when nothing is stored yet.
    fn load(&self, instrument: &str) -> Result<PriceTable, QuantError>;

    /// Replace the stored table for `instrument` with `table`.
    fn save(&self, instrument: &str, table: &PriceTable) -> Result<(), QuantError>;
}
