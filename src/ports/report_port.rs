//! Report generation port trait.

use crate::domain::backtest::SimulationRecord;
use crate::domain::error::QuantError;
use crate::domain::metrics::Report;
use std::path::Path;

/// Port for writing simulation output: the per-bar records and their summary.
pub trait ReportPort {
    fn write(
        &self,
        records: &[SimulationRecord],
        report: &Report,
        output_path: &Path,
    ) -> Result<(), QuantError>;
}
