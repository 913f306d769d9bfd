//! CSV export of simulation records, with the summary as a JSON sidecar.

use crate::domain::backtest::SimulationRecord;
use crate::domain::error::QuantError;
use crate::domain::metrics::Report;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::{Path, PathBuf};

const HEADER: [&str; 6] = ["date", "position", "ret", "equity", "turnover", "cost"];

/// `records.csv` gets its summary in `records.summary.json`.
pub fn summary_path(output_path: &Path) -> PathBuf {
    output_path.with_extension("summary.json")
}

/// Writes one row per simulated bar, then the summary next to it.
pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        records: &[SimulationRecord],
        report: &Report,
        output_path: &Path,
    ) -> Result<(), QuantError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let to_io = |e: csv::Error| std::io::Error::other(e);
        let mut wtr = csv::Writer::from_path(output_path).map_err(to_io)?;
        wtr.write_record(HEADER).map_err(to_io)?;
        for r in records {
            wtr.write_record([
                r.date.format("%Y-%m-%d").to_string(),
                r.position.to_string(),
                r.ret.to_string(),
                r.equity.to_string(),
                r.turnover.to_string(),
                r.cost.to_string(),
            ])
            .map_err(to_io)?;
        }
        wtr.flush()?;

        // Non-finite metrics serialise as null.
        let summary = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
        fs::write(summary_path(output_path), summary)?;
        Ok(())
    }
}
