//! CSV file price cache adapter.
//!
//! One file per instrument, `<base_path>/<code>.csv`, with header
//! `date,open,high,low,close,volume`. Saves go through a sibling temp file and
//! a rename so a crash mid-write leaves the previous table intact. There is no
//! cross-process lock; concurrent writers race and the last rename wins.

use crate::domain::error::QuantError;
use crate::domain::ohlcv::{Bar, PriceTable};
use crate::ports::cache_port::CachePort;
use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const HEADER: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

pub struct CsvCacheAdapter {
    base_path: PathBuf,
}

impl CsvCacheAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, instrument: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", instrument))
    }
}

impl CachePort for CsvCacheAdapter {
    fn load(&self, instrument: &str) -> Result<PriceTable, QuantError> {
        let path = self.csv_path(instrument);
        match fs::metadata(&path) {
            Ok(_) => read_price_csv(&path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PriceTable::new()),
            Err(e) => Err(QuantError::Cache {
                reason: format!("failed to stat {}: {}", path.display(), e),
            }),
        }
    }

    fn save(&self, instrument: &str, table: &PriceTable) -> Result<(), QuantError> {
        fs::create_dir_all(&self.base_path).map_err(|e| QuantError::Cache {
            reason: format!(
                "failed to create directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let path = self.csv_path(instrument);
        let tmp = path.with_extension("csv.tmp");
        write_price_csv(&tmp, table)?;
        fs::rename(&tmp, &path).map_err(|e| QuantError::Cache {
            reason: format!("failed to replace {}: {}", path.display(), e),
        })?;
        debug!(instrument, path = %path.display(), bars = table.len(), "cache saved");
        Ok(())
    }
}

/// Write `table` as CSV with the cache header.
pub fn write_price_csv(path: &Path, table: &PriceTable) -> Result<(), QuantError> {
    let cache_err = |e: csv::Error| QuantError::Cache {
        reason: format!("failed to write {}: {}", path.display(), e),
    };

    let mut wtr = csv::Writer::from_path(path).map_err(cache_err)?;
    wtr.write_record(HEADER).map_err(cache_err)?;
    for bar in table.bars() {
        wtr.write_record([
            bar.date.format("%Y-%m-%d").to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])
        .map_err(cache_err)?;
    }
    wtr.flush().map_err(|e| QuantError::Cache {
        reason: format!("failed to flush {}: {}", path.display(), e),
    })?;
    Ok(())
}

/// Read a `date,open,high,low,close[,volume]` CSV into a table.
///
/// Header names are matched case-insensitively and may appear in any order;
/// a missing `volume` column reads as zero volume.
pub fn read_price_csv(path: &Path) -> Result<PriceTable, QuantError> {
    let content = fs::read_to_string(path).map_err(|e| QuantError::Cache {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| QuantError::Cache {
            reason: format!("CSV header error in {}: {}", path.display(), e),
        })?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| {
        column(name).ok_or_else(|| QuantError::Cache {
            reason: format!("missing {} column in {}", name, path.display()),
        })
    };
    let date_col = required("date")?;
    let open_col = required("open")?;
    let high_col = required("high")?;
    let low_col = required("low")?;
    let close_col = required("close")?;
    let volume_col = column("volume");

    let mut bars = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| QuantError::Cache {
            reason: format!("CSV parse error: {}", e),
        })?;

        let date_str = record.get(date_col).unwrap_or_default().trim();
        // Accept full timestamps such as "2024-01-02 00:00:00".
        let date_part = date_str.split([' ', 'T']).next().unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
            QuantError::Cache {
                reason: format!("invalid date format '{}': {}", date_str, e),
            }
        })?;

        let field = |idx: usize, name: &str| -> Result<f64, QuantError> {
            record
                .get(idx)
                .unwrap_or_default()
                .trim()
                .parse()
                .map_err(|e| QuantError::Cache {
                    reason: format!("invalid {} value on {}: {}", name, date, e),
                })
        };

        let volume = match volume_col {
            Some(idx) if !record.get(idx).unwrap_or_default().trim().is_empty() => {
                field(idx, "volume")?
            }
            _ => 0.0,
        };

        bars.push(Bar {
            date,
            open: field(open_col, "open")?,
            high: field(high_col, "high")?,
            low: field(low_col, "low")?,
            close: field(close_col, "close")?,
            volume,
        });
    }

    Ok(PriceTable::from_bars(bars))
}
