//! Cached range retrieval: fetch, fall back, merge, persist, slice.

use crate::domain::error::QuantError;
use crate::domain::ohlcv::PriceTable;
use crate::ports::cache_port::CachePort;
use crate::ports::price_source_port::PriceSource;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Trailing days a table may stop short of the requested end before it
/// counts as a gap (weekends and holidays).
pub const END_TOLERANCE_DAYS: i64 = 2;

/// What to do when every live source fails but a cache exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    #[default]
    FailHard,
    DegradeToCache,
}

impl FromStr for StalePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail-hard" | "fail_hard" => Ok(StalePolicy::FailHard),
            "degrade-to-cache" | "degrade_to_cache" => Ok(StalePolicy::DegradeToCache),
            other => Err(format!(
                "unknown stale policy '{other}' (expected fail-hard or degrade-to-cache)"
            )),
        }
    }
}

impl fmt::Display for StalePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StalePolicy::FailHard => write!(f, "fail-hard"),
            StalePolicy::DegradeToCache => write!(f, "degrade-to-cache"),
        }
    }
}

pub struct CachedRangeRetriever<'a> {
    primary: &'a dyn PriceSource,
    fallback: Option<&'a dyn PriceSource>,
    cache: &'a dyn CachePort,
    policy: StalePolicy,
}

impl<'a> CachedRangeRetriever<'a> {
    pub fn new(primary: &'a dyn PriceSource, cache: &'a dyn CachePort) -> Self {
        Self {
            primary,
            fallback: None,
            cache,
            policy: StalePolicy::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: &'a dyn PriceSource) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_policy(mut self, policy: StalePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bars for `instrument` within `[start, end]`.
    ///
    /// The full window is always fetched from the primary source. With
    /// `force_refresh` the stored cache is not used as the merge base, so the
    /// persisted file is rebuilt from this fetch alone.
    pub fn get(
        &self,
        instrument: &str,
        start: NaiveDate,
        end: NaiveDate,
        force_refresh: bool,
    ) -> Result<PriceTable, QuantError> {
        let base = if force_refresh {
            PriceTable::new()
        } else {
            self.cache.load(instrument)?
        };
        debug!(instrument, cached_bars = base.len(), force_refresh, "cache loaded");

        let fetched = match self.primary.fetch_range(instrument, start, end) {
            Ok(table) => table,
            Err(primary_err) => {
                warn!(
                    instrument,
                    source = self.primary.name(),
                    error = %primary_err,
                    "primary source failed"
                );
                match self.fetch_fallback(instrument, start, end) {
                    Some(table) => table,
                    None => {
                        return self.exhausted(instrument, start, end, base, force_refresh, primary_err);
                    }
                }
            }
        };

        let merged = base.merge(&fetched);
        self.cache.save(instrument, &merged)?;
        info!(
            instrument,
            fetched = fetched.len(),
            stored = merged.len(),
            "cache updated"
        );

        Ok(merged.window(start, end))
    }

    fn fetch_fallback(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> Option<PriceTable> {
        let fallback = self.fallback?;
        info!(instrument, source = fallback.name(), "trying fallback source");
        match fallback.fetch_range(instrument, start, end) {
            Ok(table) if !table.is_empty() => Some(table),
            Ok(_) => {
                warn!(instrument, source = fallback.name(), "fallback returned no bars");
                None
            }
            Err(e) => {
                warn!(instrument, source = fallback.name(), error = %e, "fallback failed");
                None
            }
        }
    }

    fn exhausted(
        &self,
        instrument: &str,
        start: NaiveDate,
        end: NaiveDate,
        base: PriceTable,
        force_refresh: bool,
        primary_err: QuantError,
    ) -> Result<PriceTable, QuantError> {
        if self.policy == StalePolicy::DegradeToCache {
            let stale = if force_refresh {
                self.cache.load(instrument)?
            } else {
                base
            };
            if !stale.is_empty() {
                warn!(
                    instrument,
                    cached_bars = stale.len(),
                    "live sources failed, serving cached bars"
                );
                return Ok(stale.window(start, end));
            }
        }

        match self.fallback {
            Some(_) => Err(QuantError::SourceExhausted {
                instrument: instrument.to_string(),
                cause: Box::new(primary_err),
            }),
            None => Err(primary_err),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoverageGap {
    Empty,
    StartsLate {
        first: NaiveDate,
        requested: NaiveDate,
    },
    EndsEarly {
        last: NaiveDate,
        requested: NaiveDate,
        gap_days: i64,
    },
}

impl fmt::Display for CoverageGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageGap::Empty => write!(f, "no data"),
            CoverageGap::StartsLate { first, requested } => {
                write!(f, "data starts {first}, after requested start {requested}")
            }
            CoverageGap::EndsEarly {
                last,
                requested,
                gap_days,
            } => write!(
                f,
                "data ends {last}, before requested end {requested} (gap={gap_days}d)"
            ),
        }
    }
}

/// Ways in which `table` fails to span `[start, end]`.
pub fn coverage_gaps(table: &PriceTable, start: NaiveDate, end: NaiveDate) -> Vec<CoverageGap> {
    let (Some(first), Some(last)) = (table.first_date(), table.last_date()) else {
        return vec![CoverageGap::Empty];
    };

    let mut gaps = Vec::new();
    if first > start {
        gaps.push(CoverageGap::StartsLate {
            first,
            requested: start,
        });
    }
    let gap_days = (end - last).num_days();
    if gap_days > END_TOLERANCE_DAYS {
        gaps.push(CoverageGap::EndsEarly {
            last,
            requested: end,
            gap_days,
        });
    }
    gaps
}
