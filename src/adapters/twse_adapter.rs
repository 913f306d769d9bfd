//! Taiwan Stock Exchange daily-bar adapter.
//!
//! The exchange serves one calendar month of bars per request regardless of
//! the day in the `date` parameter, so ranges are fetched month by month and
//! trimmed afterwards. Each attempt tries the current endpoint first and the
//! legacy one second; attempts are retried with backoff.

use crate::domain::calendar::month_starts;
use crate::domain::error::QuantError;
use crate::domain::numeric::clean_num;
use crate::domain::ohlcv::{Bar, PriceTable};
use crate::domain::retry::RetryPolicy;
use crate::ports::http_port::HttpPort;
use crate::ports::price_source_port::PriceSource;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

pub const TWSE_BASE_URL: &str = "https://www.twse.com.tw";
const RWD_PATH: &str = "/rwd/zh/stock/day";
const LEGACY_PATH: &str = "/exchangeReport/STOCK_DAY";
const SOURCE_NAME: &str = "twse";

/// Years below this are ROC (Minguo) calendar years.
const ROC_EPOCH: i32 = 1911;

// Positional columns of a `data` row.
const COL_DATE: usize = 0;
const COL_VOLUME: usize = 1;
const COL_OPEN: usize = 3;
const COL_HIGH: usize = 4;
const COL_LOW: usize = 5;
const COL_CLOSE: usize = 6;
const MIN_ROW_LEN: usize = 7;

#[derive(Debug, Deserialize)]
struct DayPayload {
    #[serde(default)]
    stat: Option<String>,
    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,
}

pub struct TwseSource<H: HttpPort> {
    http: H,
    base_url: String,
    retry: RetryPolicy,
    request_interval: Duration,
}

impl<H: HttpPort> TwseSource<H> {
    pub fn new(http: H) -> Self {
        Self {
            http,
            base_url: TWSE_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            request_interval: Duration::ZERO,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Pause between consecutive month requests of one range fetch.
    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    /// All valid bars of the month containing `month`.
    pub fn fetch_month(&self, instrument: &str, month: NaiveDate) -> Result<Vec<Bar>, QuantError> {
        let params = [
            ("date", month.format("%Y%m01").to_string()),
            ("stockNo", instrument.to_string()),
            ("response", "json".to_string()),
        ];
        let label = format!("{SOURCE_NAME} {instrument} {}", month.format("%Y-%m"));
        let payload = self.retry.run(&label, || self.request_payload(&params))?;

        if let Some(stat) = payload.stat.as_deref() {
            if !stat.is_empty() && !stat.contains("OK") {
                return Err(QuantError::InvalidResponse {
                    source_name: SOURCE_NAME.into(),
                    reason: format!("response not OK: {stat}"),
                });
            }
        }

        let rows = payload.data.unwrap_or_default();
        let bars: Vec<Bar> = rows.iter().filter_map(|row| parse_row(row)).collect();
        debug!(
            instrument,
            month = %month.format("%Y-%m"),
            rows = rows.len(),
            bars = bars.len(),
            "month fetched"
        );
        Ok(bars)
    }

    fn request_payload(&self, params: &[(&str, String)]) -> Result<DayPayload, QuantError> {
        let mut failures = Vec::new();
        for path in [RWD_PATH, LEGACY_PATH] {
            let url = format!("{}{}", self.base_url, path);
            let response = match self.http.get(&url, params) {
                Ok(r) => r,
                Err(e) => {
                    debug!(url = %url, error = %e, "endpoint failed");
                    failures.push(e.to_string());
                    continue;
                }
            };
            if response.status == 404 {
                debug!(url = %url, "endpoint not found");
                failures.push(format!("{url}: 404"));
                continue;
            }
            if !response.is_success() {
                failures.push(format!("{url}: HTTP {}", response.status));
                continue;
            }
            match serde_json::from_str::<DayPayload>(&response.body) {
                Ok(payload) => return Ok(payload),
                Err(e) => failures.push(format!("{url}: invalid JSON: {e}")),
            }
        }
        Err(QuantError::TransientSource {
            source_name: SOURCE_NAME.into(),
            reason: format!("all endpoints failed (rwd + legacy): {}", failures.join("; ")),
        })
    }
}

impl<H: HttpPort> PriceSource for TwseSource<H> {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn fetch_range(
        &self,
        instrument: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, QuantError> {
        if start > end {
            return Ok(PriceTable::new());
        }

        let mut bars = Vec::new();
        for (i, month) in month_starts(start, end).into_iter().enumerate() {
            if i > 0 && !self.request_interval.is_zero() {
                thread::sleep(self.request_interval);
            }
            bars.extend(self.fetch_month(instrument, month)?);
        }

        let table = PriceTable::from_bars(bars).window(start, end);
        info!(instrument, %start, %end, bars = table.len(), "range fetched from twse");
        Ok(table)
    }
}

/// Strip a market suffix such as `.TW` to get the bare exchange code.
pub fn bare_code(symbol: &str) -> &str {
    let symbol = symbol.trim();
    symbol
        .strip_suffix(".TW")
        .or_else(|| symbol.strip_suffix(".tw"))
        .unwrap_or(symbol)
}

fn token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn cell(row: &[Value], idx: usize) -> Option<f64> {
    clean_num(row.get(idx).and_then(token).as_deref())
}

fn parse_row(row: &[Value]) -> Option<Bar> {
    if row.len() < MIN_ROW_LEN {
        return None;
    }
    let date = parse_exchange_date(&token(&row[COL_DATE])?)?;
    Some(Bar {
        date,
        open: cell(row, COL_OPEN)?,
        high: cell(row, COL_HIGH)?,
        low: cell(row, COL_LOW)?,
        close: cell(row, COL_CLOSE)?,
        volume: cell(row, COL_VOLUME).unwrap_or(0.0),
    })
}

/// Parse `YYYY/MM/DD`, `YYYY-MM-DD` or ROC `YYY/MM/DD` dates.
fn parse_exchange_date(raw: &str) -> Option<NaiveDate> {
    let normalized = raw.trim().replace('/', "-");
    let mut parts = normalized.split('-');
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let day: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let year = if year < ROC_EPOCH { year + ROC_EPOCH } else { year };
    NaiveDate::from_ymd_opt(year, month, day)
}
