//! Yahoo Finance chart adapter, used as the secondary price source.
//!
//! Keyed by a market-suffixed ticker (`2330.TW`). The chart API treats
//! `period2` as exclusive, so the request runs one day past `end` and the
//! result is trimmed back to the inclusive window.

use crate::domain::error::QuantError;
use crate::domain::ohlcv::{Bar, PriceTable};
use crate::domain::retry::RetryPolicy;
use crate::ports::http_port::HttpPort;
use crate::ports::price_source_port::PriceSource;
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::info;

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
const SOURCE_NAME: &str = "yahoo";
const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooSource<H: HttpPort> {
    http: H,
    base_url: String,
    market_suffix: String,
    retry: RetryPolicy,
}

impl<H: HttpPort> YahooSource<H> {
    pub fn new(http: H) -> Self {
        Self {
            http,
            base_url: YAHOO_BASE_URL.to_string(),
            market_suffix: ".TW".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_market_suffix(mut self, suffix: &str) -> Self {
        self.market_suffix = suffix.to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `2330` becomes `2330.TW`; an already-suffixed ticker is kept.
    pub fn ticker(&self, instrument: &str) -> String {
        let instrument = instrument.trim();
        if instrument.ends_with(&self.market_suffix) {
            instrument.to_string()
        } else {
            format!("{instrument}{}", self.market_suffix)
        }
    }

    fn request_chart(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<ChartEnvelope, QuantError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let query = [
            ("period1", epoch_seconds(start).to_string()),
            ("period2", epoch_seconds(day_after(end)).to_string()),
            ("interval", "1d".to_string()),
            ("events", "history".to_string()),
        ];
        let response = self.http.get(&url, &query)?;

        if response.status == 429 || response.status >= 500 {
            return Err(QuantError::TransientSource {
                source_name: SOURCE_NAME.into(),
                reason: format!("{ticker}: HTTP {}", response.status),
            });
        }

        // 4xx responses still carry a chart.error body worth reporting.
        let envelope: ChartEnvelope =
            serde_json::from_str(&response.body).map_err(|e| QuantError::InvalidResponse {
                source_name: SOURCE_NAME.into(),
                reason: format!("{ticker}: HTTP {}: {e}", response.status),
            })?;
        if let Some(err) = &envelope.chart.error {
            return Err(QuantError::InvalidResponse {
                source_name: SOURCE_NAME.into(),
                reason: format!("{ticker}: {} {}", err.code, err.description),
            });
        }
        Ok(envelope)
    }
}

impl<H: HttpPort> PriceSource for YahooSource<H> {
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
        let ticker = self.ticker(instrument);
        let envelope = self
            .retry
            .run(&format!("{SOURCE_NAME} {ticker}"), || self.request_chart(&ticker, start, end))?;

        let bars = envelope
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(chart_bars)
            .unwrap_or_default();

        let table = PriceTable::from_bars(bars).window(start, end);
        info!(instrument, ticker = %ticker, bars = table.len(), "range fetched from yahoo");
        Ok(table)
    }
}

fn chart_bars(result: ChartResult) -> Vec<Bar> {
    let offset = result.meta.map(|m| m.gmtoffset).unwrap_or(0);
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let at = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten().filter(|v| v.is_finite());

    result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            Some(Bar {
                date: local_date(ts, offset)?,
                open: at(&quote.open, i)?,
                high: at(&quote.high, i)?,
                low: at(&quote.low, i)?,
                close: at(&quote.close, i)?,
                volume: at(&quote.volume, i).unwrap_or(0.0),
            })
        })
        .collect()
}

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Exclusive upper bound for an inclusive `end`; saturates at the last
/// representable date.
fn day_after(end: NaiveDate) -> NaiveDate {
    end.checked_add_signed(Duration::days(1)).unwrap_or(end)
}

fn epoch_seconds(date: NaiveDate) -> i64 {
    (date - unix_epoch()).num_days() * SECONDS_PER_DAY
}

/// Exchange-local calendar date of a UTC timestamp.
fn local_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    let days = (ts + gmtoffset).div_euclid(SECONDS_PER_DAY);
    unix_epoch().checked_add_signed(Duration::try_days(days)?)
}
