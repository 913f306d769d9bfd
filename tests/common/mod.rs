#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
pub use twquant::domain::error::QuantError;
pub use twquant::domain::ohlcv::{Bar, PriceTable};
use twquant::ports::cache_port::CachePort;
use twquant::ports::http_port::{HttpPort, HttpResponse};
use twquant::ports::price_source_port::PriceSource;

/// HTTP transport that answers every request with a canned response keyed by
/// URL path, recording each request it sees.
pub struct MockHttp {
    pub responses: HashMap<String, HttpResponse>,
    pub requests: RefCell<Vec<String>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, url: &str, status: u16, body: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            HttpResponse {
                status,
                body: body.to_string(),
            },
        );
        self
    }
}

impl HttpPort for MockHttp {
    fn get(&self, url: &str, _query: &[(&str, String)]) -> Result<HttpResponse, QuantError> {
        self.requests.borrow_mut().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| QuantError::TransientSource {
                source_name: "mock-http".into(),
                reason: format!("connection refused: {url}"),
            })
    }
}

/// Price source returning a fixed table (windowed) or a fixed error.
pub struct MockSource {
    pub name: &'static str,
    pub bars: Vec<Bar>,
    pub error: Option<String>,
    pub calls: RefCell<usize>,
}

impl MockSource {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            bars: Vec::new(),
            error: None,
            calls: RefCell::new(0),
        }
    }

    pub fn with_bars(mut self, bars: Vec<Bar>) -> Self {
        self.bars = bars;
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        *self.calls.borrow()
    }
}

impl PriceSource for MockSource {
    fn name(&self) -> &str {
        self.name
    }

    fn fetch_range(
        &self,
        _instrument: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, QuantError> {
        *self.calls.borrow_mut() += 1;
        if let Some(reason) = &self.error {
            return Err(QuantError::TransientSource {
                source_name: self.name.into(),
                reason: reason.clone(),
            });
        }
        Ok(PriceTable::from_bars(self.bars.clone()).window(start, end))
    }
}

#[derive(Default)]
pub struct MemoryCache {
    pub tables: RefCell<HashMap<String, PriceTable>>,
    pub saves: RefCell<usize>,
}

impl MemoryCache {
    pub fn with_table(self, instrument: &str, table: PriceTable) -> Self {
        self.tables.borrow_mut().insert(instrument.to_string(), table);
        self
    }

    pub fn stored(&self, instrument: &str) -> PriceTable {
        self.tables
            .borrow()
            .get(instrument)
            .cloned()
            .unwrap_or_default()
    }
}

impl CachePort for MemoryCache {
    fn load(&self, instrument: &str) -> Result<PriceTable, QuantError> {
        Ok(self.stored(instrument))
    }

    fn save(&self, instrument: &str, table: &PriceTable) -> Result<(), QuantError> {
        *self.saves.borrow_mut() += 1;
        self.tables
            .borrow_mut()
            .insert(instrument.to_string(), table.clone());
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date_str: &str, close: f64) -> Bar {
    Bar {
        date: NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap(),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000.0,
    }
}

/// One bar per calendar day starting at `start`, closes taken in order.
pub fn daily_bars(start: NaiveDate, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        })
        .collect()
}

/// A TWSE month payload body with ROC-dated rows `(day, close)`.
pub fn twse_body(roc_year: i32, month: u32, rows: &[(u32, &str)]) -> String {
    let data: Vec<String> = rows
        .iter()
        .map(|(day, close)| {
            format!(
                r#"["{roc_year}/{month:02}/{day:02}","1,000","x","{close}","{close}","{close}","{close}","0","10"]"#
            )
        })
        .collect();
    format!(r#"{{"stat":"OK","data":[{}]}}"#, data.join(","))
}
