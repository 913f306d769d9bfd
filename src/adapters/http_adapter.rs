//! Blocking HTTP adapter backed by reqwest.

use crate::domain::error::QuantError;
use crate::ports::http_port::{HttpPort, HttpResponse};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use std::time::Duration;

const SOURCE_NAME: &str = "http";

// Exchange endpoints reject requests without a browser-like agent.
const BROWSER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0 Safari/537.36";

// The exchange also checks that requests come from its price history page.
const EXCHANGE_REFERER: &str =
    "https://www.twse.com.tw/zh/trading/historical/daily-stock-prices.html";

#[derive(Clone)]
pub struct ReqwestHttp {
    client: Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> Result<Self, QuantError> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers())
            .build()
            .map_err(|e| QuantError::TransientSource {
                source_name: SOURCE_NAME.into(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client })
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json,text/javascript,*/*;q=0.01"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-TW,zh;q=0.9,en;q=0.8"),
    );
    headers.insert(REFERER, HeaderValue::from_static(EXCHANGE_REFERER));
    headers
}

impl HttpPort for ReqwestHttp {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, QuantError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| QuantError::TransientSource {
                source_name: SOURCE_NAME.into(),
                reason: format!("GET {url}: {e}"),
            })?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| QuantError::TransientSource {
            source_name: SOURCE_NAME.into(),
            reason: format!("reading body from {url}: {e}"),
        })?;
        Ok(HttpResponse { status, body })
    }
}
