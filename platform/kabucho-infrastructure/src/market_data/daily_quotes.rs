use chrono::NaiveDate;
use kabucho_domain::errors::FetchError;
use kabucho_domain::repositories::market_data::PriceProvider;
use kabucho_domain::value_objects::price_bar::PriceBar;
use serde::Deserialize;
use std::thread;
use std::time::Duration;

const MAX_THROTTLE_ATTEMPTS: u32 = 5;

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    code: String,
    data: Vec<QuoteRow>,
}

#[derive(Debug, Deserialize)]
struct QuoteRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    adj_close: Option<f64>,
    volume: f64,
}

/// Per-symbol daily quote client. The provider speaks JSON:
/// `{"code": "0", "data": [{date, open, high, low, close, adj_close?, volume}]}`.
pub struct HttpPriceProvider {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl HttpPriceProvider {
    pub fn new(base_url: String) -> Result<Self, String> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl PriceProvider for HttpPriceProvider {
    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, FetchError> {
        let url = format!("{}/v1/daily", self.base_url);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let response = self
                .http
                .get(&url)
                .query(&[
                    ("symbol", symbol),
                    ("from", &start.to_string()),
                    ("to", &end.to_string()),
                ])
                .send()
                .map_err(|err| FetchError::symbol(symbol, format!("request failed: {err}")))?;

            if response.status().as_u16() == 429 && attempts <= MAX_THROTTLE_ATTEMPTS {
                let backoff = 500u64 * attempts as u64;
                thread::sleep(Duration::from_millis(backoff));
                continue;
            }

            if response.status().is_server_error() {
                return Err(FetchError::SourceUnavailable(format!(
                    "{url}: status {}",
                    response.status()
                )));
            }
            if !response.status().is_success() {
                return Err(FetchError::symbol(
                    symbol,
                    format!("status {}", response.status()),
                ));
            }

            let payload: QuotesResponse = response
                .json()
                .map_err(|err| FetchError::symbol(symbol, format!("response parse failed: {err}")))?;
            if payload.code != "0" {
                return Err(FetchError::symbol(
                    symbol,
                    format!("provider error code: {}", payload.code),
                ));
            }

            return parse_rows(symbol, payload.data);
        }
    }
}

fn parse_rows(symbol: &str, rows: Vec<QuoteRow>) -> Result<Vec<PriceBar>, FetchError> {
    let mut bars = Vec::with_capacity(rows.len());
    for row in rows {
        let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d")
            .map_err(|_| FetchError::symbol(symbol, format!("invalid date: {}", row.date)))?;
        bars.push(PriceBar {
            symbol: symbol.to_string(),
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            adj_close: row.adj_close.unwrap_or(row.close),
            volume: row.volume,
        });
    }
    bars.sort_by_key(|bar| bar.date);
    Ok(bars)
}
