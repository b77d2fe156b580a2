use chrono::NaiveDate;
use thiserror::Error;

/// Corporate-action feed failures. `SourceUnavailable` is retryable; the
/// caller must propagate it rather than adjust against an empty registry.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("corporate action source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("corporate action row malformed: {0}")]
    MalformedRow(String),
}

/// Market-data provider failures, isolated per symbol at the pipeline
/// boundary: one bad symbol must not abort the batch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("market data source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("fetch failed for {symbol}: {reason}")]
    Symbol { symbol: String, reason: String },
}

impl FetchError {
    pub fn symbol(symbol: &str, reason: impl Into<String>) -> Self {
        FetchError::Symbol {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
#[error("store operation failed: {0}")]
pub struct StoreError(pub String);

#[derive(Debug, Error)]
pub enum AdjustError {
    #[error("ratio must be positive for {symbol} effective {effective_date}: got {ratio}")]
    NonPositiveRatio {
        symbol: String,
        effective_date: NaiveDate,
        ratio: f64,
    },
    #[error("no price rows supplied")]
    InsufficientData,
}

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("price series is empty")]
    InsufficientData,
    #[error("initial cash must be positive: got {0}")]
    NonPositiveCash(f64),
    #[error("invalid signal windows: short={short} long={long}")]
    InvalidWindows { short: usize, long: usize },
}
