use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily bar for one listed symbol. Keyed by (symbol, date); storage
/// order is irrelevant, date is the sort key for all analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn key(&self) -> (&str, NaiveDate) {
        (&self.symbol, self.date)
    }
}
