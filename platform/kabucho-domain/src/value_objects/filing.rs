use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inventory row for one narrative disclosure document (annual securities
/// report and similar). The document body lives with the provider; this
/// system persists the searchable metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub symbol: String,
    pub doc_id: String,
    pub title: String,
    pub period_end: Option<NaiveDate>,
    pub submitted_on: NaiveDate,
}

impl Filing {
    pub fn key(&self) -> (&str, &str) {
        (&self.symbol, &self.doc_id)
    }
}
