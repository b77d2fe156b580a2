use crate::errors::FetchError;
use crate::value_objects::filing::Filing;
use crate::value_objects::fundamentals::{FinancialStatement, ValuationMetrics};
use crate::value_objects::price_bar::PriceBar;
use chrono::NaiveDate;

/// Per-symbol daily quote provider.
pub trait PriceProvider {
    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, FetchError>;
}

/// Per-symbol fundamentals provider: statements plus a valuation snapshot.
pub trait FundamentalsProvider {
    fn fetch_statements(&self, symbol: &str) -> Result<Vec<FinancialStatement>, FetchError>;

    fn fetch_valuation(&self, symbol: &str) -> Result<Option<ValuationMetrics>, FetchError>;
}

/// Disclosure-document inventory provider.
pub trait FilingProvider {
    fn fetch_filings(
        &self,
        symbol: &str,
        since: NaiveDate,
    ) -> Result<Vec<Filing>, FetchError>;
}
