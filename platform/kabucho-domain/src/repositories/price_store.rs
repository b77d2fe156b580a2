use crate::errors::StoreError;
use crate::value_objects::corporate_action::{AdjustmentRecord, CorporateAction};
use crate::value_objects::filing::Filing;
use crate::value_objects::fundamentals::{FinancialStatement, ValuationMetrics};
use crate::value_objects::price_bar::PriceBar;
use chrono::NaiveDate;

/// Parameterized filter for price reads. `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct PriceQuery {
    pub symbol: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl PriceQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn symbol(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            ..Self::default()
        }
    }
}

/// The persisted-table collaborator. Tables are addressed by name so the
/// raw/adjusted lineage stays visible at call sites; implementations must
/// validate names before interpolating them into SQL.
///
/// Write granularity is whole-table replace or append-with-dedupe, never
/// partial row edits: a run that dies mid-way must not leave a
/// half-adjusted table behind.
pub trait PriceStore {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError>;

    fn load_prices(&self, table: &str, query: &PriceQuery) -> Result<Vec<PriceBar>, StoreError>;

    /// Replace the table contents with `bars` in one transaction.
    fn replace_prices(&self, table: &str, bars: &[PriceBar]) -> Result<(), StoreError>;

    /// Append bars, silently skipping rows whose (symbol, date) key is
    /// already present. Returns the number of rows actually inserted.
    fn append_prices(&self, table: &str, bars: &[PriceBar]) -> Result<u64, StoreError>;

    fn append_actions(&self, table: &str, actions: &[CorporateAction]) -> Result<u64, StoreError>;

    /// Full corporate-action history, needed when bootstrapping the
    /// adjusted table from scratch.
    fn load_actions(&self, table: &str) -> Result<Vec<CorporateAction>, StoreError>;

    fn append_adjustments(
        &self,
        table: &str,
        records: &[AdjustmentRecord],
    ) -> Result<u64, StoreError>;

    /// Audit log of actions already applied by earlier runs; consulted so
    /// a same-day re-run never rescales the baseline twice.
    fn load_adjustments(&self, table: &str) -> Result<Vec<AdjustmentRecord>, StoreError>;

    fn append_statements(
        &self,
        table: &str,
        statements: &[FinancialStatement],
    ) -> Result<u64, StoreError>;

    fn append_valuations(
        &self,
        table: &str,
        valuations: &[ValuationMetrics],
    ) -> Result<u64, StoreError>;

    fn append_filings(&self, table: &str, filings: &[Filing]) -> Result<u64, StoreError>;
}
