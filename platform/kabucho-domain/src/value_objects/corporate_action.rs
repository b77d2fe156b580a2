use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A stock split or share consolidation, exactly one record per
/// (symbol, effective_date). `ratio` is the multiplier applied to every
/// price field of historical bars up to and including the effective date;
/// volume is divided by the same ratio, which keeps price x volume
/// invariant at each pre-action bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporateAction {
    pub symbol: String,
    pub company_name: String,
    pub ratio: f64,
    pub effective_date: NaiveDate,
}

impl CorporateAction {
    /// A split announced as "1 share becomes `into` shares". Historical
    /// prices divide by `into`, so the price ratio is `1 / into`.
    pub fn split(
        symbol: impl Into<String>,
        company_name: impl Into<String>,
        into: f64,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            company_name: company_name.into(),
            ratio: 1.0 / into,
            effective_date,
        }
    }

    /// A consolidation announced as "`from` shares become 1". Historical
    /// prices multiply by `from` directly.
    pub fn consolidation(
        symbol: impl Into<String>,
        company_name: impl Into<String>,
        from: f64,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            company_name: company_name.into(),
            ratio: from,
            effective_date,
        }
    }

    pub fn key(&self) -> (&str, NaiveDate) {
        (&self.symbol, self.effective_date)
    }
}

/// Audit row for an action actually applied during a run. Appended to the
/// applied-adjustments table, never replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    pub symbol: String,
    pub company_name: String,
    pub ratio: f64,
    pub effective_date: NaiveDate,
}

impl From<&CorporateAction> for AdjustmentRecord {
    fn from(action: &CorporateAction) -> Self {
        Self {
            symbol: action.symbol.clone(),
            company_name: action.company_name.clone(),
            ratio: action.ratio,
            effective_date: action.effective_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CorporateAction;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn split_ratio_divides_price() {
        let action = CorporateAction::split("7203.T", "Toyota", 5.0, d("2026-04-01"));
        assert!((action.ratio - 0.2).abs() < 1e-12);
    }

    #[test]
    fn consolidation_ratio_multiplies_price() {
        let action = CorporateAction::consolidation("9501.T", "TEPCO", 10.0, d("2026-04-01"));
        assert!((action.ratio - 10.0).abs() < 1e-12);
    }
}
