use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reporting period of a statement: quarterly ("3M") or annual ("12M").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodType {
    Quarterly,
    Annual,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Quarterly => "3M",
            PeriodType::Annual => "12M",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "3M" => Some(PeriodType::Quarterly),
            "12M" => Some(PeriodType::Annual),
            _ => None,
        }
    }
}

/// Line items the provider did not publish stay `None`; they are never
/// substituted with NaN or zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub period: PeriodType,
    pub total_revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub ebitda: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub period: PeriodType,
    pub total_assets: Option<f64>,
    pub current_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub inventory: Option<f64>,
    pub stockholders_equity: Option<f64>,
    pub total_debt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub period: PeriodType,
    pub operating_cash_flow: Option<f64>,
    pub investing_cash_flow: Option<f64>,
    pub financing_cash_flow: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub end_cash_position: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FinancialStatement {
    Income(IncomeStatement),
    Balance(BalanceSheet),
    CashFlow(CashFlowStatement),
}

impl FinancialStatement {
    pub fn symbol(&self) -> &str {
        match self {
            FinancialStatement::Income(s) => &s.symbol,
            FinancialStatement::Balance(s) => &s.symbol,
            FinancialStatement::CashFlow(s) => &s.symbol,
        }
    }

    pub fn as_of(&self) -> NaiveDate {
        match self {
            FinancialStatement::Income(s) => s.as_of,
            FinancialStatement::Balance(s) => s.as_of,
            FinancialStatement::CashFlow(s) => s.as_of,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FinancialStatement::Income(_) => "income",
            FinancialStatement::Balance(_) => "balance",
            FinancialStatement::CashFlow(_) => "cash_flow",
        }
    }
}

/// Point-in-time valuation snapshot per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationMetrics {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub ps_ratio: Option<f64>,
    pub roe: Option<f64>,
    pub enterprise_value: Option<f64>,
}
