use chrono::NaiveDate;
use kabucho_domain::errors::FetchError;
use kabucho_domain::repositories::market_data::{FilingProvider, FundamentalsProvider};
use kabucho_domain::value_objects::filing::Filing;
use kabucho_domain::value_objects::fundamentals::{
    BalanceSheet, CashFlowStatement, FinancialStatement, IncomeStatement, PeriodType,
    ValuationMetrics,
};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct StatementsResponse {
    code: String,
    data: Vec<StatementRow>,
}

#[derive(Debug, Deserialize)]
struct StatementRow {
    kind: String,
    as_of: String,
    period: String,
    total_revenue: Option<f64>,
    gross_profit: Option<f64>,
    operating_income: Option<f64>,
    net_income: Option<f64>,
    ebitda: Option<f64>,
    total_assets: Option<f64>,
    current_assets: Option<f64>,
    current_liabilities: Option<f64>,
    inventory: Option<f64>,
    stockholders_equity: Option<f64>,
    total_debt: Option<f64>,
    operating_cash_flow: Option<f64>,
    investing_cash_flow: Option<f64>,
    financing_cash_flow: Option<f64>,
    free_cash_flow: Option<f64>,
    end_cash_position: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ValuationResponse {
    code: String,
    data: Option<ValuationRow>,
}

#[derive(Debug, Deserialize)]
struct ValuationRow {
    as_of: String,
    market_cap: Option<f64>,
    pe_ratio: Option<f64>,
    pb_ratio: Option<f64>,
    ps_ratio: Option<f64>,
    roe: Option<f64>,
    enterprise_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FilingsResponse {
    code: String,
    data: Vec<FilingRow>,
}

#[derive(Debug, Deserialize)]
struct FilingRow {
    doc_id: String,
    title: String,
    period_end: Option<String>,
    submitted_on: String,
}

/// Fundamentals endpoint client: statements per kind plus a valuation
/// snapshot, one call per symbol each.
pub struct HttpFundamentalsProvider {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl HttpFundamentalsProvider {
    pub fn new(base_url: String) -> Result<Self, String> {
        Ok(Self {
            http: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl FundamentalsProvider for HttpFundamentalsProvider {
    fn fetch_statements(&self, symbol: &str) -> Result<Vec<FinancialStatement>, FetchError> {
        let url = format!("{}/v1/statements", self.base_url);
        let payload: StatementsResponse =
            get_json(&self.http, &url, symbol, &[("symbol", symbol)])?;
        check_code(&payload.code, symbol)?;
        payload
            .data
            .into_iter()
            .map(|row| statement_from_row(symbol, row))
            .collect()
    }

    fn fetch_valuation(&self, symbol: &str) -> Result<Option<ValuationMetrics>, FetchError> {
        let url = format!("{}/v1/valuation", self.base_url);
        let payload: ValuationResponse =
            get_json(&self.http, &url, symbol, &[("symbol", symbol)])?;
        check_code(&payload.code, symbol)?;
        payload
            .data
            .map(|row| {
                Ok(ValuationMetrics {
                    symbol: symbol.to_string(),
                    as_of: parse_date(symbol, &row.as_of)?,
                    market_cap: row.market_cap,
                    pe_ratio: row.pe_ratio,
                    pb_ratio: row.pb_ratio,
                    ps_ratio: row.ps_ratio,
                    roe: row.roe,
                    enterprise_value: row.enterprise_value,
                })
            })
            .transpose()
    }
}

/// Disclosure-document inventory client.
pub struct HttpFilingProvider {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl HttpFilingProvider {
    pub fn new(base_url: String) -> Result<Self, String> {
        Ok(Self {
            http: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl FilingProvider for HttpFilingProvider {
    fn fetch_filings(&self, symbol: &str, since: NaiveDate) -> Result<Vec<Filing>, FetchError> {
        let url = format!("{}/v1/filings", self.base_url);
        let payload: FilingsResponse = get_json(
            &self.http,
            &url,
            symbol,
            &[("symbol", symbol), ("since", &since.to_string())],
        )?;
        check_code(&payload.code, symbol)?;
        payload
            .data
            .into_iter()
            .map(|row| {
                Ok(Filing {
                    symbol: symbol.to_string(),
                    doc_id: row.doc_id,
                    title: row.title,
                    period_end: row
                        .period_end
                        .as_deref()
                        .map(|value| parse_date(symbol, value))
                        .transpose()?,
                    submitted_on: parse_date(symbol, &row.submitted_on)?,
                })
            })
            .collect()
    }
}

fn build_client() -> Result<reqwest::blocking::Client, String> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|err| format!("failed to build http client: {err}"))
}

fn get_json<T: serde::de::DeserializeOwned>(
    http: &reqwest::blocking::Client,
    url: &str,
    symbol: &str,
    query: &[(&str, &str)],
) -> Result<T, FetchError> {
    let response = http
        .get(url)
        .query(query)
        .send()
        .map_err(|err| FetchError::symbol(symbol, format!("request failed: {err}")))?;
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
    response
        .json()
        .map_err(|err| FetchError::symbol(symbol, format!("response parse failed: {err}")))
}

fn check_code(code: &str, symbol: &str) -> Result<(), FetchError> {
    if code != "0" {
        return Err(FetchError::symbol(
            symbol,
            format!("provider error code: {code}"),
        ));
    }
    Ok(())
}

fn parse_date(symbol: &str, value: &str) -> Result<NaiveDate, FetchError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| FetchError::symbol(symbol, format!("invalid date: {value}")))
}

fn statement_from_row(symbol: &str, row: StatementRow) -> Result<FinancialStatement, FetchError> {
    let as_of = parse_date(symbol, &row.as_of)?;
    let period = PeriodType::parse(&row.period)
        .ok_or_else(|| FetchError::symbol(symbol, format!("invalid period: {}", row.period)))?;

    match row.kind.as_str() {
        "income" => Ok(FinancialStatement::Income(IncomeStatement {
            symbol: symbol.to_string(),
            as_of,
            period,
            total_revenue: row.total_revenue,
            gross_profit: row.gross_profit,
            operating_income: row.operating_income,
            net_income: row.net_income,
            ebitda: row.ebitda,
        })),
        "balance" => Ok(FinancialStatement::Balance(BalanceSheet {
            symbol: symbol.to_string(),
            as_of,
            period,
            total_assets: row.total_assets,
            current_assets: row.current_assets,
            current_liabilities: row.current_liabilities,
            inventory: row.inventory,
            stockholders_equity: row.stockholders_equity,
            total_debt: row.total_debt,
        })),
        "cash_flow" => Ok(FinancialStatement::CashFlow(CashFlowStatement {
            symbol: symbol.to_string(),
            as_of,
            period,
            operating_cash_flow: row.operating_cash_flow,
            investing_cash_flow: row.investing_cash_flow,
            financing_cash_flow: row.financing_cash_flow,
            free_cash_flow: row.free_cash_flow,
            end_cash_position: row.end_cash_position,
        })),
        other => Err(FetchError::symbol(
            symbol,
            format!("unknown statement kind: {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{statement_from_row, StatementRow};
    use kabucho_domain::value_objects::fundamentals::{FinancialStatement, PeriodType};

    fn row(kind: &str, period: &str) -> StatementRow {
        StatementRow {
            kind: kind.to_string(),
            as_of: "2026-03-31".to_string(),
            period: period.to_string(),
            total_revenue: Some(1_000.0),
            gross_profit: None,
            operating_income: Some(120.0),
            net_income: Some(80.0),
            ebitda: None,
            total_assets: Some(5_000.0),
            current_assets: None,
            current_liabilities: None,
            inventory: None,
            stockholders_equity: Some(2_000.0),
            total_debt: None,
            operating_cash_flow: Some(200.0),
            investing_cash_flow: None,
            financing_cash_flow: None,
            free_cash_flow: None,
            end_cash_position: None,
        }
    }

    #[test]
    fn maps_kinds_to_tagged_statements() {
        let income = statement_from_row("7203.T", row("income", "12M")).unwrap();
        match income {
            FinancialStatement::Income(s) => {
                assert_eq!(s.period, PeriodType::Annual);
                assert_eq!(s.total_revenue, Some(1_000.0));
                assert!(s.gross_profit.is_none());
            }
            other => panic!("expected income statement, got {other:?}"),
        }

        let balance = statement_from_row("7203.T", row("balance", "3M")).unwrap();
        assert!(matches!(balance, FinancialStatement::Balance(_)));

        let cash_flow = statement_from_row("7203.T", row("cash_flow", "3M")).unwrap();
        assert!(matches!(cash_flow, FinancialStatement::CashFlow(_)));
    }

    #[test]
    fn unknown_kind_or_period_rejected() {
        assert!(statement_from_row("7203.T", row("equity", "12M")).is_err());
        assert!(statement_from_row("7203.T", row("income", "6M")).is_err());
    }
}
