use chrono::NaiveDate;
use kabucho_domain::errors::StoreError;
use kabucho_domain::repositories::price_store::{PriceQuery, PriceStore};
use kabucho_domain::value_objects::corporate_action::{AdjustmentRecord, CorporateAction};
use kabucho_domain::value_objects::filing::Filing;
use kabucho_domain::value_objects::fundamentals::{
    BalanceSheet, CashFlowStatement, FinancialStatement, IncomeStatement, PeriodType,
    ValuationMetrics,
};
use kabucho_domain::value_objects::price_bar::PriceBar;
use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use std::path::Path;
use std::time::Instant;

type PgPool = Pool<PostgresConnectionManager<NoTls>>;
type PooledClient = r2d2::PooledConnection<PostgresConnectionManager<NoTls>>;

/// Price tables written with replace semantics are created on first
/// write; the adjusted table's absence is what selects the bootstrap
/// path, so it must not appear in the migrations file.
const PRICE_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS {table} (
    symbol TEXT NOT NULL,
    date DATE NOT NULL,
    open DOUBLE PRECISION NOT NULL,
    high DOUBLE PRECISION NOT NULL,
    low DOUBLE PRECISION NOT NULL,
    close DOUBLE PRECISION NOT NULL,
    adj_close DOUBLE PRECISION NOT NULL,
    volume DOUBLE PRECISION NOT NULL,
    PRIMARY KEY (symbol, date)
)";

#[derive(Debug, Clone)]
pub struct PostgresPriceStore {
    pool: PgPool,
}

impl PostgresPriceStore {
    pub fn new(db_url: String, pool_max_size: u32) -> Result<Self, String> {
        let config = db_url
            .parse::<postgres::Config>()
            .map_err(|err| format!("invalid postgres db url: {err}"))?;
        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_max_size)
            .build(manager)
            .map_err(|err| format!("failed to build postgres pool: {err}"))?;
        Ok(Self { pool })
    }

    fn client(&self) -> Result<PooledClient, StoreError> {
        let get_start = Instant::now();
        let client = self.pool.get().map_err(|err| {
            metrics::counter!("kabucho.infra.postgres.pool.get.errors_total").increment(1);
            tracing::error!(error = %err, "failed to checkout postgres connection");
            StoreError(format!("failed to checkout postgres connection: {err}"))
        })?;
        metrics::histogram!("kabucho.infra.postgres.pool.get_ms")
            .record(get_start.elapsed().as_secs_f64() * 1000.0);
        Ok(client)
    }
}

impl PriceStore for PostgresPriceStore {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        validate_table_name(table).map_err(StoreError)?;
        let mut client = self.client()?;
        let row = client
            .query_one(
                "SELECT EXISTS (
                    SELECT FROM information_schema.tables
                    WHERE table_schema = current_schema() AND table_name = $1
                )",
                &[&table],
            )
            .map_err(|err| StoreError(format!("failed to probe table {table}: {err}")))?;
        Ok(row.get(0))
    }

    fn load_prices(&self, table: &str, query: &PriceQuery) -> Result<Vec<PriceBar>, StoreError> {
        validate_table_name(table).map_err(StoreError)?;
        let span = tracing::info_span!("infra.postgres.load_prices", table = %table);
        let _enter = span.enter();
        let overall_start = Instant::now();

        let mut client = self.client()?;
        let sql = format!(
            "SELECT symbol, date, open, high, low, close, adj_close, volume FROM {} \
             WHERE ($1::text IS NULL OR symbol = $1) \
             AND ($2::date IS NULL OR date >= $2) \
             AND ($3::date IS NULL OR date <= $3) \
             ORDER BY symbol ASC, date ASC",
            table
        );
        let rows = client
            .query(&sql, &[&query.symbol, &query.start, &query.end])
            .map_err(|err| {
                metrics::counter!("kabucho.infra.postgres.load_prices.errors_total").increment(1);
                tracing::error!(error = %err, "failed to query prices");
                StoreError(format!("failed to query prices from {table}: {err}"))
            })?;

        let bars: Vec<PriceBar> = rows
            .iter()
            .map(|row| PriceBar {
                symbol: row.get(0),
                date: row.get(1),
                open: row.get(2),
                high: row.get(3),
                low: row.get(4),
                close: row.get(5),
                adj_close: row.get(6),
                volume: row.get(7),
            })
            .collect();

        metrics::histogram!("kabucho.infra.postgres.load_prices_ms")
            .record(overall_start.elapsed().as_secs_f64() * 1000.0);
        metrics::counter!("kabucho.infra.postgres.load_prices.rows_total")
            .increment(bars.len() as u64);
        tracing::debug!(rows = bars.len(), "loaded prices");
        Ok(bars)
    }

    fn replace_prices(&self, table: &str, bars: &[PriceBar]) -> Result<(), StoreError> {
        validate_table_name(table).map_err(StoreError)?;
        let span = tracing::info_span!("infra.postgres.replace_prices", table = %table);
        let _enter = span.enter();
        let overall_start = Instant::now();

        let mut client = self.client()?;
        client
            .batch_execute(&PRICE_TABLE_DDL.replace("{table}", table))
            .map_err(|err| StoreError(format!("failed to ensure table {table}: {err}")))?;

        // Whole-table replace in a single transaction: readers see either
        // the previous snapshot or the new one, never a partial write.
        let mut transaction = client
            .transaction()
            .map_err(|err| StoreError(format!("failed to start transaction: {err}")))?;
        transaction
            .execute(format!("DELETE FROM {}", table).as_str(), &[])
            .map_err(|err| StoreError(format!("failed to clear {table}: {err}")))?;
        let statement = transaction
            .prepare(&format!(
                "INSERT INTO {} (symbol, date, open, high, low, close, adj_close, volume) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                table
            ))
            .map_err(|err| StoreError(format!("failed to prepare insert: {err}")))?;
        for bar in bars {
            transaction
                .execute(
                    &statement,
                    &[
                        &bar.symbol,
                        &bar.date,
                        &bar.open,
                        &bar.high,
                        &bar.low,
                        &bar.close,
                        &bar.adj_close,
                        &bar.volume,
                    ],
                )
                .map_err(|err| StoreError(format!("insert into {table} failed: {err}")))?;
        }
        transaction
            .commit()
            .map_err(|err| StoreError(format!("failed to commit replace of {table}: {err}")))?;

        metrics::histogram!("kabucho.infra.postgres.replace_prices_ms")
            .record(overall_start.elapsed().as_secs_f64() * 1000.0);
        metrics::gauge!("kabucho.infra.postgres.replace_prices.rows").set(bars.len() as f64);
        tracing::debug!(rows = bars.len(), "replaced table contents");
        Ok(())
    }

    fn append_prices(&self, table: &str, bars: &[PriceBar]) -> Result<u64, StoreError> {
        validate_table_name(table).map_err(StoreError)?;
        if bars.is_empty() {
            return Ok(0);
        }

        let mut client = self.client()?;
        let mut transaction = client
            .transaction()
            .map_err(|err| StoreError(format!("failed to start transaction: {err}")))?;
        let statement = transaction
            .prepare(&format!(
                "INSERT INTO {} (symbol, date, open, high, low, close, adj_close, volume) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (symbol, date) DO NOTHING",
                table
            ))
            .map_err(|err| StoreError(format!("failed to prepare upsert: {err}")))?;

        let mut inserted = 0u64;
        for bar in bars {
            inserted += transaction
                .execute(
                    &statement,
                    &[
                        &bar.symbol,
                        &bar.date,
                        &bar.open,
                        &bar.high,
                        &bar.low,
                        &bar.close,
                        &bar.adj_close,
                        &bar.volume,
                    ],
                )
                .map_err(|err| StoreError(format!("append into {table} failed: {err}")))?;
        }
        transaction
            .commit()
            .map_err(|err| StoreError(format!("failed to commit append to {table}: {err}")))?;

        metrics::counter!("kabucho.infra.postgres.append_prices.rows_total").increment(inserted);
        tracing::debug!(rows = bars.len(), inserted, "appended price rows");
        Ok(inserted)
    }

    fn append_actions(&self, table: &str, actions: &[CorporateAction]) -> Result<u64, StoreError> {
        validate_table_name(table).map_err(StoreError)?;
        if actions.is_empty() {
            return Ok(0);
        }

        let mut client = self.client()?;
        let mut transaction = client
            .transaction()
            .map_err(|err| StoreError(format!("failed to start transaction: {err}")))?;
        let statement = transaction
            .prepare(&format!(
                "INSERT INTO {} (symbol, company_name, ratio, effective_date) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (symbol, effective_date) DO NOTHING",
                table
            ))
            .map_err(|err| StoreError(format!("failed to prepare upsert: {err}")))?;

        let mut inserted = 0u64;
        for action in actions {
            inserted += transaction
                .execute(
                    &statement,
                    &[
                        &action.symbol,
                        &action.company_name,
                        &action.ratio,
                        &action.effective_date,
                    ],
                )
                .map_err(|err| StoreError(format!("append into {table} failed: {err}")))?;
        }
        transaction
            .commit()
            .map_err(|err| StoreError(format!("failed to commit append to {table}: {err}")))?;
        Ok(inserted)
    }

    fn load_actions(&self, table: &str) -> Result<Vec<CorporateAction>, StoreError> {
        validate_table_name(table).map_err(StoreError)?;
        let mut client = self.client()?;
        let rows = client
            .query(
                &format!(
                    "SELECT symbol, company_name, ratio, effective_date FROM {} \
                     ORDER BY effective_date ASC, symbol ASC",
                    table
                ),
                &[],
            )
            .map_err(|err| StoreError(format!("failed to query actions from {table}: {err}")))?;
        Ok(rows
            .iter()
            .map(|row| CorporateAction {
                symbol: row.get(0),
                company_name: row.get(1),
                ratio: row.get(2),
                effective_date: row.get(3),
            })
            .collect())
    }

    fn append_adjustments(
        &self,
        table: &str,
        records: &[AdjustmentRecord],
    ) -> Result<u64, StoreError> {
        validate_table_name(table).map_err(StoreError)?;
        if records.is_empty() {
            return Ok(0);
        }

        let mut client = self.client()?;
        let mut transaction = client
            .transaction()
            .map_err(|err| StoreError(format!("failed to start transaction: {err}")))?;
        let statement = transaction
            .prepare(&format!(
                "INSERT INTO {} (symbol, company_name, ratio, effective_date) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (symbol, effective_date) DO NOTHING",
                table
            ))
            .map_err(|err| StoreError(format!("failed to prepare upsert: {err}")))?;

        let mut inserted = 0u64;
        for record in records {
            inserted += transaction
                .execute(
                    &statement,
                    &[
                        &record.symbol,
                        &record.company_name,
                        &record.ratio,
                        &record.effective_date,
                    ],
                )
                .map_err(|err| StoreError(format!("append into {table} failed: {err}")))?;
        }
        transaction
            .commit()
            .map_err(|err| StoreError(format!("failed to commit append to {table}: {err}")))?;
        Ok(inserted)
    }

    fn load_adjustments(&self, table: &str) -> Result<Vec<AdjustmentRecord>, StoreError> {
        validate_table_name(table).map_err(StoreError)?;
        let mut client = self.client()?;
        let rows = client
            .query(
                &format!(
                    "SELECT symbol, company_name, ratio, effective_date FROM {} \
                     ORDER BY effective_date ASC, symbol ASC",
                    table
                ),
                &[],
            )
            .map_err(|err| {
                StoreError(format!("failed to query adjustments from {table}: {err}"))
            })?;
        Ok(rows
            .iter()
            .map(|row| AdjustmentRecord {
                symbol: row.get(0),
                company_name: row.get(1),
                ratio: row.get(2),
                effective_date: row.get(3),
            })
            .collect())
    }

    fn append_statements(
        &self,
        table: &str,
        statements: &[FinancialStatement],
    ) -> Result<u64, StoreError> {
        validate_table_name(table).map_err(StoreError)?;
        if statements.is_empty() {
            return Ok(0);
        }

        let mut client = self.client()?;
        let mut transaction = client
            .transaction()
            .map_err(|err| StoreError(format!("failed to start transaction: {err}")))?;
        let statement = transaction
            .prepare(&format!(
                "INSERT INTO {} (symbol, as_of, period, kind, \
                 total_revenue, gross_profit, operating_income, net_income, ebitda, \
                 total_assets, current_assets, current_liabilities, inventory, \
                 stockholders_equity, total_debt, \
                 operating_cash_flow, investing_cash_flow, financing_cash_flow, \
                 free_cash_flow, end_cash_position) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                 $16, $17, $18, $19, $20) \
                 ON CONFLICT (symbol, as_of, period, kind) DO NOTHING",
                table
            ))
            .map_err(|err| StoreError(format!("failed to prepare upsert: {err}")))?;

        let mut inserted = 0u64;
        for row in statements {
            let flat = FlatStatement::from(row);
            inserted += transaction
                .execute(
                    &statement,
                    &[
                        &flat.symbol,
                        &flat.as_of,
                        &flat.period,
                        &flat.kind,
                        &flat.total_revenue,
                        &flat.gross_profit,
                        &flat.operating_income,
                        &flat.net_income,
                        &flat.ebitda,
                        &flat.total_assets,
                        &flat.current_assets,
                        &flat.current_liabilities,
                        &flat.inventory,
                        &flat.stockholders_equity,
                        &flat.total_debt,
                        &flat.operating_cash_flow,
                        &flat.investing_cash_flow,
                        &flat.financing_cash_flow,
                        &flat.free_cash_flow,
                        &flat.end_cash_position,
                    ],
                )
                .map_err(|err| StoreError(format!("append into {table} failed: {err}")))?;
        }
        transaction
            .commit()
            .map_err(|err| StoreError(format!("failed to commit append to {table}: {err}")))?;
        Ok(inserted)
    }

    fn append_valuations(
        &self,
        table: &str,
        valuations: &[ValuationMetrics],
    ) -> Result<u64, StoreError> {
        validate_table_name(table).map_err(StoreError)?;
        if valuations.is_empty() {
            return Ok(0);
        }

        let mut client = self.client()?;
        let mut transaction = client
            .transaction()
            .map_err(|err| StoreError(format!("failed to start transaction: {err}")))?;
        let statement = transaction
            .prepare(&format!(
                "INSERT INTO {} (symbol, as_of, market_cap, pe_ratio, pb_ratio, ps_ratio, \
                 roe, enterprise_value) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (symbol, as_of) DO NOTHING",
                table
            ))
            .map_err(|err| StoreError(format!("failed to prepare upsert: {err}")))?;

        let mut inserted = 0u64;
        for row in valuations {
            inserted += transaction
                .execute(
                    &statement,
                    &[
                        &row.symbol,
                        &row.as_of,
                        &row.market_cap,
                        &row.pe_ratio,
                        &row.pb_ratio,
                        &row.ps_ratio,
                        &row.roe,
                        &row.enterprise_value,
                    ],
                )
                .map_err(|err| StoreError(format!("append into {table} failed: {err}")))?;
        }
        transaction
            .commit()
            .map_err(|err| StoreError(format!("failed to commit append to {table}: {err}")))?;
        Ok(inserted)
    }

    fn append_filings(&self, table: &str, filings: &[Filing]) -> Result<u64, StoreError> {
        validate_table_name(table).map_err(StoreError)?;
        if filings.is_empty() {
            return Ok(0);
        }

        let mut client = self.client()?;
        let mut transaction = client
            .transaction()
            .map_err(|err| StoreError(format!("failed to start transaction: {err}")))?;
        let statement = transaction
            .prepare(&format!(
                "INSERT INTO {} (symbol, doc_id, title, period_end, submitted_on) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (symbol, doc_id) DO NOTHING",
                table
            ))
            .map_err(|err| StoreError(format!("failed to prepare upsert: {err}")))?;

        let mut inserted = 0u64;
        for filing in filings {
            inserted += transaction
                .execute(
                    &statement,
                    &[
                        &filing.symbol,
                        &filing.doc_id,
                        &filing.title,
                        &filing.period_end,
                        &filing.submitted_on,
                    ],
                )
                .map_err(|err| StoreError(format!("append into {table} failed: {err}")))?;
        }
        transaction
            .commit()
            .map_err(|err| StoreError(format!("failed to commit append to {table}: {err}")))?;
        Ok(inserted)
    }
}

/// One SQL row regardless of statement kind; line items outside the
/// statement's kind stay NULL.
struct FlatStatement {
    symbol: String,
    as_of: NaiveDate,
    period: String,
    kind: String,
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

impl FlatStatement {
    fn empty(symbol: String, as_of: NaiveDate, period: PeriodType, kind: &str) -> Self {
        Self {
            symbol,
            as_of,
            period: period.as_str().to_string(),
            kind: kind.to_string(),
            total_revenue: None,
            gross_profit: None,
            operating_income: None,
            net_income: None,
            ebitda: None,
            total_assets: None,
            current_assets: None,
            current_liabilities: None,
            inventory: None,
            stockholders_equity: None,
            total_debt: None,
            operating_cash_flow: None,
            investing_cash_flow: None,
            financing_cash_flow: None,
            free_cash_flow: None,
            end_cash_position: None,
        }
    }
}

impl From<&FinancialStatement> for FlatStatement {
    fn from(statement: &FinancialStatement) -> Self {
        match statement {
            FinancialStatement::Income(income) => {
                let mut flat = FlatStatement::empty(
                    income.symbol.clone(),
                    income.as_of,
                    income.period,
                    statement.kind(),
                );
                flat.total_revenue = income.total_revenue;
                flat.gross_profit = income.gross_profit;
                flat.operating_income = income.operating_income;
                flat.net_income = income.net_income;
                flat.ebitda = income.ebitda;
                flat
            }
            FinancialStatement::Balance(balance) => {
                let mut flat = FlatStatement::empty(
                    balance.symbol.clone(),
                    balance.as_of,
                    balance.period,
                    statement.kind(),
                );
                flat.total_assets = balance.total_assets;
                flat.current_assets = balance.current_assets;
                flat.current_liabilities = balance.current_liabilities;
                flat.inventory = balance.inventory;
                flat.stockholders_equity = balance.stockholders_equity;
                flat.total_debt = balance.total_debt;
                flat
            }
            FinancialStatement::CashFlow(cash_flow) => {
                let mut flat = FlatStatement::empty(
                    cash_flow.symbol.clone(),
                    cash_flow.as_of,
                    cash_flow.period,
                    statement.kind(),
                );
                flat.operating_cash_flow = cash_flow.operating_cash_flow;
                flat.investing_cash_flow = cash_flow.investing_cash_flow;
                flat.financing_cash_flow = cash_flow.financing_cash_flow;
                flat.free_cash_flow = cash_flow.free_cash_flow;
                flat.end_cash_position = cash_flow.end_cash_position;
                flat
            }
        }
    }
}

/// Apply the SQL migrations file against the target database.
pub fn apply_migrations(db_url: &str, migrations_path: &Path) -> Result<(), String> {
    let sql = std::fs::read_to_string(migrations_path).map_err(|err| {
        format!(
            "failed to read migrations file {}: {}",
            migrations_path.display(),
            err
        )
    })?;
    let mut client = postgres::Client::connect(db_url, NoTls)
        .map_err(|err| format!("failed to connect to postgres: {err}"))?;
    client
        .batch_execute(&sql)
        .map_err(|err| format!("failed to apply migrations: {err}"))?;
    Ok(())
}

fn validate_table_name(table: &str) -> Result<(), String> {
    if table.is_empty() {
        return Err("table name is empty".to_string());
    }
    let parts: Vec<&str> = table.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return Err(format!("invalid table name: {table}"));
    }
    for part in parts {
        if part.is_empty() {
            return Err(format!("invalid table name: {table}"));
        }
        let mut chars = part.chars();
        let first = match chars.next() {
            Some(ch) => ch,
            None => return Err(format!("invalid table name: {table}")),
        };
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(format!("invalid table name: {table}"));
        }
        if !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(format!("invalid table name: {table}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_table_name, FlatStatement, PostgresPriceStore};
    use chrono::NaiveDate;
    use kabucho_domain::repositories::price_store::{PriceQuery, PriceStore};
    use kabucho_domain::value_objects::fundamentals::{
        CashFlowStatement, FinancialStatement, PeriodType,
    };

    #[test]
    fn validate_table_name_accepts_schema() {
        assert!(validate_table_name("stock_prices").is_ok());
        assert!(validate_table_name("public.stock_prices").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("prices;drop").is_err());
        assert!(validate_table_name("1prices").is_err());
    }

    #[test]
    fn store_rejects_invalid_db_url() {
        let err = PostgresPriceStore::new("not a url".to_string(), 1).expect_err("should fail");
        assert!(err.contains("invalid postgres db url"));
    }

    #[test]
    fn invalid_table_name_fails_before_connecting() {
        let store = build_store("postgres://invalid");
        let err = store
            .load_prices("prices;drop", &PriceQuery::all())
            .expect_err("invalid table name");
        assert!(err.0.contains("invalid table name"));

        let err = store
            .table_exists("drop table")
            .expect_err("invalid table name");
        assert!(err.0.contains("invalid table name"));
    }

    fn build_store(db_url: &str) -> PostgresPriceStore {
        let config = db_url
            .parse::<postgres::Config>()
            .expect("test db url should parse");
        let manager = r2d2_postgres::PostgresConnectionManager::new(config, postgres::NoTls);
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .build_unchecked(manager);
        PostgresPriceStore { pool }
    }

    #[test]
    fn flat_statement_keeps_foreign_columns_null() {
        let statement = FinancialStatement::CashFlow(CashFlowStatement {
            symbol: "7203.T".to_string(),
            as_of: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            period: PeriodType::Annual,
            operating_cash_flow: Some(100.0),
            investing_cash_flow: Some(-40.0),
            financing_cash_flow: None,
            free_cash_flow: Some(60.0),
            end_cash_position: None,
        });

        let flat = FlatStatement::from(&statement);
        assert_eq!(flat.kind, "cash_flow");
        assert_eq!(flat.period, "12M");
        assert_eq!(flat.operating_cash_flow, Some(100.0));
        assert!(flat.total_revenue.is_none());
        assert!(flat.total_assets.is_none());
    }
}
