use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    pub db: DbConfig,
    pub feed: FeedConfig,
    pub provider: ProviderConfig,
    pub retry: RetryConfig,
    pub paths: PathsConfig,
    pub backtest: Option<BacktestConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    /// Universe to fetch, market-suffixed (e.g. "7203.T").
    pub symbols: Vec<String>,
    /// How far back each per-symbol quote fetch reaches.
    pub lookback_days: u32,
}

#[derive(Debug, Deserialize)]
pub struct DbConfig {
    /// Falls back to env KABUCHO_DB_URL when absent or empty.
    pub url: Option<String>,
    pub pool_max_size: Option<u32>,
    pub raw_table: String,
    pub adjusted_table: String,
    pub adjustments_table: String,
    pub actions_table: String,
    pub statements_table: String,
    pub valuations_table: String,
    pub filings_table: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    pub split_url: String,
    pub consolidation_url: String,
    /// Exchange suffix appended to raw feed codes.
    pub symbol_suffix: String,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Pause between per-symbol calls, provider rate-limit etiquette.
    pub sleep_ms: u64,
    pub fundamentals: Option<bool>,
    pub filings: Option<bool>,
    pub filing_lookback_days: Option<u32>,
}

impl ProviderConfig {
    pub fn fundamentals_enabled(&self) -> bool {
        self.fundamentals.unwrap_or(true)
    }

    pub fn filings_enabled(&self) -> bool {
        self.filings.unwrap_or(true)
    }
}

#[derive(Debug, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    pub out_dir: String,
    pub skip_log: String,
}

#[derive(Debug, Deserialize)]
pub struct BacktestConfig {
    /// "ma_cross" or "rsi".
    pub strategy: String,
    pub symbol: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub initial_cash: f64,
    pub short_window: Option<u64>,
    pub long_window: Option<u64>,
    pub rsi_period: Option<u64>,
    pub rsi_lower: Option<f64>,
    pub rsi_upper: Option<f64>,
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))
}

pub fn resolve_db_url(config: &Config) -> Result<String, String> {
    match config.db.url.as_deref() {
        Some(url) if !url.trim().is_empty() => Ok(url.to_string()),
        _ => std::env::var("KABUCHO_DB_URL")
            .map_err(|_| "missing db.url in config and env KABUCHO_DB_URL is not set".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    fn parse_config(toml_str: &str) -> Config {
        toml::from_str(toml_str).expect("config should parse")
    }

    #[test]
    fn parse_minimal_config() {
        let toml_str = r#"
[run]
symbols = ["7203.T", "6758.T"]
lookback_days = 5

[db]
raw_table = "stock_prices"
adjusted_table = "adjusted_stock_prices"
adjustments_table = "applied_adjustments"
actions_table = "corporate_actions"
statements_table = "financial_statements"
valuations_table = "valuation_metrics"
filings_table = "filings"

[feed]
split_url = "https://example.com/bunkatu.html"
consolidation_url = "https://example.com/gensi.html"
symbol_suffix = ".T"

[provider]
base_url = "https://quotes.example.com"
sleep_ms = 350

[retry]
max_attempts = 3
base_delay_ms = 5000

[paths]
out_dir = "runs/"
skip_log = "runs/skipped_symbols.csv"

[backtest]
strategy = "ma_cross"
symbol = "7203.T"
initial_cash = 1000000.0
short_window = 5
long_window = 20
"#;

        let config = parse_config(toml_str);
        assert_eq!(config.run.symbols, vec!["7203.T", "6758.T"]);
        assert_eq!(config.db.adjusted_table, "adjusted_stock_prices");
        assert!(config.provider.fundamentals_enabled());
        let backtest = config.backtest.expect("backtest section");
        assert_eq!(backtest.strategy, "ma_cross");
        assert_eq!(backtest.long_window, Some(20));
    }

    #[test]
    fn backtest_section_is_optional() {
        let toml_str = r#"
[run]
symbols = ["7203.T"]
lookback_days = 5

[db]
raw_table = "stock_prices"
adjusted_table = "adjusted_stock_prices"
adjustments_table = "applied_adjustments"
actions_table = "corporate_actions"
statements_table = "financial_statements"
valuations_table = "valuation_metrics"
filings_table = "filings"

[feed]
split_url = "https://example.com/bunkatu.html"
consolidation_url = "https://example.com/gensi.html"
symbol_suffix = ".T"

[provider]
base_url = "https://quotes.example.com"
sleep_ms = 350
fundamentals = false
filings = false

[retry]
max_attempts = 3
base_delay_ms = 5000

[paths]
out_dir = "runs/"
skip_log = "runs/skipped_symbols.csv"
"#;

        let config = parse_config(toml_str);
        assert!(config.backtest.is_none());
        assert!(!config.provider.fundamentals_enabled());
        assert!(!config.provider.filings_enabled());
    }
}
