use crate::config::{BacktestConfig, Config};
use chrono::NaiveDate;
use kabucho_domain::errors::{BacktestError, StoreError};
use kabucho_domain::repositories::price_store::{PriceQuery, PriceStore};
use kabucho_domain::repositories::reports::ReportWriter;
use kabucho_domain::services::backtest::{self, ma_cross};
use kabucho_domain::services::signals::{RsiReversal, SignalGenerator};
use kabucho_domain::value_objects::trade::BacktestResult;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info_span;

#[derive(Debug, Error)]
pub enum BacktestRunError {
    #[error("invalid backtest configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Engine(#[from] BacktestError),
    #[error("failed to write report artifact: {0}")]
    Reports(String),
}

/// Load the adjusted series for the configured symbol and window, run the
/// configured strategy, and drop trades.csv + summary.json into the out
/// dir. The adjusted table is the only sane input here: raw prices jump
/// at every split boundary and would fabricate crossovers.
pub fn run_backtest(
    config: &Config,
    store: &dyn PriceStore,
    reports: &dyn ReportWriter,
    out: Option<PathBuf>,
) -> Result<BacktestResult, BacktestRunError> {
    let settings = config
        .backtest
        .as_ref()
        .ok_or_else(|| BacktestRunError::Config("missing [backtest] section".to_string()))?;

    let _span = info_span!(
        "run_backtest",
        symbol = %settings.symbol,
        strategy = %settings.strategy
    )
    .entered();

    let query = PriceQuery {
        symbol: Some(settings.symbol.clone()),
        start: parse_date_opt(settings.start.as_deref())?,
        end: parse_date_opt(settings.end.as_deref())?,
    };
    let mut bars = store.load_prices(&config.db.adjusted_table, &query)?;
    bars.sort_by(|a, b| a.date.cmp(&b.date));

    let generator = resolve_generator(settings)?;
    let result = backtest::run(&bars, generator.as_ref(), settings.initial_cash)?;

    let out_dir = out.unwrap_or_else(|| PathBuf::from(&config.paths.out_dir));
    reports
        .ensure_dir(&out_dir)
        .map_err(BacktestRunError::Reports)?;
    reports
        .write_trades_csv(&out_dir.join("trades.csv"), &result)
        .map_err(BacktestRunError::Reports)?;
    reports
        .write_summary_json(&out_dir.join("summary.json"), &result)
        .map_err(BacktestRunError::Reports)?;

    tracing::info!(
        trades = result.trades.len(),
        final_value = result.final_value,
        profit = result.profit,
        "backtest complete"
    );
    Ok(result)
}

fn resolve_generator(
    backtest: &BacktestConfig,
) -> Result<Box<dyn SignalGenerator>, BacktestRunError> {
    match backtest.strategy.trim().to_lowercase().as_str() {
        "ma_cross" | "sma" => {
            let short = backtest.short_window.unwrap_or(5) as usize;
            let long = backtest.long_window.unwrap_or(20) as usize;
            Ok(Box::new(ma_cross(short, long)?))
        }
        "rsi" => {
            let period = backtest.rsi_period.unwrap_or(14) as usize;
            let lower = backtest.rsi_lower.unwrap_or(30.0);
            let upper = backtest.rsi_upper.unwrap_or(70.0);
            if period == 0 {
                return Err(BacktestRunError::Config(
                    "backtest.rsi_period must be >= 1".to_string(),
                ));
            }
            if !(0.0..=100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) || lower >= upper
            {
                return Err(BacktestRunError::Config(format!(
                    "backtest.rsi thresholds must satisfy 0 <= lower < upper <= 100: got {lower} / {upper}"
                )));
            }
            Ok(Box::new(RsiReversal::new(period, lower, upper)))
        }
        other => Err(BacktestRunError::Config(format!(
            "backtest.strategy must be: ma_cross | rsi (got {other})"
        ))),
    }
}

fn parse_date_opt(value: Option<&str>) -> Result<Option<NaiveDate>, BacktestRunError> {
    match value {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|err| {
                BacktestRunError::Config(format!("invalid date {raw} (expected YYYY-MM-DD): {err}"))
            }),
    }
}
