use kabucho_domain::repositories::reports::{ReportWriter, SkippedSymbol};
use kabucho_domain::value_objects::trade::{BacktestResult, TradeAction};
use serde_json::json;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemReportWriter;

impl FilesystemReportWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportWriter for FilesystemReportWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        fs::create_dir_all(path)
            .map_err(|err| format!("failed to create dir {}: {}", path.display(), err))
    }

    fn write_trades_csv(&self, path: &Path, result: &BacktestResult) -> Result<(), String> {
        let mut wtr = csv::Writer::from_path(path)
            .map_err(|err| format!("failed to create trades csv {}: {}", path.display(), err))?;
        wtr.write_record(["date", "action", "price"])
            .map_err(|err| format!("failed to write trades csv header: {err}"))?;
        for trade in &result.trades {
            let action = match trade.action {
                TradeAction::Buy => "BUY",
                TradeAction::Sell => "SELL",
            };
            wtr.write_record([
                trade.date.to_string(),
                action.to_string(),
                trade.price.to_string(),
            ])
            .map_err(|err| format!("failed to write trades row: {err}"))?;
        }
        wtr.flush()
            .map_err(|err| format!("failed to flush trades csv: {err}"))
    }

    fn write_summary_json(&self, path: &Path, result: &BacktestResult) -> Result<(), String> {
        let summary = json!({
            "strategy": result.strategy,
            "initial_cash": result.initial_cash,
            "final_value": result.final_value,
            "profit": result.profit,
            "trades": result.trades.len(),
        });
        let contents = serde_json::to_string_pretty(&summary)
            .map_err(|err| format!("failed to serialize summary: {err}"))?;
        fs::write(path, contents)
            .map_err(|err| format!("failed to write summary {}: {}", path.display(), err))
    }

    fn write_skip_log(&self, path: &Path, skipped: &[SkippedSymbol]) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent)?;
        }
        let mut wtr = csv::Writer::from_path(path)
            .map_err(|err| format!("failed to create skip log {}: {}", path.display(), err))?;
        wtr.write_record(["symbol", "stage", "reason"])
            .map_err(|err| format!("failed to write skip log header: {err}"))?;
        for entry in skipped {
            wtr.write_record([&entry.symbol, &entry.stage, &entry.reason])
                .map_err(|err| format!("failed to write skip log row: {err}"))?;
        }
        wtr.flush()
            .map_err(|err| format!("failed to flush skip log: {err}"))
    }
}
