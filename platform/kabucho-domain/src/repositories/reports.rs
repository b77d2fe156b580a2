use crate::value_objects::trade::BacktestResult;
use std::path::Path;

/// One symbol the batch gave up on after exhausting retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub stage: String,
    pub reason: String,
}

/// Filesystem artifacts the pipeline and the backtest use-case emit.
pub trait ReportWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String>;

    fn write_trades_csv(&self, path: &Path, result: &BacktestResult) -> Result<(), String>;

    fn write_summary_json(&self, path: &Path, result: &BacktestResult) -> Result<(), String>;

    /// Side file of per-symbol failures; the batch continues without them.
    fn write_skip_log(&self, path: &Path, skipped: &[SkippedSymbol]) -> Result<(), String>;
}
