use crate::config::Config;
use crate::retry::{call_with_retry, RetryPolicy};
use chrono::{Days, NaiveDate};
use kabucho_domain::errors::{AdjustError, FeedError, StoreError};
use kabucho_domain::repositories::action_feed::CorporateActionFeed;
use kabucho_domain::repositories::market_data::{
    FilingProvider, FundamentalsProvider, PriceProvider,
};
use kabucho_domain::repositories::price_store::{PriceQuery, PriceStore};
use kabucho_domain::repositories::reports::{ReportWriter, SkippedSymbol};
use kabucho_domain::services::adjustment::{adjust_as_of, apply_full_history, AdjustmentOutcome};
use kabucho_domain::services::merge::{merge_price_history, MergeMode};
use kabucho_domain::value_objects::corporate_action::CorporateAction;
use kabucho_domain::value_objects::filing::Filing;
use kabucho_domain::value_objects::fundamentals::{FinancialStatement, ValuationMetrics};
use kabucho_domain::value_objects::price_bar::PriceBar;
use std::collections::HashSet;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info_span;

pub struct IngestDeps<'a> {
    pub store: &'a dyn PriceStore,
    pub feed: &'a dyn CorporateActionFeed,
    pub prices: &'a dyn PriceProvider,
    pub fundamentals: Option<&'a dyn FundamentalsProvider>,
    pub filings: Option<&'a dyn FilingProvider>,
    pub reports: &'a dyn ReportWriter,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Adjust(#[from] AdjustError),
    #[error("failed to write report artifact: {0}")]
    Reports(String),
}

#[derive(Debug)]
pub struct IngestSummary {
    pub mode: MergeMode,
    pub symbols_fetched: usize,
    pub symbols_skipped: Vec<SkippedSymbol>,
    pub rows_incoming: usize,
    pub rows_merged: usize,
    pub duplicates: usize,
    pub actions_fetched: usize,
    pub actions_applied: usize,
    pub degenerate_ratios: usize,
    pub statements_appended: u64,
    pub valuations_appended: u64,
    pub filings_appended: u64,
}

/// One scheduled batch run: refresh the corporate-action registry, fetch
/// per-symbol data, reconcile with the persisted baseline, rescale for
/// actions effective on `as_of`, then persist. Everything is computed in
/// memory before the first table write, so a failure partway through the
/// fetch or adjustment phases leaves the store untouched.
pub fn run_ingest(
    config: &Config,
    as_of: NaiveDate,
    deps: &IngestDeps,
) -> Result<IngestSummary, IngestError> {
    let _span = info_span!("run_ingest", as_of = %as_of).entered();
    let run_start = Instant::now();

    let policy = RetryPolicy::new(
        config.retry.max_attempts,
        Duration::from_millis(config.retry.base_delay_ms),
    );

    // A broken feed aborts the run: adjusting against a stale or empty
    // registry would corrupt the adjusted table for every later run.
    let fetched_actions = call_with_retry(&policy, "action_feed", || deps.feed.refresh())?;
    tracing::info!(actions = fetched_actions.len(), "corporate action feed refreshed");

    let mut skipped: Vec<SkippedSymbol> = Vec::new();
    let mut incoming: Vec<PriceBar> = Vec::new();
    let mut statements: Vec<FinancialStatement> = Vec::new();
    let mut valuations: Vec<ValuationMetrics> = Vec::new();
    let mut filings: Vec<Filing> = Vec::new();

    let start = as_of - Days::new(u64::from(config.run.lookback_days));
    let filing_since = as_of - Days::new(u64::from(config.provider.filing_lookback_days.unwrap_or(10)));
    let pause = Duration::from_millis(config.provider.sleep_ms);

    for symbol in &config.run.symbols {
        match call_with_retry(&policy, "price_provider", || {
            deps.prices.fetch_daily(symbol, start, as_of)
        }) {
            Ok(bars) => incoming.extend(bars),
            Err(err) => {
                metrics::counter!("kabucho.ingest.symbols_skipped_total", "stage" => "prices")
                    .increment(1);
                tracing::warn!(symbol = %symbol, error = %err, "price fetch skipped");
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    stage: "prices".to_string(),
                    reason: err.to_string(),
                });
                continue;
            }
        }

        if let Some(fundamentals) = deps.fundamentals.filter(|_| config.provider.fundamentals_enabled()) {
            match call_with_retry(&policy, "fundamentals_provider", || {
                fundamentals.fetch_statements(symbol)
            }) {
                Ok(rows) => statements.extend(rows),
                Err(err) => {
                    metrics::counter!("kabucho.ingest.symbols_skipped_total", "stage" => "fundamentals")
                        .increment(1);
                    tracing::warn!(symbol = %symbol, error = %err, "fundamentals fetch skipped");
                    skipped.push(SkippedSymbol {
                        symbol: symbol.clone(),
                        stage: "fundamentals".to_string(),
                        reason: err.to_string(),
                    });
                }
            }
            match call_with_retry(&policy, "fundamentals_provider", || {
                fundamentals.fetch_valuation(symbol)
            }) {
                Ok(Some(row)) => valuations.push(row),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(symbol = %symbol, error = %err, "valuation fetch skipped");
                    skipped.push(SkippedSymbol {
                        symbol: symbol.clone(),
                        stage: "valuation".to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if let Some(filing_provider) = deps.filings.filter(|_| config.provider.filings_enabled()) {
            match call_with_retry(&policy, "filing_provider", || {
                filing_provider.fetch_filings(symbol, filing_since)
            }) {
                Ok(rows) => filings.extend(rows),
                Err(err) => {
                    tracing::warn!(symbol = %symbol, error = %err, "filing fetch skipped");
                    skipped.push(SkippedSymbol {
                        symbol: symbol.clone(),
                        stage: "filings".to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }

    let symbols_fetched = config.run.symbols.len()
        - skipped
            .iter()
            .filter(|s| s.stage == "prices")
            .count();

    // Two-state machine: the persisted adjusted table is the only state.
    let mode = MergeMode::from_table_exists(deps.store.table_exists(&config.db.adjusted_table)?);
    let baseline_table = match mode {
        MergeMode::Bootstrap => &config.db.raw_table,
        MergeMode::Incremental => &config.db.adjusted_table,
    };
    let baseline = if deps.store.table_exists(baseline_table)? {
        deps.store.load_prices(baseline_table, &PriceQuery::all())?
    } else {
        Vec::new()
    };

    let rows_incoming = incoming.len();
    let merged = merge_price_history(baseline, incoming.clone());
    if merged.duplicates > 0 {
        metrics::counter!("kabucho.ingest.duplicate_keys_total").increment(merged.duplicates as u64);
        tracing::warn!(
            duplicates = merged.duplicates,
            first = ?merged.first_duplicate,
            "duplicate (symbol, date) keys dropped during merge"
        );
    }

    let outcome = adjust_for_mode(config, deps.store, mode, &fetched_actions, merged.bars.clone(), as_of)?;
    if outcome.report.degenerate_ratios > 0 {
        tracing::warn!(
            count = outcome.report.degenerate_ratios,
            "corporate actions with ratio == 1 applied; check the upstream feed"
        );
    }

    // Write phase. Nothing below recomputes; each write is a whole-table
    // replace or a key-deduped append.
    deps.store
        .append_actions(&config.db.actions_table, &fetched_actions)?;

    match mode {
        MergeMode::Bootstrap => {
            deps.store.replace_prices(&config.db.raw_table, &merged.bars)?;
        }
        MergeMode::Incremental => {
            deps.store.append_prices(&config.db.raw_table, &incoming)?;
        }
    }

    if outcome.bars.is_empty() {
        // An empty fetch against an empty baseline; writing the adjusted
        // table now would flip later runs to the incremental path with no
        // history behind it.
        tracing::warn!("no price rows to persist; adjusted table left untouched");
    } else {
        deps.store
            .replace_prices(&config.db.adjusted_table, &outcome.bars)?;
    }
    deps.store
        .append_adjustments(&config.db.adjustments_table, &outcome.applied)?;

    let statements_appended = deps
        .store
        .append_statements(&config.db.statements_table, &statements)?;
    let valuations_appended = deps
        .store
        .append_valuations(&config.db.valuations_table, &valuations)?;
    let filings_appended = deps.store.append_filings(&config.db.filings_table, &filings)?;

    if !skipped.is_empty() {
        deps.reports
            .write_skip_log(Path::new(&config.paths.skip_log), &skipped)
            .map_err(IngestError::Reports)?;
    }

    metrics::histogram!("kabucho.ingest.run_ms")
        .record(run_start.elapsed().as_secs_f64() * 1000.0);
    metrics::gauge!("kabucho.ingest.rows_merged").set(outcome.bars.len() as f64);
    metrics::counter!("kabucho.ingest.actions_applied_total")
        .increment(outcome.applied.len() as u64);

    let summary = IngestSummary {
        mode,
        symbols_fetched,
        symbols_skipped: skipped,
        rows_incoming,
        rows_merged: outcome.bars.len(),
        duplicates: merged.duplicates,
        actions_fetched: fetched_actions.len(),
        actions_applied: outcome.applied.len(),
        degenerate_ratios: outcome.report.degenerate_ratios,
        statements_appended,
        valuations_appended,
        filings_appended,
    };
    tracing::info!(
        mode = mode.as_str(),
        symbols_fetched = summary.symbols_fetched,
        symbols_skipped = summary.symbols_skipped.len(),
        rows_merged = summary.rows_merged,
        actions_applied = summary.actions_applied,
        "ingest run complete"
    );
    Ok(summary)
}

/// Bootstrap replays the entire known action history over the merged raw
/// series; incremental trusts the already-adjusted baseline and applies
/// only actions effective on the evaluation date.
fn adjust_for_mode(
    config: &Config,
    store: &dyn PriceStore,
    mode: MergeMode,
    fetched_actions: &[CorporateAction],
    bars: Vec<PriceBar>,
    as_of: NaiveDate,
) -> Result<AdjustmentOutcome, IngestError> {
    match mode {
        MergeMode::Bootstrap => {
            let stored = if store.table_exists(&config.db.actions_table)? {
                store.load_actions(&config.db.actions_table)?
            } else {
                Vec::new()
            };
            let history = dedupe_actions(stored, fetched_actions.to_vec());
            Ok(apply_full_history(bars, &history)?)
        }
        MergeMode::Incremental => {
            // The baseline already reflects everything in the audit log;
            // re-running on an effective date must not rescale it twice.
            let applied: HashSet<(String, NaiveDate)> =
                if store.table_exists(&config.db.adjustments_table)? {
                    store
                        .load_adjustments(&config.db.adjustments_table)?
                        .into_iter()
                        .map(|record| (record.symbol, record.effective_date))
                        .collect()
                } else {
                    HashSet::new()
                };
            let pending: Vec<CorporateAction> = fetched_actions
                .iter()
                .filter(|action| {
                    !applied.contains(&(action.symbol.clone(), action.effective_date))
                })
                .cloned()
                .collect();
            Ok(adjust_as_of(bars, &pending, as_of)?)
        }
    }
}

fn dedupe_actions(
    stored: Vec<CorporateAction>,
    fetched: Vec<CorporateAction>,
) -> Vec<CorporateAction> {
    let mut seen: HashSet<(String, NaiveDate)> = HashSet::new();
    let mut history = Vec::with_capacity(stored.len() + fetched.len());
    for action in stored.into_iter().chain(fetched) {
        if seen.insert((action.symbol.clone(), action.effective_date)) {
            history.push(action);
        }
    }
    history
}

#[cfg(test)]
mod tests {
    use super::dedupe_actions;
    use chrono::NaiveDate;
    use kabucho_domain::value_objects::corporate_action::CorporateAction;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn dedupe_actions_keeps_stored_copy() {
        let stored = vec![CorporateAction::split("7203.T", "Toyota", 5.0, d("2026-03-31"))];
        let fetched = vec![
            CorporateAction::split("7203.T", "Toyota Motor", 5.0, d("2026-03-31")),
            CorporateAction::consolidation("9501.T", "TEPCO", 10.0, d("2026-04-01")),
        ];

        let history = dedupe_actions(stored, fetched);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].company_name, "Toyota");
    }
}
