use crate::value_objects::price_bar::PriceBar;
use chrono::NaiveDate;

/// Which reconciliation path a run takes. Selected once per run from the
/// existence of the adjusted table; the coordinator itself is stateless
/// across runs, persistence is the only state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// No adjusted table yet: baseline is the full raw history and the
    /// entire corporate-action history must be replayed.
    Bootstrap,
    /// Adjusted table exists: it becomes the baseline and only actions
    /// effective on the run's evaluation date are applied.
    Incremental,
}

impl MergeMode {
    pub fn from_table_exists(adjusted_exists: bool) -> Self {
        if adjusted_exists {
            MergeMode::Incremental
        } else {
            MergeMode::Bootstrap
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Bootstrap => "bootstrap",
            MergeMode::Incremental => "incremental",
        }
    }
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub bars: Vec<PriceBar>,
    /// Keys seen more than once before dedupe; a data-quality finding,
    /// not an error.
    pub duplicates: usize,
    pub first_duplicate: Option<(String, NaiveDate)>,
}

/// Union `existing` and `incoming`, dedupe on (symbol, date) and sort by
/// symbol then date. The existing copy wins on conflict: in incremental
/// mode the baseline rows already reflect applied adjustments and a raw
/// refetch must not clobber them.
///
/// An empty `incoming` (upstream fetch failure) returns the baseline
/// unchanged so a good table is never overwritten by an empty set.
pub fn merge_price_history(existing: Vec<PriceBar>, incoming: Vec<PriceBar>) -> MergeOutcome {
    if incoming.is_empty() {
        return MergeOutcome {
            bars: existing,
            duplicates: 0,
            first_duplicate: None,
        };
    }

    let mut merged = existing;
    merged.extend(incoming);
    // Stable sort keeps insertion order inside each key, so the adjacent
    // dedupe below retains the existing row.
    merged.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.date.cmp(&b.date)));

    let mut duplicates = 0;
    let mut first_duplicate = None;
    let mut bars: Vec<PriceBar> = Vec::with_capacity(merged.len());
    for bar in merged {
        if let Some(last) = bars.last() {
            if last.symbol == bar.symbol && last.date == bar.date {
                duplicates += 1;
                if first_duplicate.is_none() {
                    first_duplicate = Some((bar.symbol.clone(), bar.date));
                }
                continue;
            }
        }
        bars.push(bar);
    }

    MergeOutcome {
        bars,
        duplicates,
        first_duplicate,
    }
}

#[cfg(test)]
mod tests {
    use super::{merge_price_history, MergeMode};
    use crate::value_objects::price_bar::PriceBar;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn bar(symbol: &str, date: &str, close: f64) -> PriceBar {
        PriceBar {
            symbol: symbol.to_string(),
            date: d(date),
            open: close,
            high: close,
            low: close,
            close,
            adj_close: close,
            volume: 100.0,
        }
    }

    #[test]
    fn mode_follows_table_existence() {
        assert_eq!(MergeMode::from_table_exists(false), MergeMode::Bootstrap);
        assert_eq!(MergeMode::from_table_exists(true), MergeMode::Incremental);
    }

    #[test]
    fn dedupes_on_symbol_and_date_keeping_existing() {
        let existing = vec![bar("7203.T", "2026-03-30", 200.0)];
        let incoming = vec![
            bar("7203.T", "2026-03-30", 1000.0),
            bar("7203.T", "2026-03-31", 1010.0),
        ];

        let outcome = merge_price_history(existing, incoming);
        assert_eq!(outcome.bars.len(), 2);
        assert_eq!(outcome.duplicates, 1);
        // Baseline copy (already adjusted) survives.
        assert!((outcome.bars[0].close - 200.0).abs() < 1e-9);
        assert_eq!(
            outcome.first_duplicate,
            Some(("7203.T".to_string(), d("2026-03-30")))
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let incoming = vec![
            bar("7203.T", "2026-03-30", 1000.0),
            bar("6758.T", "2026-03-30", 2000.0),
        ];

        let first = merge_price_history(Vec::new(), incoming.clone());
        let second = merge_price_history(first.bars.clone(), incoming);
        assert_eq!(second.bars, first.bars);
        assert_eq!(second.duplicates, 2);
    }

    #[test]
    fn empty_incoming_returns_baseline_unchanged() {
        let existing = vec![bar("7203.T", "2026-03-30", 200.0)];
        let outcome = merge_price_history(existing.clone(), Vec::new());
        assert_eq!(outcome.bars, existing);
        assert_eq!(outcome.duplicates, 0);
    }

    #[test]
    fn output_sorted_by_symbol_then_date() {
        let incoming = vec![
            bar("7203.T", "2026-03-31", 1.0),
            bar("6758.T", "2026-03-30", 1.0),
            bar("7203.T", "2026-03-30", 1.0),
        ];
        let outcome = merge_price_history(Vec::new(), incoming);
        let keys: Vec<(String, NaiveDate)> = outcome
            .bars
            .iter()
            .map(|bar| (bar.symbol.clone(), bar.date))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("6758.T".to_string(), d("2026-03-30")),
                ("7203.T".to_string(), d("2026-03-30")),
                ("7203.T".to_string(), d("2026-03-31")),
            ]
        );
    }
}
