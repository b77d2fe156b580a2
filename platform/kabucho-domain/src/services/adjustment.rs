use crate::errors::AdjustError;
use crate::value_objects::corporate_action::{AdjustmentRecord, CorporateAction};
use crate::value_objects::price_bar::PriceBar;
use chrono::NaiveDate;

/// Data-quality findings from one adjustment pass. A ratio of exactly 1 is
/// applied and logged rather than dropped: it usually means the upstream
/// feed published a malformed row.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AdjustmentReport {
    pub actions_considered: usize,
    pub actions_applied: usize,
    pub rows_rescaled: usize,
    pub degenerate_ratios: usize,
}

#[derive(Debug)]
pub struct AdjustmentOutcome {
    pub bars: Vec<PriceBar>,
    pub applied: Vec<AdjustmentRecord>,
    pub report: AdjustmentReport,
}

/// Rescale history for actions effective exactly on `as_of`. Actions with
/// other effective dates are left alone here: past ones were applied by
/// earlier runs against the persisted adjusted table, future ones are not
/// yet in force.
pub fn adjust_as_of(
    bars: Vec<PriceBar>,
    actions: &[CorporateAction],
    as_of: NaiveDate,
) -> Result<AdjustmentOutcome, AdjustError> {
    let todays: Vec<&CorporateAction> = actions
        .iter()
        .filter(|action| action.effective_date == as_of)
        .collect();
    apply_actions(bars, &todays, actions.len())
}

/// Rescale history for every known action, each scoped to its own
/// effective-date boundary. This is the bootstrap path: the raw table has
/// never been adjusted, so the whole action history must be replayed.
pub fn apply_full_history(
    bars: Vec<PriceBar>,
    actions: &[CorporateAction],
) -> Result<AdjustmentOutcome, AdjustError> {
    let all: Vec<&CorporateAction> = actions.iter().collect();
    apply_actions(bars, &all, actions.len())
}

fn apply_actions(
    mut bars: Vec<PriceBar>,
    actions: &[&CorporateAction],
    considered: usize,
) -> Result<AdjustmentOutcome, AdjustError> {
    let mut report = AdjustmentReport {
        actions_considered: considered,
        ..AdjustmentReport::default()
    };
    let mut applied = Vec::with_capacity(actions.len());

    for action in actions {
        if action.ratio <= 0.0 || !action.ratio.is_finite() {
            return Err(AdjustError::NonPositiveRatio {
                symbol: action.symbol.clone(),
                effective_date: action.effective_date,
                ratio: action.ratio,
            });
        }
        if action.ratio == 1.0 {
            report.degenerate_ratios += 1;
        }

        report.rows_rescaled += apply_one(&mut bars, action);
        report.actions_applied += 1;
        applied.push(AdjustmentRecord::from(*action));
    }

    Ok(AdjustmentOutcome {
        bars,
        applied,
        report,
    })
}

/// Multiply every price field and divide volume for all bars of the
/// action's symbol dated on or before the effective date. The rescale
/// covers the full historical range, not just newly arrived rows: a
/// late-discovered action must retroactively correct the entire history.
fn apply_one(bars: &mut [PriceBar], action: &CorporateAction) -> usize {
    let mut rescaled = 0;
    for bar in bars
        .iter_mut()
        .filter(|bar| bar.symbol == action.symbol && bar.date <= action.effective_date)
    {
        bar.open *= action.ratio;
        bar.high *= action.ratio;
        bar.low *= action.ratio;
        bar.close *= action.ratio;
        bar.adj_close *= action.ratio;
        bar.volume /= action.ratio;
        rescaled += 1;
    }
    rescaled
}
