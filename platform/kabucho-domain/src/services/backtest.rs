use crate::errors::BacktestError;
use crate::services::signals::{MovingAverageCross, SignalGenerator};
use crate::value_objects::price_bar::PriceBar;
use crate::value_objects::trade::{BacktestResult, TradeAction, TradeLogEntry};

/// Single-position portfolio: fully invested or fully in cash, nothing in
/// between. No leverage, no transaction costs.
#[derive(Debug, Clone, Copy)]
struct Position {
    cash: f64,
    shares: f64,
}

/// Run a signal strategy over a date-ascending price series. A trade fires
/// only where the signal differs from the previous bar's signal: a rising
/// transition buys with all cash, a falling transition sells the whole
/// position, both at that bar's close.
pub fn run(
    bars: &[PriceBar],
    generator: &dyn SignalGenerator,
    initial_cash: f64,
) -> Result<BacktestResult, BacktestError> {
    if bars.is_empty() {
        return Err(BacktestError::InsufficientData);
    }
    if initial_cash <= 0.0 || !initial_cash.is_finite() {
        return Err(BacktestError::NonPositiveCash(initial_cash));
    }

    let signals = generator.signals(bars);
    debug_assert_eq!(signals.len(), bars.len());

    let mut position = Position {
        cash: initial_cash,
        shares: 0.0,
    };
    let mut trades = Vec::new();
    let mut prev_signal: i8 = 0;

    for (bar, signal) in bars.iter().zip(signals.iter().copied()) {
        if signal > prev_signal && position.cash > 0.0 {
            position.shares = position.cash / bar.close;
            position.cash = 0.0;
            trades.push(TradeLogEntry {
                date: bar.date,
                action: TradeAction::Buy,
                price: bar.close,
            });
        } else if signal < prev_signal && position.shares > 0.0 {
            position.cash = position.shares * bar.close;
            position.shares = 0.0;
            trades.push(TradeLogEntry {
                date: bar.date,
                action: TradeAction::Sell,
                price: bar.close,
            });
        }
        prev_signal = signal;
    }

    let last_close = bars[bars.len() - 1].close;
    let final_value = if position.shares > 0.0 {
        position.cash + position.shares * last_close
    } else {
        position.cash
    };

    Ok(BacktestResult {
        strategy: generator.name().to_string(),
        initial_cash,
        final_value,
        profit: final_value - initial_cash,
        trades,
    })
}

/// Validate moving-average windows before constructing the generator.
/// Equal or inverted windows never cross and a zero window never warms up.
pub fn ma_cross(short: usize, long: usize) -> Result<MovingAverageCross, BacktestError> {
    if short == 0 || long == 0 || short >= long {
        return Err(BacktestError::InvalidWindows { short, long });
    }
    Ok(MovingAverageCross::new(short, long))
}

#[cfg(test)]
mod tests {
    use super::{ma_cross, run};
    use crate::errors::BacktestError;
    use crate::services::signals::SignalGenerator;
    use crate::value_objects::price_bar::PriceBar;
    use crate::value_objects::trade::TradeAction;
    use chrono::NaiveDate;

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(idx, close)| PriceBar {
                symbol: "7203.T".to_string(),
                date: start + chrono::Days::new(idx as u64),
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                adj_close: *close,
                volume: 100.0,
            })
            .collect()
    }

    struct Scripted(Vec<i8>);

    impl SignalGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn signals(&self, _bars: &[PriceBar]) -> Vec<i8> {
            self.0.clone()
        }
    }

    #[test]
    fn empty_series_is_insufficient_data() {
        let generator = Scripted(Vec::new());
        let err = run(&[], &generator, 1000.0).unwrap_err();
        assert!(matches!(err, BacktestError::InsufficientData));
    }

    #[test]
    fn non_positive_cash_rejected() {
        let generator = Scripted(vec![0]);
        let err = run(&bars(&[10.0]), &generator, 0.0).unwrap_err();
        assert!(matches!(err, BacktestError::NonPositiveCash(_)));
    }

    #[test]
    fn buy_then_sell_round_trip() {
        let generator = Scripted(vec![0, 1, 1, 0]);
        let result = run(&bars(&[10.0, 20.0, 30.0, 40.0]), &generator, 1000.0).unwrap();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].action, TradeAction::Buy);
        assert!((result.trades[0].price - 20.0).abs() < 1e-9);
        assert_eq!(result.trades[1].action, TradeAction::Sell);
        // 1000 / 20 = 50 shares sold at 40.
        assert!((result.final_value - 2000.0).abs() < 1e-9);
        assert!((result.profit - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn open_position_marked_at_last_close() {
        let generator = Scripted(vec![0, 1, 1]);
        let result = run(&bars(&[10.0, 20.0, 25.0]), &generator, 1000.0).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert!((result.final_value - 1250.0).abs() < 1e-9);
    }

    #[test]
    fn sell_transition_without_position_does_nothing() {
        // Signal drops to -1 before any buy; cash must survive intact.
        let generator = Scripted(vec![0, -1, -1, 0]);
        let result = run(&bars(&[10.0, 9.0, 8.0, 7.0]), &generator, 1000.0).unwrap();

        assert!(result.trades.is_empty());
        assert!((result.final_value - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn jump_from_short_to_long_buys_once() {
        let generator = Scripted(vec![0, -1, 1, 1]);
        let result = run(&bars(&[10.0, 9.0, 10.0, 12.0]), &generator, 1000.0).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].action, TradeAction::Buy);
        assert!((result.trades[0].price - 10.0).abs() < 1e-9);
    }

    #[test]
    fn ma_cross_rejects_degenerate_windows() {
        assert!(ma_cross(0, 4).is_err());
        assert!(ma_cross(4, 4).is_err());
        assert!(ma_cross(5, 4).is_err());
        assert!(ma_cross(2, 4).is_ok());
    }
}
