use crate::value_objects::price_bar::PriceBar;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
struct RollingMean {
    window: usize,
    buf: VecDeque<f64>,
    sum: f64,
}

impl RollingMean {
    fn new(window: usize) -> Self {
        Self {
            window,
            buf: VecDeque::new(),
            sum: 0.0,
        }
    }

    fn update(&mut self, value: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }

        self.buf.push_back(value);
        self.sum += value;
        while self.buf.len() > self.window {
            if let Some(front) = self.buf.pop_front() {
                self.sum -= front;
            }
        }

        if self.buf.len() == self.window {
            Some(self.sum / self.window as f64)
        } else {
            None
        }
    }
}

/// Wilder-style RSI over raw close deltas: simple rolling means of gains
/// and losses, not exponential smoothing. A window with zero average loss
/// yields the conventional maximum of 100.
#[derive(Debug, Clone)]
struct RollingRsi {
    window: usize,
    prev_close: Option<f64>,
    deltas: VecDeque<f64>,
    sum_gains: f64,
    sum_losses: f64,
}

impl RollingRsi {
    fn new(window: usize) -> Self {
        Self {
            window,
            prev_close: None,
            deltas: VecDeque::new(),
            sum_gains: 0.0,
            sum_losses: 0.0,
        }
    }

    fn update(&mut self, close: f64) -> Option<f64> {
        let Some(prev) = self.prev_close.replace(close) else {
            return None;
        };

        let delta = close - prev;
        self.deltas.push_back(delta);
        if delta > 0.0 {
            self.sum_gains += delta;
        } else {
            self.sum_losses += -delta;
        }

        while self.deltas.len() > self.window {
            if let Some(front) = self.deltas.pop_front() {
                if front > 0.0 {
                    self.sum_gains -= front;
                } else {
                    self.sum_losses -= -front;
                }
            }
        }

        if self.deltas.len() < self.window {
            return None;
        }

        if self.sum_losses <= 0.0 {
            return Some(100.0);
        }

        let rs = self.sum_gains / self.sum_losses;
        Some(100.0 - (100.0 / (1.0 + rs)))
    }
}

/// A signal per bar: 1 = long, -1 = short-side exit pressure, 0 = flat /
/// undefined. Warm-up bars (windows not yet populated) always emit 0; the
/// engine trades on transitions, so no trade can fire before the first
/// fully-defined value.
pub trait SignalGenerator {
    fn name(&self) -> &str;
    fn signals(&self, bars: &[PriceBar]) -> Vec<i8>;
}

pub struct MovingAverageCross {
    pub short_window: usize,
    pub long_window: usize,
}

impl MovingAverageCross {
    pub fn new(short_window: usize, long_window: usize) -> Self {
        Self {
            short_window,
            long_window,
        }
    }
}

impl SignalGenerator for MovingAverageCross {
    fn name(&self) -> &str {
        "ma_cross"
    }

    fn signals(&self, bars: &[PriceBar]) -> Vec<i8> {
        let mut short = RollingMean::new(self.short_window);
        let mut long = RollingMean::new(self.long_window);
        bars.iter()
            .map(|bar| {
                let short_ma = short.update(bar.close);
                let long_ma = long.update(bar.close);
                match (short_ma, long_ma) {
                    (Some(s), Some(l)) if s > l => 1,
                    _ => 0,
                }
            })
            .collect()
    }
}

pub struct RsiReversal {
    pub period: usize,
    pub lower: f64,
    pub upper: f64,
}

impl RsiReversal {
    pub fn new(period: usize, lower: f64, upper: f64) -> Self {
        Self {
            period,
            lower,
            upper,
        }
    }
}

impl SignalGenerator for RsiReversal {
    fn name(&self) -> &str {
        "rsi_reversal"
    }

    fn signals(&self, bars: &[PriceBar]) -> Vec<i8> {
        let mut rsi = RollingRsi::new(self.period);
        bars.iter()
            .map(|bar| match rsi.update(bar.close) {
                Some(value) if value < self.lower => 1,
                Some(value) if value > self.upper => -1,
                _ => 0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{MovingAverageCross, RollingRsi, RsiReversal, SignalGenerator};
    use crate::value_objects::price_bar::PriceBar;
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

    #[test]
    fn ma_cross_warm_up_emits_zero() {
        let generator = MovingAverageCross::new(2, 4);
        let signals = generator.signals(&bars(&[10.0, 10.0, 10.0, 12.0, 14.0, 16.0, 16.0, 16.0]));
        assert_eq!(signals, vec![0, 0, 0, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn rsi_of_pure_gains_is_100() {
        let mut rsi = RollingRsi::new(3);
        for close in [1.0, 2.0, 3.0, 4.0] {
            rsi.update(close);
        }
        assert_eq!(rsi.update(5.0), Some(100.0));
    }

    #[test]
    fn rsi_of_pure_losses_is_0() {
        let mut rsi = RollingRsi::new(3);
        let mut last = None;
        for close in [10.0, 9.0, 8.0, 7.0, 6.0] {
            last = rsi.update(close);
        }
        assert_eq!(last, Some(0.0));
    }

    #[test]
    fn rsi_signal_fires_once_window_is_populated() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let generator = RsiReversal::new(14, 30.0, 70.0);
        let signals = generator.signals(&bars(&closes));
        // Deltas exist from index 1; the 14-delta window fills at index 14.
        assert!(signals[..14].iter().all(|s| *s == 0));
        assert!(signals[14..].iter().all(|s| *s == 1));
    }
}
