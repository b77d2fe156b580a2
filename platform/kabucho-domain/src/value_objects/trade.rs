use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
}

/// One executed backtest trade. Displayed, not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub date: NaiveDate,
    pub action: TradeAction,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub strategy: String,
    pub initial_cash: f64,
    pub final_value: f64,
    pub profit: f64,
    pub trades: Vec<TradeLogEntry>,
}
