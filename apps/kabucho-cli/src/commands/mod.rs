use crate::infra;
use kabucho_application::backtesting::run_backtest;
use kabucho_application::config::load_config;
use kabucho_domain::value_objects::trade::TradeAction;
use std::path::PathBuf;

pub enum Command {
    Backtest {
        config: PathBuf,
        symbol: Option<String>,
        strategy: Option<String>,
        start: Option<String>,
        end: Option<String>,
        out: Option<PathBuf>,
    },
    Actions {
        config: PathBuf,
    },
}

pub fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Backtest {
            config,
            symbol,
            strategy,
            start,
            end,
            out,
        } => backtest(config, symbol, strategy, start, end, out),
        Command::Actions { config } => actions(config),
    }
}

fn backtest(
    config_path: PathBuf,
    symbol: Option<String>,
    strategy: Option<String>,
    start: Option<String>,
    end: Option<String>,
    out: Option<PathBuf>,
) -> Result<(), String> {
    let mut config = load_config(&config_path)?;
    let backtest = config
        .backtest
        .as_mut()
        .ok_or_else(|| "config has no [backtest] section".to_string())?;
    if let Some(symbol) = symbol {
        backtest.symbol = symbol;
    }
    if let Some(strategy) = strategy {
        backtest.strategy = strategy;
    }
    if start.is_some() {
        backtest.start = start;
    }
    if end.is_some() {
        backtest.end = end;
    }

    let deps = infra::build_backtest_deps(&config)?;
    let result = run_backtest(&config, deps.store.as_ref(), deps.reports.as_ref(), out)
        .map_err(|err| err.to_string())?;

    println!(
        "backtest complete: strategy={} trades={} final_value={:.2} profit={:.2}",
        result.strategy,
        result.trades.len(),
        result.final_value,
        result.profit
    );
    for trade in &result.trades {
        let action = match trade.action {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
        };
        println!("{} {} @ {:.2}", trade.date, action, trade.price);
    }
    Ok(())
}

fn actions(config_path: PathBuf) -> Result<(), String> {
    let config = load_config(&config_path)?;
    let feed = infra::build_action_feed(&config)?;
    let mut actions = feed.refresh().map_err(|err| err.to_string())?;
    actions.sort_by(|a, b| {
        a.effective_date
            .cmp(&b.effective_date)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    println!("{} corporate action notices", actions.len());
    for action in &actions {
        println!(
            "{} {} ratio={} ({})",
            action.effective_date, action.symbol, action.ratio, action.company_name
        );
    }
    Ok(())
}
