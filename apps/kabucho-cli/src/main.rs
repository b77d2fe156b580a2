mod commands;
mod infra;
mod obs;

use clap::{Parser, Subcommand};
use commands::Command;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kabucho")]
#[command(about = "Kabucho CLI", version, arg_required_else_help = true)]
#[command(
    after_help = "Examples:\n  kabucho backtest --config configs/sample.toml --out runs/\n  kabucho backtest --config configs/sample.toml --symbol 6758.T --strategy rsi\n  kabucho actions --config configs/sample.toml\n"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
    #[arg(long, global = true)]
    metrics_addr: Option<String>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run a backtest against the adjusted price table.
    Backtest {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Refresh the corporate-action feed and print the parsed notices.
    Actions {
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = obs::init_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = obs::init_metrics(cli.metrics_addr.as_deref()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let command = match cli.command {
        CliCommand::Backtest {
            config,
            symbol,
            strategy,
            start,
            end,
            out,
        } => Command::Backtest {
            config,
            symbol,
            strategy,
            start,
            end,
            out,
        },
        CliCommand::Actions { config } => Command::Actions { config },
    };

    if let Err(err) = commands::run(command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
