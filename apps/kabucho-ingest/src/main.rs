mod obs;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use kabucho_application::config::{load_config, resolve_db_url, Config};
use kabucho_application::ingest::{run_ingest, IngestDeps, IngestSummary};
use kabucho_infrastructure::feeds::kabu_actions::HtmlActionFeed;
use kabucho_infrastructure::market_data::daily_quotes::HttpPriceProvider;
use kabucho_infrastructure::market_data::fundamentals::{
    HttpFilingProvider, HttpFundamentalsProvider,
};
use kabucho_infrastructure::persistence::postgres_store::{apply_migrations, PostgresPriceStore};
use kabucho_infrastructure::reporting::FilesystemReportWriter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kabucho-ingest")]
#[command(about = "Japanese equity data ingestion into PostgreSQL.", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply SQL migrations to the target database.
    Migrate {
        #[arg(long)]
        db_url: String,
        #[arg(long, default_value = "migrations/0001_create_tables.sql")]
        migrations_path: PathBuf,
    },
    /// Run one ingestion batch: feed refresh, per-symbol fetch, merge,
    /// adjustment, persist.
    Run {
        #[arg(long)]
        config: PathBuf,
        /// Evaluation date override (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "info")]
        log_level: String,
        #[arg(long, default_value = "text")]
        log_format: String,
        #[arg(long)]
        metrics_addr: Option<String>,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Migrate {
            db_url,
            migrations_path,
        } => {
            apply_migrations(&db_url, &migrations_path)?;
            println!("migrations applied: {}", migrations_path.display());
            Ok(())
        }
        Commands::Run {
            config,
            date,
            log_level,
            log_format,
            metrics_addr,
        } => {
            obs::init_tracing(&log_level, &log_format)?;
            obs::init_metrics(metrics_addr.as_deref())?;

            let config = load_config(&config)?;
            let as_of = resolve_as_of(date.as_deref())?;
            let summary = run_batch(&config, as_of)?;
            print_summary(&summary);
            Ok(())
        }
    }
}

fn run_batch(config: &Config, as_of: NaiveDate) -> Result<IngestSummary, String> {
    let db_url = resolve_db_url(config)?;
    let store = PostgresPriceStore::new(db_url, config.db.pool_max_size.unwrap_or(8))?;
    let feed = HtmlActionFeed::new(
        config.feed.split_url.clone(),
        config.feed.consolidation_url.clone(),
        config.feed.symbol_suffix.clone(),
    )?;
    let prices = HttpPriceProvider::new(config.provider.base_url.clone())?;
    let fundamentals = HttpFundamentalsProvider::new(config.provider.base_url.clone())?;
    let filings = HttpFilingProvider::new(config.provider.base_url.clone())?;
    let reports = FilesystemReportWriter::new();

    let deps = IngestDeps {
        store: &store,
        feed: &feed,
        prices: &prices,
        fundamentals: Some(&fundamentals),
        filings: Some(&filings),
        reports: &reports,
    };
    run_ingest(config, as_of, &deps).map_err(|err| err.to_string())
}

fn resolve_as_of(date: Option<&str>) -> Result<NaiveDate, String> {
    match date {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|err| format!("invalid --date {raw} (expected YYYY-MM-DD): {err}")),
        None => Ok(Local::now().date_naive()),
    }
}

fn print_summary(summary: &IngestSummary) {
    println!(
        "ingest complete: mode={} symbols_fetched={} symbols_skipped={} rows_incoming={} \
         rows_merged={} duplicates={} actions_fetched={} actions_applied={} degenerate_ratios={}",
        summary.mode.as_str(),
        summary.symbols_fetched,
        summary.symbols_skipped.len(),
        summary.rows_incoming,
        summary.rows_merged,
        summary.duplicates,
        summary.actions_fetched,
        summary.actions_applied,
        summary.degenerate_ratios,
    );
    println!(
        "fundamentals: statements={} valuations={} filings={}",
        summary.statements_appended, summary.valuations_appended, summary.filings_appended
    );
    for skipped in &summary.symbols_skipped {
        println!(
            "skipped: symbol={} stage={} reason={}",
            skipped.symbol, skipped.stage, skipped.reason
        );
    }
}
