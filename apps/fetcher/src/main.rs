//! barline-fetcher: keeps local OKX candle series complete.
//!
//! Subcommands:
//!   run          Poll, repair and prune in the background (default)
//!   serve        `run` plus the candle read API
//!   repair       Fill the gaps of one series over a range
//!   gaps         Report the missing slots of one series
//!   instruments  List tradable instruments
//!   book         Order book snapshot
//!   trades       Recent public trades
//!   ticker       Latest ticker

mod api;
mod config;
mod error;
mod main_lib;
mod scheduler;

use std::sync::Arc;

use anyhow::Context;
use barline_core::{CandleStore, IngestionService};
use barline_market_data::{CandleProvider, Interval};
use barline_storage_sqlite::open_candle_store;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use config::Config;
use main_lib::{build_client, build_state, init_tracing};

#[derive(Parser)]
#[command(
    name = "barline-fetcher",
    version,
    about = "OKX candle ingestion: realtime polling, gap repair and retention"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion scheduler until Ctrl-C
    Run,
    /// Run the scheduler and serve the candle read API on BARLINE_LISTEN_ADDR
    Serve,
    /// Backfill, then fill the gaps of one series in [start, end)
    Repair(RangeArgs),
    /// Print the missing slots of one series in [start, end)
    Gaps(RangeArgs),
    /// List tradable instruments
    Instruments {
        /// SPOT, SWAP, FUTURES or OPTION
        #[arg(long = "type", default_value = "SPOT")]
        inst_type: String,
    },
    /// Order book snapshot
    Book {
        instrument: String,
        #[arg(long, default_value_t = 20)]
        depth: usize,
    },
    /// Most recent public trades
    Trades {
        instrument: String,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Latest ticker
    Ticker { instrument: String },
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long)]
    instrument: String,
    /// Bar size, e.g. 1m, 15m, 1H, 1D
    #[arg(long)]
    interval: Interval,
    /// Epoch milliseconds, RFC 3339 or YYYY-MM-DD (UTC)
    #[arg(long, value_parser = parse_timestamp)]
    start: i64,
    /// Exclusive end; same formats as --start
    #[arg(long, value_parser = parse_timestamp)]
    end: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let state = build_state(&config)?;
            scheduler::run(state).await
        }
        Commands::Serve => serve(&config).await,
        Commands::Repair(args) => repair(&config, args).await,
        Commands::Gaps(args) => gaps(&config, args),
        Commands::Instruments { inst_type } => {
            let client = build_client(&config)?;
            print_json(&client.list_instruments(&inst_type.to_uppercase()).await?)
        }
        Commands::Book { instrument, depth } => {
            let client = build_client(&config)?;
            print_json(&client.get_order_book(&instrument, depth).await?)
        }
        Commands::Trades { instrument, limit } => {
            let client = build_client(&config)?;
            print_json(&client.get_trades(&instrument, limit).await?)
        }
        Commands::Ticker { instrument } => {
            let client = build_client(&config)?;
            print_json(&client.get_ticker(&instrument).await?)
        }
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let state = build_state(config)?;
    let router = api::app_router(state.clone());
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!("Listening on {}", config.listen_addr);

    // The scheduler owns Ctrl-C handling, so its exit ends the server too
    tokio::select! {
        result = scheduler::run(state) => result,
        result = axum::serve(listener, router) => result.map_err(Into::into),
    }
}

async fn repair(config: &Config, args: RangeArgs) -> anyhow::Result<()> {
    let store = open_candle_store(&config.db_path)?;
    let provider: Arc<dyn CandleProvider> = build_client(config)?;
    let service = IngestionService::new(
        provider,
        store,
        args.interval,
        vec![args.instrument.to_uppercase()],
    )
    .with_policy(config.policy.clone());

    let backfill = service.initialize().await.context("initial backfill failed")?;
    let report = service
        .repair_range(&args.instrument.to_uppercase(), args.start, args.end)
        .await?;

    print_json(&serde_json::json!({
        "backfill": backfill,
        "repair": report,
    }))
}

fn gaps(config: &Config, args: RangeArgs) -> anyhow::Result<()> {
    if args.start >= args.end {
        anyhow::bail!("--start must be before --end");
    }

    let store = open_candle_store(&config.db_path)?;
    let instrument = args.instrument.to_uppercase();
    let gaps = store.find_gaps(&instrument, args.interval, args.start, args.end)?;
    let stored = store.range(&instrument, args.interval, args.start, args.end)?;
    let missing: i64 = gaps.iter().map(|g| g.slot_count(args.interval)).sum();

    print_json(&serde_json::json!({
        "instrument": instrument,
        "interval": args.interval,
        "start": args.start,
        "end": args.end,
        "stored": stored.len(),
        "missing": missing,
        "gaps": gaps,
    }))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return Ok(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc).timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| format!("'{}' is not epoch millis, RFC 3339 or YYYY-MM-DD", raw))
}
