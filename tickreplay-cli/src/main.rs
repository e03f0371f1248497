//! Tick Replay CLI: replay, cache and ledger commands.
//!
//! Commands:
//! - `replay`: run a session from a TOML config file
//! - `cache status`: list cached tick ranges
//! - `cache clear`: drop cached ranges, optionally for one symbol
//! - `ledger show`: print the latest persisted ledger
//! - `ledger export`: write the latest ledger as CSV

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tickreplay_runner::{
    cache_entries, clear_cache, latest_ledger, run_session, save_session_artifacts,
    write_trades_csv, ReplayConfig, SessionOutcome,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tickreplay", about = "Tick replay backtesting engine")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a session from a TOML config file.
    Replay {
        /// Path to the session config.
        #[arg(long)]
        config: PathBuf,

        /// Override the configured symbol.
        #[arg(long)]
        symbol: Option<String>,

        /// Override the start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Override the end date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Write report.json and trades.csv under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Tick cache management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Inspect the persisted trade ledger.
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached ranges with tick counts.
    Status {
        /// Cache directory. Defaults to ./cache.
        #[arg(long, default_value = "cache")]
        cache_dir: PathBuf,
    },
    /// Remove cached ranges.
    Clear {
        /// Only clear this symbol's ranges.
        #[arg(long)]
        symbol: Option<String>,

        /// Cache directory. Defaults to ./cache.
        #[arg(long, default_value = "cache")]
        cache_dir: PathBuf,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Print the latest ledger.
    Show {
        /// Ledger store directory. Defaults to ./ledger.
        #[arg(long, default_value = "ledger")]
        store_dir: PathBuf,
    },
    /// Write the latest ledger as CSV.
    Export {
        /// Ledger store directory. Defaults to ./ledger.
        #[arg(long, default_value = "ledger")]
        store_dir: PathBuf,

        /// Output file.
        #[arg(long, default_value = "trades.csv")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Replay {
            config,
            symbol,
            start,
            end,
            output_dir,
        } => run_replay(&config, symbol, start, end, output_dir),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
            CacheAction::Clear {
                symbol,
                cache_dir,
                confirm,
            } => run_cache_clear(&cache_dir, symbol.as_deref(), confirm),
        },
        Commands::Ledger { action } => match action {
            LedgerAction::Show { store_dir } => run_ledger_show(&store_dir),
            LedgerAction::Export { store_dir, out } => run_ledger_export(&store_dir, &out),
        },
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "tickreplay_core=debug,tickreplay_runner=debug"
    } else {
        "tickreplay_core=info,tickreplay_runner=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_date(flag: &str, value: Option<String>) -> Result<Option<NaiveDate>> {
    value
        .as_deref()
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("--{flag} '{s}' is not a YYYY-MM-DD date"))
        })
        .transpose()
}

fn run_replay(
    config_path: &Path,
    symbol: Option<String>,
    start: Option<String>,
    end: Option<String>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let start = parse_date("start", start)?;
    let end = parse_date("end", end)?;

    let config = ReplayConfig::from_file(config_path)?.with_overrides(symbol, start, end)?;
    let outcome = run_session(&config)?;

    print_summary(&outcome);

    if let Some(output_dir) = output_dir {
        let run_dir = save_session_artifacts(&outcome, &output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }

    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let entries = cache_entries(cache_dir)?;
    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let total_ticks: usize = entries.iter().map(|e| e.tick_count).sum();
    println!("Cache: {}", cache_dir.display());
    println!("Entries: {}", entries.len());
    println!("Total ticks: {total_ticks}");
    println!();
    println!(
        "{:<10} {:<25} {:>10} {:<20}",
        "Symbol", "Date Range", "Ticks", "Cached At"
    );
    println!("{}", "-".repeat(68));
    for e in &entries {
        println!(
            "{:<10} {:<25} {:>10} {:<20}",
            e.key.symbol,
            format!("{} to {}", e.key.start, e.key.end),
            e.tick_count,
            e.cached_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }

    Ok(())
}

fn run_cache_clear(cache_dir: &Path, symbol: Option<&str>, confirm: bool) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let targets: Vec<_> = cache_entries(cache_dir)?
        .into_iter()
        .filter(|e| symbol.map_or(true, |s| e.key.symbol == s))
        .collect();

    if targets.is_empty() {
        println!("Nothing to clear.");
        return Ok(());
    }

    println!("Found {} cached range(s):", targets.len());
    for e in &targets {
        println!(
            "  {} {} to {} ({} ticks)",
            e.key.symbol, e.key.start, e.key.end, e.tick_count
        );
    }

    if !confirm {
        println!();
        println!("Dry run, pass --confirm to actually delete.");
        return Ok(());
    }

    let removed = clear_cache(cache_dir, symbol)?;
    println!("Done. Removed {removed} range(s).");
    Ok(())
}

fn run_ledger_show(store_dir: &Path) -> Result<()> {
    let Some(snapshot) = latest_ledger(store_dir)? else {
        println!("No ledger found in {}", store_dir.display());
        return Ok(());
    };

    println!("Session:  {}", snapshot.session_id);
    println!("Symbol:   {}", snapshot.symbol);
    println!("Flushed:  {}", snapshot.flushed_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Trades:   {}", snapshot.trades.len());
    if snapshot.trades.is_empty() {
        return Ok(());
    }

    println!();
    println!(
        "{:>6} {:>6} {:<5} {:<6} {:>12} {:>7} {:<24}",
        "Trade", "Order", "Side", "Offset", "Price", "Volume", "Time"
    );
    println!("{}", "-".repeat(72));
    for t in &snapshot.trades {
        println!(
            "{:>6} {:>6} {:<5} {:<6} {:>12.3} {:>7} {:<24}",
            t.trade_id.to_string(),
            t.order_ref.to_string(),
            format!("{:?}", t.direction),
            format!("{:?}", t.offset),
            t.price,
            t.volume,
            t.trade_time.format("%Y-%m-%d %H:%M:%S%.3f"),
        );
    }

    Ok(())
}

fn run_ledger_export(store_dir: &Path, out: &Path) -> Result<()> {
    let Some(snapshot) = latest_ledger(store_dir)? else {
        println!("No ledger found in {}", store_dir.display());
        return Ok(());
    };
    write_trades_csv(&snapshot.trades, out)?;
    println!(
        "Exported {} trade(s) from session {} to {}",
        snapshot.trades.len(),
        snapshot.session_id,
        out.display()
    );
    Ok(())
}

fn print_summary(outcome: &SessionOutcome) {
    let report = &outcome.report;
    let load = &outcome.load;
    let strategy = &outcome.strategy;

    println!();
    println!("=== Replay Result ===");
    println!("Session:        {}", report.session_id);
    println!("Symbol:         {}", report.symbol);
    println!("Period:         {} to {}", load.start_date, load.end_date);
    println!(
        "Ticks:          {} ({})",
        report.ticks_processed,
        if load.from_cache {
            "cache".to_string()
        } else {
            format!("source, {} batch(es)", load.batches_issued)
        }
    );
    println!("Trades:         {}", report.trades_filled);
    println!("Open orders:    {}", report.open_orders);
    println!();
    println!("--- Strategy: {} ---", strategy.name);
    println!("Orders sent:    {}", strategy.orders_sent);
    println!("Cancelled:      {}", strategy.orders_cancelled);
    println!("Fills:          {}", strategy.fills);
    println!("Net position:   {}", strategy.net_position);
    if !load.complete {
        println!();
        println!("WARNING: tick load incomplete, replayed partial history");
    }
    if !report.ledger_flushed {
        println!("WARNING: ledger was not persisted");
    }
    println!();
}
