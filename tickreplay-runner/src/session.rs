//! Session orchestration: config → loader → engine → ledger.
//!
//! One call runs one session:
//! 1. Open the tick cache and build the configured source
//! 2. Optionally move the start back by a trading-day lookback
//! 3. Load ticks (cache first, batched fetch on a miss)
//! 4. Replay them through the configured strategy
//! 5. Flush the ledger to the ledger store

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tickreplay_core::data::{FsBlobStore, TickCache, TickLoader, TickOrigin, TickSource};
use tickreplay_core::domain::Trade;
use tickreplay_core::engine::{BacktestingEngine, SessionReport};
use tracing::{info, warn};

use crate::config::ReplayConfig;
use crate::source::build_source;
use crate::strategy::{build_strategy, StrategySummary};

/// How the replayed ticks were obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub from_cache: bool,
    pub batches_issued: usize,
    pub complete: bool,
    pub tick_count: usize,
}

/// Everything a finished session reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOutcome {
    pub report: SessionReport,
    pub load: LoadSummary,
    pub strategy: StrategySummary,
    /// Every fill in ledger order, kept even when the ledger flush failed.
    pub trades: Vec<Trade>,
}

/// Run a session against the source described in `config`.
pub fn run_session(config: &ReplayConfig) -> Result<SessionOutcome> {
    run_session_with_source(config, build_source(&config.source))
}

/// Run a session against an explicit source.
pub fn run_session_with_source<S: TickSource>(config: &ReplayConfig, source: S) -> Result<SessionOutcome> {
    let session = &config.session;

    let cache_store = FsBlobStore::open(&config.data.cache_dir).with_context(|| {
        format!("failed to open tick cache {}", config.data.cache_dir.display())
    })?;
    let mut loader = TickLoader::new(source, TickCache::new(cache_store), config.load_options());

    let start_date = match session.lookback_days {
        Some(n) => {
            let start = loader.trading_day_before(&session.symbol, session.start_date, n);
            info!(
                symbol = %session.symbol,
                requested = %session.start_date,
                effective = %start,
                lookback_days = n,
                "start moved back for warm-up"
            );
            start
        }
        None => session.start_date,
    };

    let loaded = loader.load(&session.symbol, start_date, session.end_date);
    if !loaded.complete {
        warn!(
            symbol = %session.symbol,
            ticks = loaded.ticks.len(),
            "tick load incomplete, replaying partial history"
        );
    }
    let load = LoadSummary {
        start_date,
        end_date: loaded.key.end,
        from_cache: loaded.origin == TickOrigin::Cache,
        batches_issued: loaded.batches_issued,
        complete: loaded.complete,
        tick_count: loaded.ticks.len(),
    };

    let ledger_store = FsBlobStore::open(&config.ledger.store_dir).with_context(|| {
        format!("failed to open ledger store {}", config.ledger.store_dir.display())
    })?;
    let mut session_config = config.session_config();
    session_config.start_date = start_date;

    let mut engine = BacktestingEngine::new(session_config, ledger_store);
    engine.load_ticks(loaded.ticks);
    engine.attach_consumer(build_strategy(session.strategy, &session.symbol));

    let report = engine
        .start_backtesting()
        .context("replay failed to start")?;
    let strategy = engine
        .consumer()
        .map(|s| s.summary())
        .unwrap_or_default();
    let trades = engine.ledger().trades().to_vec();

    Ok(SessionOutcome {
        report,
        load,
        strategy,
        trades,
    })
}
