//! Tick Replay Runner: config, tick sources, demo strategies, session orchestration.
//!
//! This crate builds on `tickreplay-core` to provide:
//! - TOML session config with validation and CLI overrides
//! - SQLite and CSV tick sources
//! - Passive and momentum demo strategies
//! - One-call session runs with cache-first tick loading
//! - Cache administration, ledger CSV export and JSON session reports

pub mod admin;
pub mod config;
pub mod export;
pub mod session;
pub mod source;
pub mod strategy;

pub use admin::{cache_entries, clear_cache, latest_ledger};
pub use config::{ConfigError, ReplayConfig, StrategyKind};
pub use export::{
    export_report_json, export_trades_csv, save_session_artifacts, write_trades_csv,
};
pub use session::{run_session, run_session_with_source, LoadSummary, SessionOutcome};
pub use source::{build_source, CsvTickSource, SqliteTickSource};
pub use strategy::{build_strategy, MomentumParams, ReplayStrategy, StrategySummary};
