//! Cache and ledger administration for the CLI.

use anyhow::{Context, Result};
use std::path::Path;
use tickreplay_core::data::{CacheEntryMeta, FsBlobStore, TickCache};
use tickreplay_core::engine::{LedgerSnapshot, TradeLedger};

fn open_cache(cache_dir: &Path) -> Result<TickCache<FsBlobStore>> {
    let store = FsBlobStore::open(cache_dir)
        .with_context(|| format!("failed to open tick cache {}", cache_dir.display()))?;
    Ok(TickCache::new(store))
}

/// Every cached tick range, ordered by storage key.
pub fn cache_entries(cache_dir: &Path) -> Result<Vec<CacheEntryMeta>> {
    open_cache(cache_dir)?
        .entries()
        .context("failed to list cache entries")
}

/// Drop cached ranges, all of them or only one symbol's. Returns how many
/// entries were removed.
pub fn clear_cache(cache_dir: &Path, symbol: Option<&str>) -> Result<usize> {
    let mut cache = open_cache(cache_dir)?;
    let Some(symbol) = symbol else {
        return cache.clear().context("failed to clear cache");
    };

    let mut removed = 0;
    for meta in cache.entries()?.into_iter().filter(|m| m.key.symbol == symbol) {
        if cache.remove(&meta.key)? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// The ledger left by the most recent session, if any.
pub fn latest_ledger(store_dir: &Path) -> Result<Option<LedgerSnapshot>> {
    let store = FsBlobStore::open(store_dir)
        .with_context(|| format!("failed to open ledger store {}", store_dir.display()))?;
    TradeLedger::load_latest(&store).context("failed to read ledger")
}
