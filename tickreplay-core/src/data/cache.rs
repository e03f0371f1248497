//! Tick cache keyed by exact (symbol, start, end) ranges.
//!
//! Key scheme: `ticks/v1/{SYMBOL}/{start}_{end}` with ISO dates. Ranges are
//! never merged: a request that differs from a cached range in any bound is a
//! miss, even if it overlaps. Entries are written once and never overwritten.
//!
//! Each entry carries its tick count and a BLAKE3 hash of the tick payload.
//! An entry that fails either check on load is evicted and reported as a miss.

use super::store::{from_blob, to_blob, BlobStore, StoreError, WriteOutcome};
use crate::domain::TickRecord;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Prefix shared by every tick cache key. Bump the version when the entry
/// layout changes.
pub const CACHE_PREFIX: &str = "ticks/v1/";

const DATE_FMT: &str = "%Y-%m-%d";

/// Exact cache key for a tick range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CacheKey {
    pub fn new(symbol: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.to_string(),
            start,
            end,
        }
    }

    /// Stable string form used as the store key.
    pub fn storage_key(&self) -> String {
        format!(
            "{CACHE_PREFIX}{}/{}_{}",
            self.symbol,
            self.start.format(DATE_FMT),
            self.end.format(DATE_FMT)
        )
    }

    /// Inverse of [`CacheKey::storage_key`].
    pub fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(CACHE_PREFIX)?;
        let (symbol, dates) = rest.rsplit_once('/')?;
        let (start, end) = dates.split_once('_')?;
        Some(Self {
            symbol: symbol.to_string(),
            start: NaiveDate::parse_from_str(start, DATE_FMT).ok()?,
            end: NaiveDate::parse_from_str(end, DATE_FMT).ok()?,
        })
    }
}

/// Summary of a cache entry, without the ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryMeta {
    pub key: CacheKey,
    pub tick_count: usize,
    pub data_hash: String,
    pub cached_at: NaiveDateTime,
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    meta: CacheEntryMeta,
    ticks: Vec<TickRecord>,
}

/// The tick cache, layered on any blob store.
pub struct TickCache<B: BlobStore> {
    store: B,
}

impl<B: BlobStore> TickCache<B> {
    pub fn new(store: B) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    pub fn into_store(self) -> B {
        self.store
    }

    /// Load the ticks cached under `key`, or `None` on a miss.
    pub fn get(&mut self, key: &CacheKey) -> Result<Option<Vec<TickRecord>>, StoreError> {
        let storage_key = key.storage_key();
        if !self.store.contains(&storage_key)? {
            return Ok(None);
        }
        let Some(blob) = self.store.get(&storage_key)? else {
            return Ok(None);
        };

        let entry: CacheEntry = match from_blob(&blob) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %storage_key, error = %e, "evicting unreadable cache entry");
                self.store.remove(&storage_key)?;
                return Ok(None);
            }
        };

        if entry.meta.tick_count != entry.ticks.len()
            || entry.meta.data_hash != hash_ticks(&entry.ticks)?
        {
            warn!(key = %storage_key, "evicting cache entry that failed integrity check");
            self.store.remove(&storage_key)?;
            return Ok(None);
        }

        debug!(key = %storage_key, ticks = entry.ticks.len(), "cache hit");
        Ok(Some(entry.ticks))
    }

    /// Persist ticks under `key` unless an entry already exists.
    pub fn put_if_absent(
        &mut self,
        key: &CacheKey,
        ticks: &[TickRecord],
    ) -> Result<WriteOutcome, StoreError> {
        let storage_key = key.storage_key();
        if self.store.contains(&storage_key)? {
            return Ok(WriteOutcome::Skipped);
        }
        let entry = CacheEntry {
            meta: CacheEntryMeta {
                key: key.clone(),
                tick_count: ticks.len(),
                data_hash: hash_ticks(ticks)?,
                cached_at: chrono::Local::now().naive_local(),
            },
            ticks: ticks.to_vec(),
        };
        self.store.put_if_absent(&storage_key, &to_blob(&entry)?)
    }

    /// Metadata for every cached range, ordered by storage key.
    pub fn entries(&self) -> Result<Vec<CacheEntryMeta>, StoreError> {
        let mut metas = Vec::new();
        for storage_key in self.store.keys(CACHE_PREFIX)? {
            let Some(blob) = self.store.get(&storage_key)? else {
                continue;
            };
            match from_blob::<CacheEntry>(&blob) {
                Ok(entry) => metas.push(entry.meta),
                Err(e) => warn!(key = %storage_key, error = %e, "skipping unreadable cache entry"),
            }
        }
        Ok(metas)
    }

    pub fn remove(&mut self, key: &CacheKey) -> Result<bool, StoreError> {
        self.store.remove(&key.storage_key())
    }

    /// Remove every cached range. Returns how many entries were dropped.
    pub fn clear(&mut self) -> Result<usize, StoreError> {
        let keys = self.store.keys(CACHE_PREFIX)?;
        let mut removed = 0;
        for key in keys {
            if self.store.remove(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn hash_ticks(ticks: &[TickRecord]) -> Result<String, StoreError> {
    Ok(blake3::hash(&to_blob(ticks)?).to_hex().to_string())
}
