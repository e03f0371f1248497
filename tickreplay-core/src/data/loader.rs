//! Tick acquisition: cache first, batched remote fetch on a miss.
//!
//! Resolution policy for `load(symbol, start, end)`:
//! 1. Exact-range cache hit → return the cached ticks, no remote call
//! 2. Miss → fetch `[start, end]` from the source in date batches, paging
//!    each batch through the driver, appending to one buffer
//! 3. Complete fetch → persist under the exact key (skip if already present)
//!
//! Nothing here is fatal. Connection, configuration and query failures are
//! logged and the caller gets whatever was gathered before the failure.
//! Partial fetches are never cached.

use super::batch::{date_batches, DEFAULT_BATCH_DAYS, DEFAULT_PAGE_SIZE};
use super::cache::{CacheKey, TickCache};
use super::source::{QueryRange, SourceError, TickSource};
use super::store::{BlobStore, WriteOutcome};
use crate::domain::TickRecord;
use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

/// Fallback lookback when the source cannot answer a trading-day query.
const FALLBACK_LOOKBACK_DAYS: i64 = 3;

/// Options controlling how ticks are fetched on a cache miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Calendar days per remote batch.
    pub batch_days: u32,
    /// Rows per driver page.
    pub page_size: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_days: DEFAULT_BATCH_DAYS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Where a loaded sequence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOrigin {
    Cache,
    Remote,
}

/// Result of a load, including provenance.
#[derive(Debug, Clone)]
pub struct LoadedTicks {
    pub key: CacheKey,
    /// Ticks in non-decreasing update-time order.
    pub ticks: Vec<TickRecord>,
    pub origin: TickOrigin,
    /// Remote batch queries issued (0 on a cache hit).
    pub batches_issued: usize,
    /// False when a failure cut the remote fetch short.
    pub complete: bool,
}

/// Cache layer over a tick source.
pub struct TickLoader<S: TickSource, B: BlobStore> {
    source: S,
    cache: TickCache<B>,
    options: LoadOptions,
}

impl<S: TickSource, B: BlobStore> TickLoader<S, B> {
    pub fn new(source: S, cache: TickCache<B>, options: LoadOptions) -> Self {
        Self {
            source,
            cache,
            options,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn cache(&self) -> &TickCache<B> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TickCache<B> {
        &mut self.cache
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    /// Connect the source if it isn't already. Failures are logged and leave
    /// the source disconnected; the next load tries again.
    pub fn ensure_connected(&mut self) -> bool {
        if self.source.is_connected() {
            return true;
        }
        match self.source.connect() {
            Ok(()) => {
                info!(source = self.source.name(), "tick source connected");
                true
            }
            Err(SourceError::Config(msg)) => {
                warn!(source = self.source.name(), error = %msg, "tick source configuration invalid, staying disconnected");
                false
            }
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "tick source connection failed");
                false
            }
        }
    }

    /// Resolve `(symbol, start, end)` to an ordered tick sequence.
    ///
    /// A missing `end` means today.
    pub fn load(&mut self, symbol: &str, start: NaiveDate, end: Option<NaiveDate>) -> LoadedTicks {
        let end = end.unwrap_or_else(|| chrono::Local::now().date_naive());
        let key = CacheKey::new(symbol, start, end);

        if let Err(e) = QueryRange::from_bounds(Some(start), Some(end)) {
            warn!(symbol, %start, %end, error = %e, "invalid date range, nothing loaded");
            return LoadedTicks {
                key,
                ticks: Vec::new(),
                origin: TickOrigin::Remote,
                batches_issued: 0,
                complete: false,
            };
        }

        match self.cache.get(&key) {
            Ok(Some(ticks)) => {
                info!(symbol, %start, %end, ticks = ticks.len(), "ticks loaded from cache");
                return LoadedTicks {
                    key,
                    ticks,
                    origin: TickOrigin::Cache,
                    batches_issued: 0,
                    complete: true,
                };
            }
            Ok(None) => debug!(symbol, %start, %end, "cache miss"),
            Err(e) => warn!(symbol, error = %e, "cache read failed, fetching from source"),
        }

        let (mut ticks, batches_issued, complete) = self.fetch_remote(symbol, start, end);
        ensure_time_order(symbol, &mut ticks);
        info!(symbol, %start, %end, ticks = ticks.len(), batches = batches_issued, complete, "ticks loaded from source");

        if complete {
            match self.cache.put_if_absent(&key, &ticks) {
                Ok(WriteOutcome::Written) => debug!(key = %key.storage_key(), "ticks cached"),
                Ok(WriteOutcome::Skipped) => {}
                Err(e) => warn!(key = %key.storage_key(), error = %e, "failed to cache ticks"),
            }
        }

        LoadedTicks {
            key,
            ticks,
            origin: TickOrigin::Remote,
            batches_issued,
            complete,
        }
    }

    /// The `n`-th trading day before `date`, for warming a strategy up on
    /// earlier history. Falls back to three calendar days earlier when the
    /// source can't answer.
    pub fn trading_day_before(&mut self, symbol: &str, date: NaiveDate, n: u32) -> NaiveDate {
        let fallback = date - Duration::days(FALLBACK_LOOKBACK_DAYS);
        if !self.ensure_connected() {
            return fallback;
        }
        match self.source.trading_day_before(symbol, date, n) {
            Ok(Some(day)) => day,
            Ok(None) => {
                warn!(symbol, %date, n, "no trading day found before date, using fallback");
                fallback
            }
            Err(e) => {
                warn!(symbol, %date, error = %e, "trading day lookup failed, using fallback");
                fallback
            }
        }
    }

    /// Fetch `[start, end]` batch by batch. Returns the ticks gathered, the
    /// number of batch queries issued, and whether every batch succeeded.
    fn fetch_remote(
        &mut self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> (Vec<TickRecord>, usize, bool) {
        let mut ticks = Vec::new();
        if !self.ensure_connected() {
            return (ticks, 0, false);
        }

        let batches = date_batches(start, end, self.options.batch_days);
        let total = batches.len();
        let mut issued = 0;

        for (i, (batch_start, batch_end)) in batches.into_iter().enumerate() {
            issued += 1;
            let range = QueryRange::Between {
                start: batch_start,
                end: batch_end,
            };
            match self.fetch_batch(symbol, range, &mut ticks) {
                Ok(rows) => {
                    debug!(symbol, batch = i + 1, of = total, %batch_start, %batch_end, rows, "batch fetched");
                }
                Err(e) => {
                    warn!(symbol, batch = i + 1, %batch_start, %batch_end, error = %e, "batch fetch failed, keeping partial result");
                    return (ticks, issued, false);
                }
            }
        }

        (ticks, issued, true)
    }

    /// Page one query through the driver into `buf`. Returns the rows added.
    fn fetch_batch(
        &mut self,
        symbol: &str,
        range: QueryRange,
        buf: &mut Vec<TickRecord>,
    ) -> Result<usize, SourceError> {
        let page_size = self.options.page_size.max(1);
        let mut cursor = self.source.query(symbol, range)?;
        if let Some(hint) = cursor.row_count_hint() {
            buf.reserve(hint);
        }

        let mut fetched = 0;
        loop {
            let page = cursor.fetch_many(page_size)?;
            if page.is_empty() {
                break;
            }
            fetched += page.len();
            buf.extend(page.into_iter().map(TickRecord::from));
            debug!(symbol, fetched, "page fetched");
        }
        Ok(fetched)
    }
}

/// Restore non-decreasing update-time order if a source broke it. The sort is
/// stable, so rows sharing a timestamp keep their source order.
fn ensure_time_order(symbol: &str, ticks: &mut [TickRecord]) {
    let ordered = ticks
        .windows(2)
        .all(|w| w[0].update_time <= w[1].update_time);
    if !ordered {
        warn!(symbol, "source returned ticks out of time order, re-sorting");
        ticks.sort_by_key(|t| t.update_time);
    }
}
