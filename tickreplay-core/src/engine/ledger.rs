//! Append-only record of every fill in a session.
//!
//! The ledger is persisted at session end as a single snapshot blob under a
//! fixed key. Each flush overwrites the previous one, so the store only ever
//! holds the most recent session's trades.

use crate::data::store::{from_blob, to_blob, BlobStore, StoreError};
use crate::domain::{SessionId, Trade};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Store key of the latest ledger snapshot.
pub const LEDGER_KEY: &str = "ledger/latest";

/// What gets written on flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub session_id: SessionId,
    pub symbol: String,
    /// Local wall-clock time, the same clock as session ids and cache entries.
    pub flushed_at: NaiveDateTime,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// Trades in fill order.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Persist the full trade sequence, replacing any earlier snapshot.
    pub fn flush<B: BlobStore + ?Sized>(
        &self,
        store: &mut B,
        session_id: &SessionId,
        symbol: &str,
    ) -> Result<(), StoreError> {
        self.flush_at(store, session_id, symbol, Local::now().naive_local())
    }

    /// `flush` with an explicit timestamp.
    pub fn flush_at<B: BlobStore + ?Sized>(
        &self,
        store: &mut B,
        session_id: &SessionId,
        symbol: &str,
        flushed_at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let snapshot = LedgerSnapshot {
            session_id: session_id.clone(),
            symbol: symbol.to_string(),
            flushed_at,
            trades: self.trades.clone(),
        };
        store.put(LEDGER_KEY, &to_blob(&snapshot)?)
    }

    /// Read back the most recent snapshot, if any session has flushed.
    pub fn load_latest<B: BlobStore + ?Sized>(store: &B) -> Result<Option<LedgerSnapshot>, StoreError> {
        match store.get(LEDGER_KEY)? {
            Some(bytes) => Ok(Some(from_blob(&bytes)?)),
            None => Ok(None),
        }
    }
}
