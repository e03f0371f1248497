//! tickreplay core: domain types, tick acquisition and caching, the limit-order
//! matching simulator, the replay loop and the trade ledger.
//!
//! - Domain types (ticks, orders, trades, ids)
//! - Cache-first tick loader over a pluggable `TickSource`
//! - `BlobStore` persistence for cached ticks and the trade ledger
//! - Tick-by-tick replay with level-1 matching

pub mod data;
pub mod domain;
pub mod engine;
