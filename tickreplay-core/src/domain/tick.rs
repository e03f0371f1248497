//! TickRecord: one level-1 market snapshot.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Immutable level-1 snapshot for one instrument at one instant.
///
/// A quote price of `0.0` (or a non-finite value) means that side of the book
/// was empty when the tick was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub instrument_id: String,
    pub update_time: NaiveDateTime,
    pub last_price: f64,
    pub volume: u64,
    pub open_interest: f64,
    pub bid_price1: f64,
    pub bid_volume1: u64,
    pub ask_price1: f64,
    pub ask_volume1: u64,
}

impl TickRecord {
    pub fn has_ask(&self) -> bool {
        !is_empty_quote(self.ask_price1)
    }

    pub fn has_bid(&self) -> bool {
        !is_empty_quote(self.bid_price1)
    }
}

/// True for the empty-quote sentinel: zero or not a finite number.
pub fn is_empty_quote(price: f64) -> bool {
    price == 0.0 || !price.is_finite()
}
