use crate::domain::ids::{OrderRef, TradeId};
use crate::domain::order::{Direction, Offset};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Fill record. Created once per filled order, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub order_ref: OrderRef,
    pub instrument_id: String,
    pub direction: Direction,
    pub offset: Offset,
    pub price: f64,
    pub volume: u64,
    /// Timestamp of the tick that produced the fill.
    pub trade_time: NaiveDateTime,
}
