//! Limit orders and the order-status payload emitted on fills.

use super::ids::OrderRef;
use serde::{Deserialize, Serialize};

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

/// Position effect (futures convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Offset {
    Open,
    Close,
}

/// A resting limit order in the open-order set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub order_ref: OrderRef,
    pub symbol: String,
    pub direction: Direction,
    pub offset: Offset,
    pub price: f64,
    pub volume: u64,
}

/// Order status report sent to the consumer when a simulated fill happens.
///
/// The gateway fields are `None`: a simulated fill has no exchange
/// acknowledgment behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub instrument_id: String,
    pub order_ref: OrderRef,
    pub direction: Direction,
    pub offset: Offset,
    /// Fill price, not the order's original limit.
    pub limit_price: f64,
    pub volume_total_original: u64,
    pub volume_traded: u64,
    pub insert_time: Option<String>,
    pub cancel_time: Option<String>,
    pub front_id: Option<String>,
    pub session_id: Option<String>,
    pub order_status: Option<String>,
}

impl OrderStatusUpdate {
    /// Status for an order that filled in full at `fill_price`.
    pub fn filled(order: &LimitOrder, fill_price: f64) -> Self {
        Self {
            instrument_id: order.symbol.clone(),
            order_ref: order.order_ref,
            direction: order.direction,
            offset: order.offset,
            limit_price: fill_price,
            volume_total_original: order.volume,
            volume_traded: order.volume,
            insert_time: None,
            cancel_time: None,
            front_id: None,
            session_id: None,
            order_status: None,
        }
    }
}
