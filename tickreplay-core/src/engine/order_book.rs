//! Open-order set and the gateway handed to strategy callbacks.
//!
//! Orders are keyed by a monotonically increasing `OrderRef` in a `BTreeMap`,
//! so iteration is insertion order and match evaluation is deterministic.
//! References are never reissued within a book's lifetime, even after the
//! order they named has filled or been cancelled.

use crate::domain::{Direction, IdGen, InstrumentInfo, LimitOrder, Offset, OrderRef};
use std::collections::BTreeMap;
use tracing::debug;

/// Order entry surface exposed to consumers during replay.
///
/// Mirrors a live trading gateway closely enough that strategy code can run
/// unchanged against the simulator.
pub trait OrderGateway {
    /// Place a limit order. Returns its reference.
    fn send_order(
        &mut self,
        symbol: &str,
        price: f64,
        volume: u64,
        direction: Direction,
        offset: Offset,
    ) -> OrderRef;

    /// Cancel an open order. Unknown or already-resolved references are a
    /// no-op; the return value says whether anything was removed.
    fn cancel_order(&mut self, order_ref: OrderRef) -> bool;

    /// Instrument metadata. Every instrument trades on the backtesting venue.
    fn select_instrument(&self, symbol: &str) -> InstrumentInfo {
        InstrumentInfo::backtesting(symbol)
    }

    /// Market-data subscription. Replay already feeds every tick, so this does nothing.
    fn subscribe(&mut self, _symbol: &str, _exchange: &str) {}
}

/// The open-order set.
#[derive(Debug, Default)]
pub struct OrderBook {
    open: BTreeMap<OrderRef, LimitOrder>,
    refs: IdGen,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, order_ref: OrderRef) -> Option<&LimitOrder> {
        self.open.get(&order_ref)
    }

    pub fn contains(&self, order_ref: OrderRef) -> bool {
        self.open.contains_key(&order_ref)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Open orders in ascending reference order.
    pub fn iter(&self) -> impl Iterator<Item = &LimitOrder> {
        self.open.values()
    }

    /// Take an order out of the open set.
    pub fn remove(&mut self, order_ref: OrderRef) -> Option<LimitOrder> {
        self.open.remove(&order_ref)
    }

    /// Highest reference issued so far (0 if none).
    pub fn last_issued(&self) -> u64 {
        self.refs.last()
    }
}

impl OrderGateway for OrderBook {
    fn send_order(
        &mut self,
        symbol: &str,
        price: f64,
        volume: u64,
        direction: Direction,
        offset: Offset,
    ) -> OrderRef {
        let order_ref = self.refs.next_order_ref();
        debug!(%order_ref, symbol, price, volume, ?direction, ?offset, "order accepted");
        self.open.insert(
            order_ref,
            LimitOrder {
                order_ref,
                symbol: symbol.to_string(),
                direction,
                offset,
                price,
                volume,
            },
        );
        order_ref
    }

    fn cancel_order(&mut self, order_ref: OrderRef) -> bool {
        let removed = self.open.remove(&order_ref).is_some();
        debug!(%order_ref, removed, "cancel requested");
        removed
    }
}
