//! Limit-order matching against level-1 quotes.
//!
//! Each open order is checked against the current tick only:
//! - buy fills when `limit >= effective ask`, at the effective ask
//! - sell fills when `limit <= effective bid`, at the effective bid
//!
//! An empty quote side is synthesized from the last price one `min_diff` away.
//! Fills are immediate and all-or-nothing; there is no depth, latency or
//! slippage model.

use super::order_book::OrderBook;
use crate::domain::{
    is_empty_quote, Direction, IdGen, LimitOrder, OrderRef, OrderStatusUpdate, TickRecord, Trade,
};
use std::collections::BTreeSet;

/// Absolute tolerance for limit-vs-quote comparisons, so that a synthesized
/// `2999.0 + 0.2` matches a `2999.2` limit.
pub const PRICE_TOLERANCE: f64 = 1e-9;

/// A filled order: the trade record and the status report that goes with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub trade: Trade,
    pub status: OrderStatusUpdate,
}

/// Everything one evaluation pass produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    /// In evaluation order (ascending order reference).
    pub fills: Vec<Fill>,
    pub removed: BTreeSet<OrderRef>,
}

impl MatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.fills.is_empty()
    }
}

/// Matching simulator. Owns the session's trade-id sequence.
#[derive(Debug, Clone)]
pub struct MatchingSimulator {
    min_diff: f64,
    trade_ids: IdGen,
}

impl MatchingSimulator {
    pub fn new(min_diff: f64) -> Self {
        Self {
            min_diff,
            trade_ids: IdGen::default(),
        }
    }

    pub fn min_diff(&self) -> f64 {
        self.min_diff
    }

    pub fn set_min_diff(&mut self, min_diff: f64) {
        self.min_diff = min_diff;
    }

    /// Best ask, or `last + min_diff` when the ask side is empty.
    pub fn effective_ask(&self, tick: &TickRecord) -> f64 {
        if is_empty_quote(tick.ask_price1) {
            tick.last_price + self.min_diff
        } else {
            tick.ask_price1
        }
    }

    /// Best bid, or `last - min_diff` when the bid side is empty.
    pub fn effective_bid(&self, tick: &TickRecord) -> f64 {
        if is_empty_quote(tick.bid_price1) {
            tick.last_price - self.min_diff
        } else {
            tick.bid_price1
        }
    }

    /// Price the order would fill at on this tick, if it fills.
    pub fn fill_price(&self, order: &LimitOrder, tick: &TickRecord) -> Option<f64> {
        match order.direction {
            Direction::Buy => {
                let ask = self.effective_ask(tick);
                (order.price >= ask - PRICE_TOLERANCE).then_some(ask)
            }
            Direction::Sell => {
                let bid = self.effective_bid(tick);
                (order.price <= bid + PRICE_TOLERANCE).then_some(bid)
            }
        }
    }

    /// Evaluate every open order against `tick`.
    ///
    /// Filled orders are taken out of `book` before this returns, so a cancel
    /// issued from an event callback for one of them is a harmless no-op.
    pub fn evaluate(&mut self, book: &mut OrderBook, tick: &TickRecord) -> MatchOutcome {
        let matched: Vec<(OrderRef, f64)> = book
            .iter()
            .filter_map(|order| self.fill_price(order, tick).map(|p| (order.order_ref, p)))
            .collect();

        let mut outcome = MatchOutcome::default();
        for (order_ref, price) in matched {
            let Some(order) = book.remove(order_ref) else {
                continue;
            };
            let trade = Trade {
                trade_id: self.trade_ids.next_trade_id(),
                order_ref,
                instrument_id: order.symbol.clone(),
                direction: order.direction,
                offset: order.offset,
                price,
                volume: order.volume,
                trade_time: tick.update_time,
            };
            let status = OrderStatusUpdate::filled(&order, price);
            outcome.removed.insert(order_ref);
            outcome.fills.push(Fill { trade, status });
        }
        outcome
    }

    /// Trades issued so far in this session.
    pub fn trades_issued(&self) -> u64 {
        self.trade_ids.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Offset, TradeId};
    use crate::engine::order_book::OrderGateway;
    use chrono::NaiveDate;

    fn tick(last: f64, bid: f64, ask: f64) -> TickRecord {
        TickRecord {
            instrument_id: "IF1706".into(),
            update_time: NaiveDate::from_ymd_opt(2017, 6, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            last_price: last,
            volume: 10,
            open_interest: 4500.0,
            bid_price1: bid,
            bid_volume1: 1,
            ask_price1: ask,
            ask_volume1: 1,
        }
    }

    #[test]
    fn buy_at_ask_fills_at_ask() {
        let mut sim = MatchingSimulator::new(0.2);
        let mut book = OrderBook::new();
        let r = book.send_order("IF1706", 3000.0, 1, Direction::Buy, Offset::Open);

        let out = sim.evaluate(&mut book, &tick(2999.0, 2998.0, 3000.0));
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].trade.price, 3000.0);
        assert_eq!(out.fills[0].trade.order_ref, r);
        assert_eq!(out.fills[0].trade.trade_id, TradeId(1));
        assert!(out.removed.contains(&r));
        assert!(book.is_empty());
    }

    #[test]
    fn buy_above_ask_gets_price_improvement() {
        let mut sim = MatchingSimulator::new(0.2);
        let mut book = OrderBook::new();
        book.send_order("IF1706", 3005.0, 2, Direction::Buy, Offset::Open);

        let out = sim.evaluate(&mut book, &tick(2999.0, 2998.0, 3000.0));
        assert_eq!(out.fills[0].trade.price, 3000.0);
        assert_eq!(out.fills[0].trade.volume, 2);
        assert_eq!(out.fills[0].status.limit_price, 3000.0);
    }

    #[test]
    fn buy_below_ask_rests() {
        let mut sim = MatchingSimulator::new(0.2);
        let mut book = OrderBook::new();
        book.send_order("IF1706", 2999.8, 1, Direction::Buy, Offset::Open);

        let out = sim.evaluate(&mut book, &tick(2999.0, 2998.0, 3000.0));
        assert!(out.is_empty());
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn empty_ask_is_synthesized_from_last() {
        let mut sim = MatchingSimulator::new(0.2);
        let t = tick(2999.0, 2998.0, 0.0);
        assert!((sim.effective_ask(&t) - 2999.2).abs() < 1e-9);

        let mut book = OrderBook::new();
        let fills_ref = book.send_order("IF1706", 2999.2, 1, Direction::Buy, Offset::Open);
        let rests_ref = book.send_order("IF1706", 2999.0, 1, Direction::Buy, Offset::Open);

        let out = sim.evaluate(&mut book, &t);
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].trade.order_ref, fills_ref);
        assert!((out.fills[0].trade.price - 2999.2).abs() < 1e-9);
        assert!(book.contains(rests_ref));
    }

    #[test]
    fn sell_at_or_below_bid_fills_at_bid() {
        let mut sim = MatchingSimulator::new(0.2);
        let mut book = OrderBook::new();
        book.send_order("IF1706", 2997.0, 1, Direction::Sell, Offset::Close);
        let rests = book.send_order("IF1706", 2998.2, 1, Direction::Sell, Offset::Close);

        let out = sim.evaluate(&mut book, &tick(2999.0, 2998.0, 3000.0));
        assert_eq!(out.fills.len(), 1);
        assert_eq!(out.fills[0].trade.price, 2998.0);
        assert!(book.contains(rests));
    }

    #[test]
    fn empty_bid_is_synthesized_from_last() {
        let sim = MatchingSimulator::new(0.2);
        let t = tick(2999.0, 0.0, 3000.0);
        assert!((sim.effective_bid(&t) - 2998.8).abs() < 1e-9);
    }

    #[test]
    fn multiple_fills_in_reference_order() {
        let mut sim = MatchingSimulator::new(0.2);
        let mut book = OrderBook::new();
        let a = book.send_order("IF1706", 3001.0, 1, Direction::Buy, Offset::Open);
        let b = book.send_order("IF1706", 2990.0, 1, Direction::Sell, Offset::Close);
        let c = book.send_order("IF1706", 3000.0, 1, Direction::Buy, Offset::Open);

        let out = sim.evaluate(&mut book, &tick(2999.0, 2998.0, 3000.0));
        let order: Vec<OrderRef> = out.fills.iter().map(|f| f.trade.order_ref).collect();
        assert_eq!(order, vec![a, b, c]);
        let ids: Vec<TradeId> = out.fills.iter().map(|f| f.trade.trade_id).collect();
        assert_eq!(ids, vec![TradeId(1), TradeId(2), TradeId(3)]);
        assert_eq!(sim.trades_issued(), 3);
    }
}
