//! Built-in demo strategies.
//!
//! These exist to drive the engine end to end from the CLI. They are not
//! meant as trading ideas.

use serde::Serialize;
use std::collections::VecDeque;
use tickreplay_core::domain::{Direction, Offset, OrderRef, OrderStatusUpdate, TickRecord, Trade};
use tickreplay_core::engine::{EventConsumer, OrderGateway};
use tracing::debug;

use crate::config::StrategyKind;

/// Counters every built-in strategy keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StrategySummary {
    pub name: String,
    pub ticks_seen: usize,
    pub orders_sent: usize,
    pub orders_cancelled: usize,
    pub fills: usize,
    /// Net lots held at the end of the session.
    pub net_position: i64,
}

/// A consumer that can report what it did.
pub trait ReplayStrategy: EventConsumer + Send {
    fn name(&self) -> &str;
    fn summary(&self) -> StrategySummary;
}

pub fn build_strategy(kind: StrategyKind, symbol: &str) -> Box<dyn ReplayStrategy> {
    match kind {
        StrategyKind::Passive => Box::new(PassiveStrategy::new(symbol)),
        StrategyKind::Momentum => Box::new(MomentumStrategy::new(symbol, MomentumParams::default())),
    }
}

// ── Passive ──────────────────────────────────────────────────────────

/// Subscribes and watches. Never places an order.
#[derive(Debug)]
pub struct PassiveStrategy {
    symbol: String,
    subscribed: bool,
    ticks_seen: usize,
}

impl PassiveStrategy {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            subscribed: false,
            ticks_seen: 0,
        }
    }
}

impl EventConsumer for PassiveStrategy {
    fn on_market_data(&mut self, _tick: &TickRecord, gateway: &mut dyn OrderGateway) {
        if !self.subscribed {
            let info = gateway.select_instrument(&self.symbol);
            gateway.subscribe(&info.symbol, &info.exchange_id);
            self.subscribed = true;
        }
        self.ticks_seen += 1;
    }
}

impl ReplayStrategy for PassiveStrategy {
    fn name(&self) -> &str {
        "passive"
    }

    fn summary(&self) -> StrategySummary {
        StrategySummary {
            name: self.name().to_string(),
            ticks_seen: self.ticks_seen,
            ..Default::default()
        }
    }
}

// ── Momentum ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumParams {
    /// Ticks in the breakout window.
    pub lookback: usize,
    /// Lots per order.
    pub volume: u64,
    /// Cancel a resting order after this many ticks without a fill.
    pub max_resting_ticks: usize,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            lookback: 20,
            volume: 1,
            max_resting_ticks: 5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Resting {
    order_ref: OrderRef,
    placed_at: usize,
}

/// Long-only breakout: buy when the last price clears the window high, sell
/// the position when it breaks the window low. At most one order rests at a
/// time.
#[derive(Debug)]
pub struct MomentumStrategy {
    symbol: String,
    params: MomentumParams,
    window: VecDeque<f64>,
    resting: Option<Resting>,
    position: i64,
    ticks_seen: usize,
    orders_sent: usize,
    orders_cancelled: usize,
    fills: usize,
}

impl MomentumStrategy {
    pub fn new(symbol: &str, params: MomentumParams) -> Self {
        Self {
            symbol: symbol.to_string(),
            params,
            window: VecDeque::with_capacity(params.lookback + 1),
            resting: None,
            position: 0,
            ticks_seen: 0,
            orders_sent: 0,
            orders_cancelled: 0,
            fills: 0,
        }
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    fn expire_resting(&mut self, gateway: &mut dyn OrderGateway) {
        let Some(resting) = self.resting else {
            return;
        };
        if self.ticks_seen - resting.placed_at >= self.params.max_resting_ticks {
            if gateway.cancel_order(resting.order_ref) {
                self.orders_cancelled += 1;
                debug!(order_ref = %resting.order_ref, "resting order expired");
            }
            self.resting = None;
        }
    }

    fn place(
        &mut self,
        gateway: &mut dyn OrderGateway,
        price: f64,
        direction: Direction,
        offset: Offset,
    ) {
        let order_ref = gateway.send_order(&self.symbol, price, self.params.volume, direction, offset);
        self.orders_sent += 1;
        self.resting = Some(Resting {
            order_ref,
            placed_at: self.ticks_seen,
        });
    }
}

impl EventConsumer for MomentumStrategy {
    fn on_market_data(&mut self, tick: &TickRecord, gateway: &mut dyn OrderGateway) {
        self.ticks_seen += 1;
        self.expire_resting(gateway);

        if self.resting.is_none() && self.window.len() == self.params.lookback {
            let high = self.window.iter().copied().fold(f64::MIN, f64::max);
            let low = self.window.iter().copied().fold(f64::MAX, f64::min);

            if self.position == 0 && tick.last_price > high {
                let price = if tick.has_ask() { tick.ask_price1 } else { tick.last_price };
                self.place(gateway, price, Direction::Buy, Offset::Open);
            } else if self.position > 0 && tick.last_price < low {
                let price = if tick.has_bid() { tick.bid_price1 } else { tick.last_price };
                self.place(gateway, price, Direction::Sell, Offset::Close);
            }
        }

        self.window.push_back(tick.last_price);
        if self.window.len() > self.params.lookback {
            self.window.pop_front();
        }
    }

    fn on_order_update(&mut self, status: &OrderStatusUpdate, _gateway: &mut dyn OrderGateway) {
        if self.resting.map(|r| r.order_ref) == Some(status.order_ref) {
            self.resting = None;
        }
    }

    fn on_trade_update(&mut self, trade: &Trade, _gateway: &mut dyn OrderGateway) {
        self.fills += 1;
        let lots = trade.volume as i64;
        match trade.direction {
            Direction::Buy => self.position += lots,
            Direction::Sell => self.position -= lots,
        }
    }
}

impl ReplayStrategy for MomentumStrategy {
    fn name(&self) -> &str {
        "momentum"
    }

    fn summary(&self) -> StrategySummary {
        StrategySummary {
            name: self.name().to_string(),
            ticks_seen: self.ticks_seen,
            orders_sent: self.orders_sent,
            orders_cancelled: self.orders_cancelled,
            fills: self.fills,
            net_position: self.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tickreplay_core::data::MemoryBlobStore;
    use tickreplay_core::domain::SessionId;
    use tickreplay_core::engine::{BacktestingEngine, OrderBook, SessionConfig};

    fn tick(i: u32, last: f64) -> TickRecord {
        TickRecord {
            instrument_id: "IF1706".into(),
            update_time: NaiveDate::from_ymd_opt(2017, 5, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
                + chrono::Duration::seconds(i64::from(i)),
            last_price: last,
            volume: 1,
            open_interest: 0.0,
            bid_price1: last - 0.2,
            bid_volume1: 1,
            ask_price1: last + 0.2,
            ask_volume1: 1,
        }
    }

    fn run(strategy: Box<dyn ReplayStrategy>, prices: &[f64]) -> StrategySummary {
        let mut engine = BacktestingEngine::with_session_id(
            SessionId("test".into()),
            SessionConfig {
                symbol: "IF1706".into(),
                start_date: NaiveDate::from_ymd_opt(2017, 5, 2).unwrap(),
                end_date: None,
                min_diff: 0.2,
            },
            MemoryBlobStore::new(),
        );
        engine.load_ticks(
            prices
                .iter()
                .enumerate()
                .map(|(i, p)| tick(i as u32, *p))
                .collect(),
        );
        engine.attach_consumer(strategy);
        engine.start_backtesting().unwrap();
        engine.consumer().unwrap().summary()
    }

    #[test]
    fn passive_never_trades() {
        let summary = run(build_strategy(StrategyKind::Passive, "IF1706"), &[1.0, 2.0, 3.0]);
        assert_eq!(summary.ticks_seen, 3);
        assert_eq!(summary.orders_sent, 0);
        assert_eq!(summary.name, "passive");
    }

    #[test]
    fn momentum_round_trip() {
        let params = MomentumParams {
            lookback: 3,
            volume: 2,
            max_resting_ticks: 5,
        };
        // Flat, breakout up (buy at 3005.2, fills next tick at ask 3005.2),
        // then a break below the window low (sell, fills next tick at bid).
        let prices = [3000.0, 3000.0, 3000.0, 3005.0, 3005.0, 3005.0, 3005.0, 2990.0, 2990.0];
        let summary = run(Box::new(MomentumStrategy::new("IF1706", params)), &prices);
        assert_eq!(summary.orders_sent, 2);
        assert_eq!(summary.fills, 2);
        assert_eq!(summary.net_position, 0);
        assert_eq!(summary.orders_cancelled, 0);
    }

    #[test]
    fn momentum_cancels_stale_order() {
        let params = MomentumParams {
            lookback: 2,
            volume: 1,
            max_resting_ticks: 2,
        };
        let mut strategy = MomentumStrategy::new("IF1706", params);
        let mut book = OrderBook::new();
        // Breakout buy at 3010.2 is never matched (no matcher here), expires
        // two ticks later and is replaced by a fresh breakout order.
        for (i, p) in [3000.0, 3000.0, 3010.0, 3011.0, 3012.0].iter().enumerate() {
            strategy.on_market_data(&tick(i as u32, *p), &mut book);
        }
        let summary = strategy.summary();
        assert_eq!(summary.orders_sent, 2);
        assert_eq!(summary.orders_cancelled, 1);
        assert_eq!(book.len(), 1);
        let price = book.iter().next().map(|o| o.price).unwrap();
        assert!((price - 3012.2).abs() < 1e-9);
    }
}
