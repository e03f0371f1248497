//! Events delivered to the strategy during replay.

use super::order_book::OrderGateway;
use crate::domain::{OrderStatusUpdate, TickRecord, Trade};

/// Engine output, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    MarketData(TickRecord),
    OrderUpdate(OrderStatusUpdate),
    TradeUpdate(Trade),
}

impl EngineEvent {
    /// Dispatch to the matching consumer sink.
    pub fn deliver<C: EventConsumer + ?Sized>(&self, consumer: &mut C, gateway: &mut dyn OrderGateway) {
        match self {
            EngineEvent::MarketData(tick) => consumer.on_market_data(tick, gateway),
            EngineEvent::OrderUpdate(status) => consumer.on_order_update(status, gateway),
            EngineEvent::TradeUpdate(trade) => consumer.on_trade_update(trade, gateway),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::MarketData(_) => "market_data",
            EngineEvent::OrderUpdate(_) => "order_update",
            EngineEvent::TradeUpdate(_) => "trade_update",
        }
    }
}

/// Strategy-side receiver of engine events.
///
/// Every sink gets the order gateway, so strategies react by placing or
/// cancelling orders. Orders placed from a callback are first evaluated on
/// the next tick.
pub trait EventConsumer {
    fn on_market_data(&mut self, tick: &TickRecord, gateway: &mut dyn OrderGateway);

    fn on_order_update(&mut self, _status: &OrderStatusUpdate, _gateway: &mut dyn OrderGateway) {}

    fn on_trade_update(&mut self, _trade: &Trade, _gateway: &mut dyn OrderGateway) {}
}

impl<T: EventConsumer + ?Sized> EventConsumer for Box<T> {
    fn on_market_data(&mut self, tick: &TickRecord, gateway: &mut dyn OrderGateway) {
        (**self).on_market_data(tick, gateway)
    }

    fn on_order_update(&mut self, status: &OrderStatusUpdate, gateway: &mut dyn OrderGateway) {
        (**self).on_order_update(status, gateway)
    }

    fn on_trade_update(&mut self, trade: &Trade, gateway: &mut dyn OrderGateway) {
        (**self).on_trade_update(trade, gateway)
    }
}

/// Consumer that keeps every event it sees and never trades.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Vec<EngineEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<EngineEvent> {
        self.events
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventConsumer for EventRecorder {
    fn on_market_data(&mut self, tick: &TickRecord, _gateway: &mut dyn OrderGateway) {
        self.events.push(EngineEvent::MarketData(tick.clone()));
    }

    fn on_order_update(&mut self, status: &OrderStatusUpdate, _gateway: &mut dyn OrderGateway) {
        self.events.push(EngineEvent::OrderUpdate(status.clone()));
    }

    fn on_trade_update(&mut self, trade: &Trade, _gateway: &mut dyn OrderGateway) {
        self.events.push(EngineEvent::TradeUpdate(trade.clone()));
    }
}
