//! Tick replay loop: the simulation clock.
//!
//! One engine runs exactly one session. Per tick, in ascending order:
//! 1. Set the tick as current
//! 2. Match every open order against it
//! 3. Append each fill to the ledger, emit trade-update then order-update
//! 4. Forward the raw tick as market data
//!
//! After the last tick the ledger is flushed and the session terminates.

use super::event::EventConsumer;
use super::ledger::TradeLedger;
use super::matching::{Fill, MatchingSimulator};
use super::order_book::{OrderBook, OrderGateway};
use crate::data::store::BlobStore;
use crate::domain::{Direction, LimitOrder, Offset, OrderRef, SessionId, TickRecord};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

/// Parameters fixed at engine construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub symbol: String,
    pub start_date: NaiveDate,
    /// `None` means "through today".
    pub end_date: Option<NaiveDate>,
    /// Minimum price increment, used to synthesize empty quote sides.
    pub min_diff: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplayState {
    Idle,
    Running,
    Draining,
    Terminated,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("replay not ready: {0}")]
    NotReady(&'static str),

    #[error("session already terminated")]
    AlreadyTerminated,
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub symbol: String,
    pub ticks_processed: usize,
    pub trades_filled: usize,
    pub open_orders: usize,
    pub ledger_flushed: bool,
}

/// Single-session backtesting engine.
///
/// Generic over the strategy consumer and the ledger store so callers can get
/// both back after the run.
pub struct BacktestingEngine<C: EventConsumer, B: BlobStore> {
    session_id: SessionId,
    config: SessionConfig,
    state: ReplayState,
    ticks: Option<Vec<TickRecord>>,
    /// Index of the current tick in `ticks`.
    cursor: Option<usize>,
    book: OrderBook,
    matcher: MatchingSimulator,
    ledger: TradeLedger,
    consumer: Option<C>,
    ledger_store: B,
}

impl<C: EventConsumer, B: BlobStore> BacktestingEngine<C, B> {
    pub fn new(config: SessionConfig, ledger_store: B) -> Self {
        Self::with_session_id(SessionId::now(), config, ledger_store)
    }

    pub fn with_session_id(session_id: SessionId, config: SessionConfig, ledger_store: B) -> Self {
        info!(session_id = %session_id, symbol = %config.symbol, "backtesting engine created");
        Self {
            session_id,
            matcher: MatchingSimulator::new(config.min_diff),
            config,
            state: ReplayState::Idle,
            ticks: None,
            cursor: None,
            book: OrderBook::new(),
            ledger: TradeLedger::new(),
            consumer: None,
            ledger_store,
        }
    }

    // ── Setup ────────────────────────────────────────────────────────

    /// Install the tick sequence to replay. Replaces any earlier one while idle.
    pub fn load_ticks(&mut self, ticks: Vec<TickRecord>) {
        debug!(session_id = %self.session_id, ticks = ticks.len(), "tick sequence installed");
        self.ticks = Some(ticks);
    }

    pub fn attach_consumer(&mut self, consumer: C) {
        self.consumer = Some(consumer);
    }

    pub fn set_min_diff(&mut self, min_diff: f64) {
        self.config.min_diff = min_diff;
        self.matcher.set_min_diff(min_diff);
    }

    // ── Order entry ─────────────────────────────────────────────────

    /// Place a limit order from outside a callback.
    pub fn send_order(
        &mut self,
        symbol: &str,
        price: f64,
        volume: u64,
        direction: Direction,
        offset: Offset,
    ) -> Result<OrderRef, ReplayError> {
        if self.state == ReplayState::Terminated {
            return Err(ReplayError::AlreadyTerminated);
        }
        Ok(self.book.send_order(symbol, price, volume, direction, offset))
    }

    /// Cancel an open order. Absent references are a no-op.
    pub fn cancel_order(&mut self, order_ref: OrderRef) -> bool {
        self.book.cancel_order(order_ref)
    }

    // ── Run ─────────────────────────────────────────────────────────

    /// Replay the loaded ticks through the matcher and the consumer.
    pub fn start_backtesting(&mut self) -> Result<SessionReport, ReplayError> {
        match self.state {
            ReplayState::Idle => {}
            ReplayState::Terminated => return Err(ReplayError::AlreadyTerminated),
            // Unreachable from safe callers: the loop holds `&mut self`.
            ReplayState::Running | ReplayState::Draining => {
                return Err(ReplayError::NotReady("replay already in progress"))
            }
        }
        let Some(ticks) = self.ticks.as_ref() else {
            return Err(ReplayError::NotReady("no tick sequence loaded"));
        };
        let Some(consumer) = self.consumer.as_mut() else {
            return Err(ReplayError::NotReady("no consumer attached"));
        };

        self.state = ReplayState::Running;
        info!(session_id = %self.session_id, symbol = %self.config.symbol, ticks = ticks.len(), "replay started");

        for (index, tick) in ticks.iter().enumerate() {
            self.cursor = Some(index);

            let outcome = self.matcher.evaluate(&mut self.book, tick);
            for fill in outcome.fills {
                self.ledger.append(fill.trade.clone());
                emit_fill(consumer, &mut self.book, &fill);
            }

            consumer.on_market_data(tick, &mut self.book);
        }

        self.state = ReplayState::Draining;
        let ticks_processed = ticks.len();

        let ledger_flushed = match self.ledger.flush(
            &mut self.ledger_store,
            &self.session_id,
            &self.config.symbol,
        ) {
            Ok(()) => true,
            Err(e) => {
                error!(session_id = %self.session_id, error = %e, "ledger flush failed");
                false
            }
        };

        self.state = ReplayState::Terminated;
        let report = SessionReport {
            session_id: self.session_id.clone(),
            symbol: self.config.symbol.clone(),
            ticks_processed,
            trades_filled: self.ledger.len(),
            open_orders: self.book.len(),
            ledger_flushed,
        };
        info!(
            session_id = %report.session_id,
            ticks = report.ticks_processed,
            trades = report.trades_filled,
            open_orders = report.open_orders,
            ledger_flushed,
            "replay finished"
        );
        Ok(report)
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn current_tick(&self) -> Option<&TickRecord> {
        let index = self.cursor?;
        self.ticks.as_ref()?.get(index)
    }

    pub fn tick_count(&self) -> Option<usize> {
        self.ticks.as_ref().map(Vec::len)
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &LimitOrder> {
        self.book.iter()
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn consumer(&self) -> Option<&C> {
        self.consumer.as_ref()
    }

    pub fn take_consumer(&mut self) -> Option<C> {
        self.consumer.take()
    }

    pub fn ledger_store(&self) -> &B {
        &self.ledger_store
    }

    pub fn into_ledger_store(self) -> B {
        self.ledger_store
    }
}

fn emit_fill<C: EventConsumer>(consumer: &mut C, book: &mut OrderBook, fill: &Fill) {
    debug!(
        trade_id = %fill.trade.trade_id,
        order_ref = %fill.trade.order_ref,
        price = fill.trade.price,
        volume = fill.trade.volume,
        "order filled"
    );
    consumer.on_trade_update(&fill.trade, book);
    consumer.on_order_update(&fill.status, book);
}
