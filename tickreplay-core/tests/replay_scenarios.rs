//! End-to-end replay: loader → engine → consumer → ledger.

use chrono::{NaiveDate, NaiveDateTime};
use tickreplay_core::data::source::row_time;
use tickreplay_core::data::{
    LoadOptions, MemoryBlobStore, MemoryTickSource, TickCache, TickLoader, TickRow,
};
use tickreplay_core::domain::{
    Direction, Offset, OrderRef, OrderStatusUpdate, SessionId, TickRecord, Trade,
};
use tickreplay_core::engine::{
    BacktestingEngine, EngineEvent, EventConsumer, EventRecorder, OrderGateway, SessionConfig,
    TradeLedger,
};

// ── Fixtures ─────────────────────────────────────────────────────────

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn at(sec: u32) -> NaiveDateTime {
    d(2017, 6, 1).and_hms_opt(9, 30, sec).unwrap()
}

fn tick(sec: u32, last: f64, bid: f64, ask: f64) -> TickRecord {
    TickRecord {
        instrument_id: "IF1706".into(),
        update_time: at(sec),
        last_price: last,
        volume: 10,
        open_interest: 1000.0,
        bid_price1: bid,
        bid_volume1: 2,
        ask_price1: ask,
        ask_volume1: 2,
    }
}

fn config(min_diff: f64) -> SessionConfig {
    SessionConfig {
        symbol: "IF1706".into(),
        start_date: d(2017, 6, 1),
        end_date: Some(d(2017, 6, 1)),
        min_diff,
    }
}

fn engine<C: EventConsumer>(consumer: C, ticks: Vec<TickRecord>) -> BacktestingEngine<C, MemoryBlobStore> {
    let mut e = BacktestingEngine::with_session_id(
        SessionId("20170601-093000".into()),
        config(0.2),
        MemoryBlobStore::new(),
    );
    e.load_ticks(ticks);
    e.attach_consumer(consumer);
    e
}

/// Buys once on the first tick it sees, and records what comes back.
#[derive(Default)]
struct BuyOnFirstTick {
    limit: f64,
    placed: Option<OrderRef>,
    fills: Vec<Trade>,
    statuses: Vec<OrderStatusUpdate>,
    ticks_seen: usize,
}

impl EventConsumer for BuyOnFirstTick {
    fn on_market_data(&mut self, _tick: &TickRecord, gateway: &mut dyn OrderGateway) {
        self.ticks_seen += 1;
        if self.placed.is_none() {
            self.placed = Some(gateway.send_order("IF1706", self.limit, 1, Direction::Buy, Offset::Open));
        }
    }

    fn on_order_update(&mut self, status: &OrderStatusUpdate, _gateway: &mut dyn OrderGateway) {
        self.statuses.push(status.clone());
    }

    fn on_trade_update(&mut self, trade: &Trade, _gateway: &mut dyn OrderGateway) {
        self.fills.push(trade.clone());
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn buy_at_ask_fills_and_clears_book() {
    let mut e = engine(EventRecorder::new(), vec![tick(0, 2999.0, 2998.0, 3000.0)]);
    e.send_order("IF1706", 3000.0, 1, Direction::Buy, Offset::Open)
        .unwrap();

    let report = e.start_backtesting().unwrap();
    assert_eq!(e.ledger().len(), 1);
    assert_eq!(e.ledger().trades()[0].price, 3000.0);
    assert_eq!(report.open_orders, 0);
    assert_eq!(e.open_orders().count(), 0);
}

#[test]
fn synthesized_ask_fills_only_at_or_above_last_plus_tick() {
    let mut e = engine(EventRecorder::new(), vec![tick(0, 2999.0, 2998.0, 0.0)]);
    let fills = e
        .send_order("IF1706", 2999.2, 1, Direction::Buy, Offset::Open)
        .unwrap();
    let rests = e
        .send_order("IF1706", 2999.0, 1, Direction::Buy, Offset::Open)
        .unwrap();

    e.start_backtesting().unwrap();
    let trades = e.ledger().trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].order_ref, fills);
    assert!((trades[0].price - 2999.2).abs() < 1e-9);

    let open: Vec<OrderRef> = e.open_orders().map(|o| o.order_ref).collect();
    assert_eq!(open, vec![rests]);
}

#[test]
fn callback_order_waits_for_next_tick() {
    let strategy = BuyOnFirstTick {
        limit: 3000.0,
        ..Default::default()
    };
    let ticks = vec![
        tick(0, 2999.0, 2998.0, 3000.0),
        tick(1, 2999.4, 2999.2, 3000.0),
    ];
    let mut e = engine(strategy, ticks);
    e.start_backtesting().unwrap();

    let s = e.consumer().unwrap();
    assert_eq!(s.ticks_seen, 2);
    assert_eq!(s.fills.len(), 1);
    // Placed while handling tick 0, so it can only fill against tick 1.
    assert_eq!(s.fills[0].trade_time, at(1));
    assert_eq!(s.statuses.len(), 1);
    assert_eq!(s.statuses[0].volume_traded, 1);
    assert_eq!(s.statuses[0].limit_price, 3000.0);
    assert!(s.statuses[0].insert_time.is_none());
    assert!(s.statuses[0].order_status.is_none());
}

#[test]
fn unfilled_callback_order_stays_open() {
    let strategy = BuyOnFirstTick {
        limit: 2990.0,
        ..Default::default()
    };
    let ticks = vec![tick(0, 2999.0, 2998.0, 3000.0), tick(1, 2999.0, 2998.0, 3000.0)];
    let mut e = engine(strategy, ticks);
    let report = e.start_backtesting().unwrap();
    assert_eq!(report.trades_filled, 0);
    assert_eq!(report.open_orders, 1);
}

/// Cancels whatever it hears about, including orders that just filled.
struct CancelOnFill {
    order: Option<OrderRef>,
    cancel_results: Vec<bool>,
}

impl EventConsumer for CancelOnFill {
    fn on_market_data(&mut self, _tick: &TickRecord, gateway: &mut dyn OrderGateway) {
        if self.order.is_none() {
            self.order = Some(gateway.send_order("IF1706", 3100.0, 1, Direction::Buy, Offset::Open));
        }
    }

    fn on_trade_update(&mut self, trade: &Trade, gateway: &mut dyn OrderGateway) {
        self.cancel_results.push(gateway.cancel_order(trade.order_ref));
        self.cancel_results.push(gateway.cancel_order(OrderRef(9_999)));
    }
}

#[test]
fn cancelling_filled_order_in_callback_is_noop() {
    let strategy = CancelOnFill {
        order: None,
        cancel_results: Vec::new(),
    };
    let ticks = vec![tick(0, 2999.0, 2998.0, 3000.0), tick(1, 2999.0, 2998.0, 3000.0)];
    let mut e = engine(strategy, ticks);
    let report = e.start_backtesting().unwrap();

    assert_eq!(report.trades_filled, 1);
    assert_eq!(e.consumer().unwrap().cancel_results, vec![false, false]);
}

#[test]
fn every_tick_is_forwarded_in_order() {
    let ticks: Vec<TickRecord> = (0..20)
        .map(|s| tick(s, 3000.0 + s as f64, 2999.0 + s as f64, 3001.0 + s as f64))
        .collect();
    let mut e = engine(EventRecorder::new(), ticks.clone());
    e.start_backtesting().unwrap();

    let forwarded: Vec<TickRecord> = e
        .consumer()
        .unwrap()
        .events()
        .iter()
        .filter_map(|ev| match ev {
            EngineEvent::MarketData(t) => Some(t.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(forwarded, ticks);
}

#[test]
fn loader_fed_session_replays_and_persists_ledger() {
    let rows: Vec<TickRow> = (1..=31)
        .map(|day| TickRow {
            instrument_id: "X".into(),
            update_time: row_time::parse(&format!("2024-01-{day:02} 09:30:00")).unwrap(),
            last_price: 100.0,
            volume: Some(1),
            open_interest: Some(0.0),
            bid_price1: Some(99.8),
            bid_volume1: Some(1),
            ask_price1: if day == 15 { None } else { Some(100.2) },
            ask_volume1: Some(1),
        })
        .collect();
    let mut loader = TickLoader::new(
        MemoryTickSource::new().with_rows("X", rows),
        TickCache::new(MemoryBlobStore::new()),
        LoadOptions::default(),
    );
    let loaded = loader.load("X", d(2024, 1, 1), Some(d(2024, 1, 31)));
    assert_eq!(loader.source().query_count(), 4);

    let mut e = BacktestingEngine::new(
        SessionConfig {
            symbol: "X".into(),
            start_date: d(2024, 1, 1),
            end_date: Some(d(2024, 1, 31)),
            min_diff: 0.2,
        },
        MemoryBlobStore::new(),
    );
    e.load_ticks(loaded.ticks);
    e.attach_consumer(EventRecorder::new());
    e.send_order("X", 100.2, 3, Direction::Buy, Offset::Open)
        .unwrap();
    e.send_order("X", 99.8, 3, Direction::Sell, Offset::Close)
        .unwrap();

    let report = e.start_backtesting().unwrap();
    assert_eq!(report.ticks_processed, 31);
    assert_eq!(report.trades_filled, 2);

    let snap = TradeLedger::load_latest(e.ledger_store()).unwrap().unwrap();
    assert_eq!(snap.trades, e.ledger().trades());
    assert_eq!(snap.symbol, "X");
}
