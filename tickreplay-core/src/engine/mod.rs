//! Replay engine: open orders, matching, events, ledger and the tick loop.
//!
//! The loop is synchronous and single-threaded. Within a tick every match is
//! resolved and emitted before the tick itself is forwarded to the consumer.

pub mod event;
pub mod ledger;
pub mod matching;
pub mod order_book;
pub mod replay;

pub use event::{EngineEvent, EventConsumer, EventRecorder};
pub use ledger::{LedgerSnapshot, TradeLedger, LEDGER_KEY};
pub use matching::{Fill, MatchOutcome, MatchingSimulator, PRICE_TOLERANCE};
pub use order_book::{OrderBook, OrderGateway};
pub use replay::{BacktestingEngine, ReplayError, ReplayState, SessionConfig, SessionReport};
