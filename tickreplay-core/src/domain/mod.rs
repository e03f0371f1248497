//! Domain types for tick replay

pub mod ids;
pub mod instrument;
pub mod order;
pub mod tick;
pub mod trade;

pub use ids::{IdGen, OrderRef, SessionId, TradeId};
pub use instrument::InstrumentInfo;
pub use order::{Direction, LimitOrder, Offset, OrderStatusUpdate};
pub use tick::{is_empty_quote, TickRecord};
pub use trade::Trade;
