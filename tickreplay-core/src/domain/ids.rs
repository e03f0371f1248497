use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order reference. Issued in strictly increasing order, never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderRef(pub u64);

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade ID, session-scoped and monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session identifier derived from the engine's construction time.
///
/// Used for log correlation only, never as a storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn from_time(at: DateTime<Local>) -> Self {
        Self(at.format("%Y%m%d-%H%M%S").to_string())
    }

    pub fn now() -> Self {
        Self::from_time(Local::now())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic counter. The first issued value is 1.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    last: u64,
}

impl IdGen {
    pub fn next_order_ref(&mut self) -> OrderRef {
        OrderRef(self.bump())
    }

    pub fn next_trade_id(&mut self) -> TradeId {
        TradeId(self.bump())
    }

    /// Last value issued (0 if none).
    pub fn last(&self) -> u64 {
        self.last
    }

    fn bump(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}
