use serde::{Deserialize, Serialize};

/// Exchange id reported for every instrument in a simulated session.
pub const BACKTEST_EXCHANGE: &str = "BackTesting";

/// Instrument metadata returned by the simulated gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub symbol: String,
    pub exchange_id: String,
}

impl InstrumentInfo {
    pub fn backtesting(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            exchange_id: BACKTEST_EXCHANGE.to_string(),
        }
    }
}
