//! Trade payload pushed by the hub through `ReceiveTradeUpdate`.
use serde::{Deserialize, Serialize};

use crate::market_event::MarketEvent;

/// A single executed transaction for a symbol on an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTrade {
    /// Discriminator; the hub usually sets it to `Trade`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_event: Option<MarketEvent>,
    /// Exchange code (e.g., `V`).
    pub exchange: String,
    /// Ticker symbol (e.g., `AAPL`).
    pub symbol: String,
    /// Execution price.
    pub price: f64,
    /// Executed size.
    pub size: f64,
    /// Execution time as sent by the hub, ISO 8601.
    pub timestamp: String,
}
