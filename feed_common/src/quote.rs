//! Quote payload pushed by the hub through `ReceiveQuoteUpdate`.
use serde::{Deserialize, Serialize};

use crate::market_event::MarketEvent;

/// Current best bid and ask for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockQuote {
    /// Discriminator; the hub usually sets it to `Quote`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_event: Option<MarketEvent>,
    /// Ticker symbol.
    pub symbol: String,
    /// Exchange holding the best ask.
    pub ask_exchange: String,
    /// Best ask price.
    pub ask_price: f64,
    /// Size available at the best ask.
    pub ask_size: f64,
    /// Exchange holding the best bid.
    pub bid_exchange: String,
    /// Best bid price.
    pub bid_price: f64,
    /// Size available at the best bid.
    pub bid_size: f64,
    /// Quote time as sent by the hub, ISO 8601.
    pub timestamp: String,
}
