//! Locally recorded subscriptions.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::market_event::MarketEvent;

/// A client-declared interest filter, recorded once the hub acknowledged it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Exchange filter; quote subscriptions carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    /// Ticker symbol.
    pub symbol: String,
    /// Which feed the subscription is for.
    #[serde(rename = "type")]
    pub kind: MarketEvent,
}

impl Subscription {
    /// Trade subscription for `exchange.symbol`.
    pub fn trade(exchange: &str, symbol: &str) -> Self {
        Subscription {
            exchange: Some(String::from(exchange)),
            symbol: String::from(symbol),
            kind: MarketEvent::Trade,
        }
    }

    /// Quote subscription for `symbol`.
    pub fn quote(symbol: &str) -> Self {
        Subscription {
            exchange: None,
            symbol: String::from(symbol),
            kind: MarketEvent::Quote,
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.kind)?;
        match self.exchange.as_deref() {
            Some(exchange) if !exchange.is_empty() => write!(f, "{}.{}", exchange, self.symbol),
            _ => write!(f, "{}", self.symbol),
        }
    }
}
