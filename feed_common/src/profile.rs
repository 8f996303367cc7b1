//! Hub deployments the client knows how to talk to.

use clap::ValueEnum;
use strum_macros::{Display, EnumString};

use crate::net::{
    DEFAULT_HOST, DEFAULT_PORT, STOCK_HUB_PATH, SUBSCRIBE_TO_EXCHANGE_SYMBOL,
    SUBSCRIBE_TO_TRADE_EXCHANGE_SYMBOL, TRADES_HUB_PATH, hub_url,
};

/// The two hub deployments differ only in their path and the name of the
/// subscribe method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HubProfile {
    /// `http://localhost:5098/stock`, subscribes with `SubscribeToTradeExchangeSymbol`.
    #[default]
    Stock,
    /// `http://localhost:5098/trades/stock`, subscribes with `SubscribeToExchangeSymbol`.
    Trades,
}

impl HubProfile {
    /// Fixed hub URL of the deployment.
    pub fn hub_url(self) -> String {
        match self {
            HubProfile::Stock => hub_url(DEFAULT_HOST, DEFAULT_PORT, STOCK_HUB_PATH),
            HubProfile::Trades => hub_url(DEFAULT_HOST, DEFAULT_PORT, TRADES_HUB_PATH),
        }
    }

    /// Name of the remote subscribe method.
    pub fn subscribe_method(self) -> &'static str {
        match self {
            HubProfile::Stock => SUBSCRIBE_TO_TRADE_EXCHANGE_SYMBOL,
            HubProfile::Trades => SUBSCRIBE_TO_EXCHANGE_SYMBOL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_map_to_their_endpoints() {
        assert_eq!(HubProfile::Stock.hub_url(), "http://localhost:5098/stock");
        assert_eq!(HubProfile::Trades.hub_url(), "http://localhost:5098/trades/stock");
        assert_eq!(
            HubProfile::Stock.subscribe_method(),
            "SubscribeToTradeExchangeSymbol"
        );
        assert_eq!(HubProfile::Trades.subscribe_method(), "SubscribeToExchangeSymbol");
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("TRADES".parse::<HubProfile>().ok(), Some(HubProfile::Trades));
        assert_eq!(HubProfile::Stock.to_string(), "stock");
    }
}
