//! Endpoint constants and wire names of the stock hub.

/// Host of the development hub.
pub const DEFAULT_HOST: &str = "localhost";
/// Port of the development hub.
pub const DEFAULT_PORT: u16 = 5098;

/// Hub path of the `stock` deployment.
pub const STOCK_HUB_PATH: &str = "/stock";
/// Hub path of the `trades` deployment.
pub const TRADES_HUB_PATH: &str = "/trades/stock";

/// Server push carrying a single `StockTrade`.
pub const RECEIVE_TRADE_UPDATE: &str = "ReceiveTradeUpdate";
/// Server push carrying a single `StockQuote`.
pub const RECEIVE_QUOTE_UPDATE: &str = "ReceiveQuoteUpdate";

/// Subscribe method exposed by the `trades` deployment.
pub const SUBSCRIBE_TO_EXCHANGE_SYMBOL: &str = "SubscribeToExchangeSymbol";
/// Subscribe method exposed by the `stock` deployment.
pub const SUBSCRIBE_TO_TRADE_EXCHANGE_SYMBOL: &str = "SubscribeToTradeExchangeSymbol";

/// Helper to build a plain-HTTP hub URL like "http://host:port/path".
pub fn hub_url(host: &str, port: u16, path: &str) -> String {
    format!("http://{}:{}{}", host, port, path)
}
