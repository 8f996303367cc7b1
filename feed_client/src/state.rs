//! In-memory application state.
//!
//! Three append-only lists fed by the hub and the subscribe acknowledgements,
//! plus the form fields the user edits. Nothing is persisted; everything is
//! dropped with the application.
use feed_common::{StockQuote, StockTrade, Subscription};

/// Everything the view renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    /// Trades in arrival order.
    pub trades: Vec<StockTrade>,
    /// Quotes in arrival order.
    pub quotes: Vec<StockQuote>,
    /// Acknowledged subscriptions, duplicates included.
    pub subscriptions: Vec<Subscription>,
}

impl FeedState {
    /// Append a pushed trade.
    pub fn append_trade(&mut self, trade: StockTrade) {
        self.trades.push(trade);
    }

    /// Append a pushed quote.
    pub fn append_quote(&mut self, quote: StockQuote) {
        self.quotes.push(quote);
    }

    /// Append an acknowledged subscription.
    pub fn record_subscription(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }
}

/// Current values of the subscribe form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    /// Trade form: exchange.
    pub exchange: String,
    /// Trade form: symbol.
    pub symbol: String,
    /// Quote form: symbol.
    pub quote_symbol: String,
}
