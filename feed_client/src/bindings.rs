//! Typed registration of server-push handlers.
//!
//! A server push is an Invocation whose `target` names a client method. Each
//! [`ServerEvent`] ties such a name to the payload type carried as the first
//! argument; [`EventBindings::on`] registers a handler receiving that payload
//! already deserialized. Targets are matched case-insensitively.
use std::collections::HashMap;

use feed_common::net::{RECEIVE_QUOTE_UPDATE, RECEIVE_TRADE_UPDATE};
use feed_common::protocol::Invocation;
use feed_common::{HubError, Result, StockQuote, StockTrade};
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A named server push with a typed payload.
pub trait ServerEvent {
    /// Wire name of the client method.
    const NAME: &'static str;
    /// First invocation argument.
    type Payload: DeserializeOwned;
}

/// `ReceiveTradeUpdate(StockTrade)`.
pub struct TradeUpdate;

impl ServerEvent for TradeUpdate {
    const NAME: &'static str = RECEIVE_TRADE_UPDATE;
    type Payload = StockTrade;
}

/// `ReceiveQuoteUpdate(StockQuote)`.
pub struct QuoteUpdate;

impl ServerEvent for QuoteUpdate {
    const NAME: &'static str = RECEIVE_QUOTE_UPDATE;
    type Payload = StockQuote;
}

type Handler<S> = Box<dyn FnMut(&mut S, &[Value]) -> Result<()>>;

/// Handlers keyed by lower-cased target, applied to state of type `S`.
pub struct EventBindings<S> {
    handlers: HashMap<String, Vec<Handler<S>>>,
}

impl<S> Default for EventBindings<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> EventBindings<S> {
    /// No handlers.
    pub fn new() -> Self {
        EventBindings {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `E`. Several handlers per event run in
    /// registration order.
    pub fn on<E, F>(&mut self, mut handler: F) -> &mut Self
    where
        S: 'static,
        E: ServerEvent + 'static,
        F: FnMut(&mut S, E::Payload) + 'static,
    {
        let wrapped: Handler<S> = Box::new(move |state, arguments| {
            let first = arguments.first().cloned().ok_or_else(|| {
                HubError::Protocol(format!("{} arrived without arguments", E::NAME))
            })?;
            let payload: E::Payload = serde_json::from_value(first)?;
            handler(state, payload);
            Ok(())
        });
        self.handlers
            .entry(E::NAME.to_lowercase())
            .or_default()
            .push(wrapped);
        self
    }

    /// Run every handler bound to the invocation's target.
    ///
    /// Returns how many handlers accepted the payload. Unbound targets and
    /// payloads that fail to decode are logged and dropped.
    pub fn dispatch(&mut self, state: &mut S, invocation: &Invocation) -> usize {
        let Some(handlers) = self.handlers.get_mut(&invocation.target.to_lowercase()) else {
            debug!(
                "No client method with the name '{}' found.",
                invocation.target
            );
            return 0;
        };
        let mut applied = 0;
        for handler in handlers.iter_mut() {
            match handler(state, &invocation.arguments) {
                Ok(()) => applied += 1,
                Err(e) => error!(
                    "A callback for the method '{}' failed: {}",
                    invocation.target, e
                ),
            }
        }
        applied
    }
}
