//! Subscription invoker.
//!
//! Turns the subscribe buttons into hub invocations and their Completions into
//! recorded subscriptions. Failures of either step are logged and otherwise
//! swallowed: the user sees no error and nothing is retried.
//!
//! The quote subscription sends the trade form's `exchange` and `symbol` and
//! records the quote form's symbol, matching the deployed front end.
use std::collections::HashMap;

use feed_common::protocol::Completion;
use feed_common::{HubError, Subscription};
use log::{debug, error, info};
use serde_json::Value;

use crate::connection::RemoteInvoker;
use crate::state::{FeedState, FormState};

const CONNECTION_CLOSED: &str = "Invocation canceled due to the underlying connection being closed.";

/// A subscribe call waiting for its Completion.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingSubscription {
    record: Subscription,
    requested: String,
}

/// Issues subscribe calls and records acknowledged subscriptions.
#[derive(Debug)]
pub struct SubscriptionInvoker {
    method: &'static str,
    pending: HashMap<String, PendingSubscription>,
}

impl SubscriptionInvoker {
    /// Invoker calling the hub method `method`.
    pub fn new(method: &'static str) -> Self {
        SubscriptionInvoker {
            method,
            pending: HashMap::new(),
        }
    }

    /// Hub method this invoker calls.
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Calls still waiting for a Completion.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// "Subscribe to Trades": `method(exchange, symbol)`, records a trade subscription.
    pub fn subscribe_trade<I: RemoteInvoker>(&mut self, hub: &mut I, form: &FormState) {
        let record = Subscription::trade(&form.exchange, &form.symbol);
        self.invoke(hub, form, record);
    }

    /// "Subscribe to Quotes": `method(exchange, symbol)`, records a quote
    /// subscription for the quote symbol.
    pub fn subscribe_quote<I: RemoteInvoker>(&mut self, hub: &mut I, form: &FormState) {
        let record = Subscription::quote(&form.quote_symbol);
        self.invoke(hub, form, record);
    }

    fn invoke<I: RemoteInvoker>(&mut self, hub: &mut I, form: &FormState, record: Subscription) {
        let arguments = vec![
            Value::String(form.exchange.clone()),
            Value::String(form.symbol.clone()),
        ];
        match hub.invoke(self.method, arguments) {
            Ok(invocation_id) => {
                debug!("{} pending as invocation {}", record, invocation_id);
                self.pending.insert(
                    invocation_id,
                    PendingSubscription {
                        record,
                        requested: format!("{}.{}", form.exchange, form.symbol),
                    },
                );
            }
            Err(e) => error!("Trade subscription failed: {}", e),
        }
    }

    /// Resolve a Completion. Returns `true` if a subscription was recorded.
    pub fn complete(&mut self, completion: Completion, state: &mut FeedState) -> bool {
        let Some(pending) = self.pending.remove(&completion.invocation_id) else {
            debug!(
                "Completion for unknown invocation {} ignored",
                completion.invocation_id
            );
            return false;
        };
        match completion.into_result() {
            Ok(_) => {
                info!("Subscribed to {}", pending.requested);
                state.record_subscription(pending.record);
                true
            }
            Err(reason) => {
                error!("Trade subscription failed: {}", HubError::Invocation(reason));
                false
            }
        }
    }

    /// Fail every pending call because the connection went away.
    pub fn fail_pending(&mut self) {
        for (_, pending) in self.pending.drain() {
            error!(
                "Trade subscription failed: {} ({})",
                HubError::ConnectionClosed(String::from(CONNECTION_CLOSED)),
                pending.requested
            );
        }
    }
}
