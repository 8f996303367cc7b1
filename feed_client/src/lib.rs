//! Live market feed client.
//!
//! Connects to a stock hub speaking the JSON hub protocol over WebSockets,
//! appends pushed trades and quotes to in-memory lists, and records symbol
//! subscriptions acknowledged by the hub. Modules:
//! - `connection`: the connection handle and its events; `transport` runs
//!   the socket on a worker thread.
//! - `negotiate`, `reconnect`: the HTTP negotiate step and the retry schedule.
//! - `bindings`: typed server-push handlers.
//! - `invoker`: subscribe calls and their acknowledgements.
//! - `state`, `view`: what is shown and how.
//! - `console`, `args`, `app`: user input, CLI and the event loop.
#![warn(missing_docs)]
pub mod app;
pub mod args;
pub mod bindings;
pub mod connection;
pub mod console;
pub mod invoker;
pub mod negotiate;
pub mod reconnect;
pub mod state;
mod transport;
pub mod view;

pub use app::{App, AppConfig, Flow};
pub use connection::{ConnectionState, HubConnection, HubConnectionBuilder, HubEvent};
