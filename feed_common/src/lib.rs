//!
//! Common types and utilities shared by the market feed client and its tests.
//!
//! This crate aggregates:
//! - `error`: unified error type `HubError` used across the workspace.
//! - `result`: handy `Result<T, HubError>` alias.
//! - `protocol`: JSON hub protocol records and their codec.
//! - `trade`, `quote`, `subscription`, `market_event`: market data model.
//! - `time_format`: `en-GB` timestamp rendering.
//! - `profile`, `net`: known hub deployments and their wire names.
#![warn(missing_docs)]
pub mod error;
pub mod market_event;
pub mod net;
pub mod profile;
pub mod protocol;
pub mod quote;
pub mod result;
pub mod subscription;
pub mod time_format;
pub mod trade;

pub use error::HubError;
pub use market_event::MarketEvent;
pub use profile::HubProfile;
pub use quote::StockQuote;
pub use result::Result;
pub use subscription::Subscription;
pub use trade::StockTrade;
