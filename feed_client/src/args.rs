//! Command-line arguments for the feed client.
//!
//! This module defines the CLI interface using `clap` and turns it into an
//! [`AppConfig`]. See `main` for end-to-end usage.
use clap::Parser;
use feed_common::HubProfile;
use feed_common::time_format::DisplayZone;

use crate::app::AppConfig;
use crate::reconnect::ReconnectPolicy;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about = "Live trade and quote feed from a stock hub", long_about = None)]
pub struct Args {
    /// Hub deployment to connect to.
    #[clap(long, value_enum, default_value_t = HubProfile::Stock)]
    pub profile: HubProfile,

    /// Hub URL overriding the profile's fixed endpoint.
    #[clap(long)]
    pub url: Option<String>,

    /// Connect the WebSocket directly instead of negotiating first.
    #[clap(long)]
    pub skip_negotiation: bool,

    /// Do not reconnect after losing the connection.
    #[clap(long)]
    pub no_reconnect: bool,

    /// Show timestamps in UTC instead of local time.
    #[clap(long)]
    pub utc: bool,

    /// Append pages instead of clearing the terminal before each redraw.
    #[clap(long)]
    pub no_clear: bool,
}

impl Args {
    /// Resolve into an application configuration. `is_terminal` tells whether
    /// stdout can be cleared.
    pub fn to_config(&self, is_terminal: bool) -> AppConfig {
        let hub_url = self
            .url
            .as_deref()
            .map(|url| url.trim().replace('"', ""))
            .unwrap_or_else(|| self.profile.hub_url());
        AppConfig {
            hub_url,
            subscribe_method: self.profile.subscribe_method(),
            skip_negotiation: self.skip_negotiation,
            reconnect: (!self.no_reconnect).then(ReconnectPolicy::default),
            zone: if self.utc {
                DisplayZone::Utc
            } else {
                DisplayZone::Local
            },
            clear_screen: is_terminal && !self.no_clear,
        }
    }
}
