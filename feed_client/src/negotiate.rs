//! Negotiation: the HTTP round trip that precedes the WebSocket.
//!
//! `POST {hub}/negotiate?negotiateVersion=1` answers with a connection token
//! and the transports the server offers, or redirects the client to another
//! hub URL with an access token. This client only speaks WebSockets with text
//! frames.
use std::time::Duration;

use feed_common::{HubError, Result};
use log::{debug, info};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;

/// Negotiate protocol version requested from the server.
pub const NEGOTIATE_VERSION: u32 = 1;
/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 100;

const WEB_SOCKETS: &str = "WebSockets";
const TEXT_FORMAT: &str = "Text";

/// Transport entry of a negotiate response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTransport {
    /// Transport name, e.g. `WebSockets`.
    pub transport: String,
    /// Frame formats supported on that transport.
    #[serde(default)]
    pub transfer_formats: Vec<String>,
}

/// Body of a negotiate response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    /// Public connection id.
    #[serde(default)]
    pub connection_id: Option<String>,
    /// Token identifying the connection (negotiate version 1).
    #[serde(default)]
    pub connection_token: Option<String>,
    /// Version the server answered with; 0 when absent.
    #[serde(default)]
    pub negotiate_version: Option<u32>,
    /// Transports the server offers.
    #[serde(default)]
    pub available_transports: Vec<AvailableTransport>,
    /// Redirect target.
    #[serde(default)]
    pub url: Option<String>,
    /// Bearer token to present at the redirect target.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Server-side failure.
    #[serde(default)]
    pub error: Option<String>,
}

/// What the client should do with a negotiate response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Negotiate again against another hub.
    Redirect {
        /// New hub URL.
        url: String,
        /// Token for the new hub.
        access_token: Option<String>,
    },
    /// Open the WebSocket, passing `token` as the `id` query parameter.
    Connect {
        /// Connection token, if the server issued one.
        token: Option<String>,
    },
}

impl NegotiateResponse {
    /// Decide between redirecting and connecting.
    pub fn resolve(self) -> Result<Resolution> {
        if let Some(error) = self.error {
            return Err(HubError::Negotiation(error));
        }
        if let Some(url) = self.url {
            return Ok(Resolution::Redirect {
                url,
                access_token: self.access_token,
            });
        }
        let offers_websockets = self.available_transports.iter().any(|t| {
            t.transport == WEB_SOCKETS && t.transfer_formats.iter().any(|f| f == TEXT_FORMAT)
        });
        if !offers_websockets {
            return Err(HubError::Negotiation(String::from(
                "Unable to connect to the server with any of the available transports.",
            )));
        }
        let token = if self.negotiate_version.unwrap_or(0) >= 1 {
            self.connection_token
        } else {
            self.connection_id
        };
        Ok(Resolution::Connect { token })
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| HubError::Negotiation(format!("invalid hub URL {}: {}", raw, e)))
}

/// `{hub}/negotiate?negotiateVersion=1`, keeping any query the hub URL had.
pub fn negotiate_url(hub: &str) -> Result<Url> {
    let mut url = parse_url(hub)?;
    let path = format!("{}/negotiate", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut()
        .append_pair("negotiateVersion", &NEGOTIATE_VERSION.to_string());
    Ok(url)
}

/// WebSocket URL for `hub`: `http`→`ws`, `https`→`wss`, plus the optional
/// `id` and `access_token` query parameters.
pub fn websocket_url(hub: &str, token: Option<&str>, access_token: Option<&str>) -> Result<Url> {
    let mut url = parse_url(hub)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(HubError::Negotiation(format!(
                "unsupported URL scheme: {}",
                other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| HubError::Negotiation(format!("cannot switch {} to {}", hub, scheme)))?;
    if token.is_some() || access_token.is_some() {
        let mut query = url.query_pairs_mut();
        if let Some(token) = token {
            query.append_pair("id", token);
        }
        if let Some(access_token) = access_token {
            query.append_pair("access_token", access_token);
        }
    }
    Ok(url)
}

/// Run negotiation against `hub`, following redirects, and return the
/// WebSocket URL to open. Each request is bounded by `timeout`.
pub fn negotiate(hub: &str, timeout: Duration) -> Result<Url> {
    let client = Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(|e| HubError::Negotiation(e.to_string()))?;
    let mut hub = String::from(hub);
    let mut access_token: Option<String> = None;

    for _ in 0..MAX_REDIRECTS {
        let url = negotiate_url(&hub)?;
        debug!("Sending negotiation request: {}", url);
        let mut request = client.post(url);
        if let Some(token) = access_token.as_deref() {
            request = request.bearer_auth(token);
        }
        let response: NegotiateResponse = request
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| HubError::Negotiation(e.to_string()))?;

        match response.resolve()? {
            Resolution::Redirect { url, access_token: token } => {
                info!("Negotiation redirected to {}", url);
                hub = url;
                access_token = token;
            }
            Resolution::Connect { token } => {
                return websocket_url(&hub, token.as_deref(), access_token.as_deref());
            }
        }
    }
    Err(HubError::Negotiation(String::from(
        "Negotiate redirection limit exceeded.",
    )))
}
