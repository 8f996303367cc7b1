//! Error types shared by the hub protocol layer and the feed client.
//!
//! The `HubError` enum unifies transport, protocol, and invocation failures so
//! that every layer can propagate a single error type with `?`.
use std::io;

use thiserror::Error;

/// Unified error type shared across the workspace.
#[derive(Error, Debug)]
pub enum HubError {
    /// I/O error originating from sockets or the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// WebSocket-level failure (connect, read, write).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The negotiate request failed or returned an unusable response.
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// The server rejected or never answered the protocol handshake.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// A frame that does not follow the JSON hub protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server completed an invocation with an error message.
    #[error("Invocation failed: {0}")]
    Invocation(String),

    /// An invocation was attempted while the connection was not usable.
    #[error("Cannot send data if the connection is not in the 'Connected' state (current: {0})")]
    NotConnected(String),

    /// The connection went away while something was still waiting on it.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// A console line that is not a known command.
    #[error("Invalid command: {0}")]
    Command(String),

    /// An operation that is not valid for the current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
