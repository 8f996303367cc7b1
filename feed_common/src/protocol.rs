//! JSON hub protocol codec.
//!
//! Every message is a JSON object terminated by the record separator `0x1E`. A
//! single WebSocket text frame may carry several records. The connection opens
//! with a handshake record in each direction; after that every record carries
//! a numeric `type`:
//!
//! | type | message            |
//! |------|--------------------|
//! | 1    | Invocation         |
//! | 2    | StreamItem         |
//! | 3    | Completion         |
//! | 4    | StreamInvocation   |
//! | 5    | CancelInvocation   |
//! | 6    | Ping               |
//! | 7    | Close              |
//!
//! Types this client has no use for are surfaced as [`HubMessage::Other`].
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HubError;
use crate::result::Result;

/// Terminator of every JSON record.
pub const RECORD_SEPARATOR: char = '\u{1e}';
/// Name of the hub protocol this codec speaks.
pub const PROTOCOL_NAME: &str = "json";
/// Version of the hub protocol this codec speaks.
pub const PROTOCOL_VERSION: u32 = 1;

const INVOCATION: u64 = 1;
const STREAM_ITEM: u64 = 2;
const COMPLETION: u64 = 3;
const STREAM_INVOCATION: u64 = 4;
const CANCEL_INVOCATION: u64 = 5;
const PING: u64 = 6;
const CLOSE: u64 = 7;

/// First record sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Protocol name, always `json` here.
    pub protocol: String,
    /// Protocol version.
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        HandshakeRequest {
            protocol: String::from(PROTOCOL_NAME),
            version: PROTOCOL_VERSION,
        }
    }
}

impl HandshakeRequest {
    /// Encode as a terminated record.
    pub fn encode(&self) -> Result<String> {
        terminate(serde_json::to_string(self)?)
    }
}

/// First record sent by the server. An empty object means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HandshakeResponse {
    /// Reason the server rejected the handshake.
    #[serde(default)]
    pub error: Option<String>,
}

impl HandshakeResponse {
    /// Split the handshake record off the front of `text`.
    ///
    /// Returns the response together with whatever followed it in the same
    /// frame; that remainder holds ordinary hub messages.
    pub fn parse(text: &str) -> Result<(HandshakeResponse, &str)> {
        let end = text
            .find(RECORD_SEPARATOR)
            .ok_or_else(|| HubError::Protocol(String::from("Message is incomplete.")))?;
        let response: HandshakeResponse = serde_json::from_str(&text[..end])
            .map_err(|e| HubError::Handshake(format!("invalid handshake response: {}", e)))?;
        Ok((response, &text[end + RECORD_SEPARATOR.len_utf8()..]))
    }

    /// `Err` carrying the server's reason if the handshake was rejected.
    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(error) => Err(HubError::Handshake(error)),
            None => Ok(()),
        }
    }
}

/// Call of a named method, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    /// Present when the caller expects a Completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    /// Method or event name.
    pub target: String,
    /// Positional arguments.
    #[serde(default)]
    pub arguments: Vec<Value>,
    /// Ids of client-to-server streams passed as arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_ids: Option<Vec<String>>,
}

/// Outcome of an invocation that carried an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// Id of the invocation being completed.
    pub invocation_id: String,
    /// Return value, absent for `void` methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure reason; mutually exclusive with `result`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Completion {
    /// The return value (`Null` for `void` methods) or the server's error.
    pub fn into_result(self) -> std::result::Result<Value, String> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// One item of a server-to-client stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamItem {
    /// Id of the stream invocation.
    pub invocation_id: String,
    /// The streamed value.
    #[serde(default)]
    pub item: Value,
}

/// Request to stop a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelInvocation {
    /// Id of the stream invocation.
    pub invocation_id: String,
}

/// Sent by the server right before it closes the connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Close {
    /// Why the server closed the connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the client may reconnect.
    #[serde(default)]
    pub allow_reconnect: bool,
}

/// A decoded hub record.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Type 1.
    Invocation(Invocation),
    /// Type 2.
    StreamItem(StreamItem),
    /// Type 3.
    Completion(Completion),
    /// Type 4.
    StreamInvocation(Invocation),
    /// Type 5.
    CancelInvocation(CancelInvocation),
    /// Type 6, keep-alive.
    Ping,
    /// Type 7.
    Close(Close),
    /// A well-formed record of a type this client ignores.
    Other(u64),
}

impl HubMessage {
    /// Numeric `type` of the record.
    pub fn message_type(&self) -> u64 {
        match self {
            HubMessage::Invocation(_) => INVOCATION,
            HubMessage::StreamItem(_) => STREAM_ITEM,
            HubMessage::Completion(_) => COMPLETION,
            HubMessage::StreamInvocation(_) => STREAM_INVOCATION,
            HubMessage::CancelInvocation(_) => CANCEL_INVOCATION,
            HubMessage::Ping => PING,
            HubMessage::Close(_) => CLOSE,
            HubMessage::Other(kind) => *kind,
        }
    }

    /// Encode as a terminated record.
    pub fn encode(&self) -> Result<String> {
        let body = match self {
            HubMessage::Invocation(m) | HubMessage::StreamInvocation(m) => serde_json::to_value(m)?,
            HubMessage::StreamItem(m) => serde_json::to_value(m)?,
            HubMessage::Completion(m) => serde_json::to_value(m)?,
            HubMessage::CancelInvocation(m) => serde_json::to_value(m)?,
            HubMessage::Close(m) => serde_json::to_value(m)?,
            HubMessage::Ping | HubMessage::Other(_) => Value::Object(Map::new()),
        };
        let mut object = match body {
            Value::Object(object) => object,
            _ => return Err(HubError::Protocol(String::from("message body is not an object"))),
        };
        object.insert(String::from("type"), Value::from(self.message_type()));
        terminate(serde_json::to_string(&object)?)
    }

    /// Decode every record in a text frame.
    ///
    /// The frame must end with a record separator; empty records are skipped.
    pub fn parse(text: &str) -> Result<Vec<HubMessage>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        if !text.ends_with(RECORD_SEPARATOR) {
            return Err(HubError::Protocol(String::from("Message is incomplete.")));
        }
        text.split(RECORD_SEPARATOR)
            .filter(|record| !record.is_empty())
            .map(Self::parse_record)
            .collect()
    }

    fn parse_record(record: &str) -> Result<HubMessage> {
        let value: Value = serde_json::from_str(record)?;
        let kind = value
            .get("type")
            .and_then(Value::as_u64)
            .ok_or_else(|| HubError::Protocol(String::from("Invalid payload: missing type.")))?;
        let message = match kind {
            INVOCATION => HubMessage::Invocation(serde_json::from_value(value)?),
            STREAM_ITEM => HubMessage::StreamItem(serde_json::from_value(value)?),
            COMPLETION => HubMessage::Completion(serde_json::from_value(value)?),
            STREAM_INVOCATION => HubMessage::StreamInvocation(serde_json::from_value(value)?),
            CANCEL_INVOCATION => HubMessage::CancelInvocation(serde_json::from_value(value)?),
            PING => HubMessage::Ping,
            CLOSE => HubMessage::Close(serde_json::from_value(value)?),
            other => HubMessage::Other(other),
        };
        Ok(message)
    }
}

fn terminate(mut json: String) -> Result<String> {
    json.push(RECORD_SEPARATOR);
    Ok(json)
}
