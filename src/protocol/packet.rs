//! Request, response and event packets.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type discriminant written on every outbound packet.
pub const REQUEST_TYPE: &str = "request";

/// Error returned when a stdout line cannot be decoded into a [`Packet`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line does not start with `{`; it is plain diagnostic text.
    #[error("Line is not a JSON packet")]
    NotJson,
    /// The line looks like JSON but does not decode.
    #[error("Malformed packet: {0}")]
    Malformed(String),
    /// The packet has no usable `Type` field.
    #[error("Packet has no Type")]
    MissingType,
    /// The packet has a `Type` this client does not understand.
    #[error("Unknown packet type: {0}")]
    UnknownType(String),
}

/// Outbound request, serialized as
/// `{"Type":"request","Seq":1,"Command":"/projects","Arguments":{..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestPacket {
    #[serde(rename = "Type")]
    pub packet_type: String,
    pub seq: u64,
    pub command: String,
    #[serde(default)]
    pub arguments: Value,
}

impl RequestPacket {
    /// Create a request packet.
    #[must_use]
    pub fn new(seq: u64, command: impl Into<String>, arguments: Value) -> Self {
        Self {
            packet_type: REQUEST_TYPE.to_string(),
            seq,
            command: command.into(),
            arguments,
        }
    }

    /// Serialize to a single line, without the trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments cannot be serialized.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Response to a previously sent request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponsePacket {
    pub command: String,
    #[serde(rename = "Request_seq")]
    pub request_seq: u64,
    pub success: bool,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub message: Option<String>,
}

impl ResponsePacket {
    /// Split the response into its body or its failure message.
    ///
    /// A failed response reports `Message`, falling back to `Body`.
    ///
    /// # Errors
    ///
    /// Returns the failure message when `Success` is false.
    pub fn into_result(self) -> Result<Value, String> {
        if self.success {
            return Ok(self.body);
        }
        match (self.message, self.body) {
            (Some(message), _) => Err(message),
            (None, Value::String(body)) => Err(body),
            (None, body) => Err(body.to_string()),
        }
    }
}

/// Unsolicited event pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventPacket {
    pub event: String,
    #[serde(default)]
    pub body: Value,
}

/// A decoded inbound packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Response(ResponsePacket),
    Event(EventPacket),
}

/// Decode one stdout line.
///
/// # Errors
///
/// Returns a [`ParseError`] describing why the line is not a usable packet.
/// Callers treat every error as non-fatal.
pub fn parse_packet(line: &str) -> Result<Packet, ParseError> {
    let line = line.trim();
    if !line.starts_with('{') {
        return Err(ParseError::NotJson);
    }

    let value: Value =
        serde_json::from_str(line).map_err(|e| ParseError::Malformed(e.to_string()))?;

    let packet_type = match value.get("Type") {
        None | Some(Value::Null) => return Err(ParseError::MissingType),
        Some(Value::String(t)) if t.is_empty() => return Err(ParseError::MissingType),
        Some(Value::String(t)) => t.clone(),
        Some(other) => return Err(ParseError::UnknownType(other.to_string())),
    };

    match packet_type.as_str() {
        "response" => serde_json::from_value(value)
            .map(Packet::Response)
            .map_err(|e| ParseError::Malformed(e.to_string())),
        "event" => serde_json::from_value(value)
            .map(Packet::Event)
            .map_err(|e| ParseError::Malformed(e.to_string())),
        _ => Err(ParseError::UnknownType(packet_type)),
    }
}
