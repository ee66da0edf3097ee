//! Serialization for the two wire forms.
//!
//! The socket transport carries one JSON envelope per line with a named
//! `event` discriminator; the datagram transport carries one bare
//! `"<ev_type>,<code>,<state>"` line per packet, best-effort, no origin and
//! no acknowledgment.

use serde::{Deserialize, Serialize};

use super::event::{EventKind, RawEvent, WireEvent};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid json payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed datagram: {0}")]
    Datagram(String),

    #[error("Unknown event kind: {0}")]
    UnknownKind(String),
}

/// Envelope for the structured socket transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum WireMessage {
    GamepadEvent(WireEvent),
    ServerHello { server_id: String },
    GamepadError { message: String },
    PeerError { message: String },
}

/// Encode a message as a single JSON line (without trailing newline).
pub fn encode_line(message: &WireMessage) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode_line(line: &str) -> Result<WireMessage, CodecError> {
    Ok(serde_json::from_str(line)?)
}

/// Encode one raw event for the datagram transport.
pub fn encode_datagram(event: &RawEvent) -> String {
    format!("{},{},{}", event.kind, event.code, event.state)
}

pub fn decode_datagram(line: &str) -> Result<RawEvent, CodecError> {
    let mut parts = line.splitn(3, ',');
    let kind = parts
        .next()
        .ok_or_else(|| CodecError::Datagram(line.to_string()))?;
    let code = parts
        .next()
        .ok_or_else(|| CodecError::Datagram(line.to_string()))?;
    let state = parts
        .next()
        .ok_or_else(|| CodecError::Datagram(line.to_string()))?;

    let kind = match kind {
        "Key" => EventKind::Key,
        "Absolute" => EventKind::Absolute,
        other => return Err(CodecError::UnknownKind(other.to_string())),
    };
    let state = state
        .trim()
        .parse::<i32>()
        .map_err(|_| CodecError::Datagram(line.to_string()))?;

    Ok(RawEvent {
        kind,
        code: code.to_string(),
        state,
    })
}
