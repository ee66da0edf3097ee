use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Device event class as reported by the input subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Key,
    Absolute,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Key => write!(f, "Key"),
            EventKind::Absolute => write!(f, "Absolute"),
        }
    }
}

/// One raw input change drained from the physical device.
///
/// `code` is the device-native identifier (e.g. `BTN_SOUTH`, `ABS_X`) and
/// `state` the unscaled integer reading. Consumed once; normalization happens
/// on the applying side, not before transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub code: String,
    pub state: i32,
}

/// Identity of a running relay node.
///
/// Stamped into every generated event so a receiving node can tell
/// self-originated feedback from genuinely remote input. Either taken from
/// the `SERVER_ID` override or generated fresh per process start.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The transport unit: a raw event plus the identity of the node that read it
/// from hardware.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub code: String,
    pub state: i32,
    pub origin: NodeId,
}

impl WireEvent {
    pub fn from_raw(raw: RawEvent, origin: &NodeId) -> Self {
        Self {
            kind: raw.kind,
            code: raw.code,
            state: raw.state,
            origin: origin.clone(),
        }
    }
}
