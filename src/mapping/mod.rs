//! Normalization of raw device events into canonical input
//!
//! Raw events cross the wire untouched; this module is where the receiving
//! side turns device-native codes and integer states into the fixed canonical
//! vocabulary the replay engine understands. Unrecognized codes map to
//! nothing and are dropped silently.

use serde::{Deserialize, Serialize};

use crate::protocol::{EventKind, NodeId, WireEvent};

/// Canonical axis identifiers, in wire order 0..5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisId {
    LeftX,
    LeftY,
    RightX,
    RightY,
    LeftTrigger,
    RightTrigger,
}

impl AxisId {
    pub fn index(self) -> usize {
        match self {
            AxisId::LeftX => 0,
            AxisId::LeftY => 1,
            AxisId::RightX => 2,
            AxisId::RightY => 3,
            AxisId::LeftTrigger => 4,
            AxisId::RightTrigger => 5,
        }
    }

    /// The stick this axis belongs to, if it is a stick axis.
    pub fn stick(self) -> Option<Stick> {
        match self {
            AxisId::LeftX | AxisId::LeftY => Some(Stick::Left),
            AxisId::RightX | AxisId::RightY => Some(Stick::Right),
            AxisId::LeftTrigger | AxisId::RightTrigger => None,
        }
    }

    pub fn trigger(self) -> Option<Trigger> {
        match self {
            AxisId::LeftTrigger => Some(Trigger::Left),
            AxisId::RightTrigger => Some(Trigger::Right),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stick {
    Left,
    Right,
}

impl Stick {
    /// The (x, y) axis pair owned by this stick.
    pub fn axes(self) -> (AxisId, AxisId) {
        match self {
            Stick::Left => (AxisId::LeftX, AxisId::LeftY),
            Stick::Right => (AxisId::RightX, AxisId::RightY),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    Left,
    Right,
}

/// Canonical button identifiers of the virtual pad.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PadButton {
    South,
    East,
    West,
    North,
    LeftShoulder,
    RightShoulder,
    Back,
    Start,
    LeftThumb,
    RightThumb,
}

/// One normalized input change, ready for replay.
#[derive(Clone, Debug, PartialEq)]
pub enum CanonicalInput {
    Button { button: PadButton, pressed: bool },
    Axis { axis: AxisId, value: f32 },
    /// D-pad reading; components are expected in {-1, 0, 1}.
    Hat { x: i32, y: i32 },
}

/// A canonical input together with the node that originated it.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalEvent {
    pub input: CanonicalInput,
    pub origin: NodeId,
}

/// Map a raw digital-button code to its canonical button.
///
/// BTN_START and BTN_SELECT land crossed on Back/Start; the table is kept
/// exactly as the original device mapping shipped it.
pub fn map_key(code: &str) -> Option<PadButton> {
    match code {
        "BTN_SOUTH" => Some(PadButton::South),
        "BTN_EAST" => Some(PadButton::East),
        "BTN_WEST" => Some(PadButton::West),
        "BTN_NORTH" => Some(PadButton::North),
        "BTN_TL" => Some(PadButton::LeftShoulder),
        "BTN_TR" => Some(PadButton::RightShoulder),
        "BTN_START" => Some(PadButton::Back),
        "BTN_SELECT" => Some(PadButton::Start),
        "BTN_THUMBL" => Some(PadButton::LeftThumb),
        "BTN_THUMBR" => Some(PadButton::RightThumb),
        _ => None,
    }
}

/// Map a raw absolute-axis code and state to canonical input.
///
/// Stick readings divide by 32767 without clamping; out-of-range raw values
/// pass through unchanged. Triggers rescale their 0..255 range into -1..1 so
/// all axes share one value domain. The hat's y component is negated to match
/// the virtual-controller "up" convention.
pub fn map_absolute(code: &str, state: i32) -> Option<CanonicalInput> {
    match code {
        "ABS_X" => Some(CanonicalInput::Axis {
            axis: AxisId::LeftX,
            value: state as f32 / 32767.0,
        }),
        "ABS_Y" => Some(CanonicalInput::Axis {
            axis: AxisId::LeftY,
            value: state as f32 / 32767.0,
        }),
        "ABS_RX" => Some(CanonicalInput::Axis {
            axis: AxisId::RightX,
            value: state as f32 / 32767.0,
        }),
        "ABS_RY" => Some(CanonicalInput::Axis {
            axis: AxisId::RightY,
            value: state as f32 / 32767.0,
        }),
        "ABS_Z" => Some(CanonicalInput::Axis {
            axis: AxisId::LeftTrigger,
            value: (state as f32 / 255.0) * 2.0 - 1.0,
        }),
        "ABS_RZ" => Some(CanonicalInput::Axis {
            axis: AxisId::RightTrigger,
            value: (state as f32 / 255.0) * 2.0 - 1.0,
        }),
        "ABS_HAT0X" => Some(CanonicalInput::Hat { x: state, y: 0 }),
        "ABS_HAT0Y" => Some(CanonicalInput::Hat { x: 0, y: -state }),
        _ => None,
    }
}

/// Normalize a raw (kind, code, state) triple.
pub fn map_raw(kind: EventKind, code: &str, state: i32) -> Option<CanonicalInput> {
    match kind {
        EventKind::Key => map_key(code).map(|button| CanonicalInput::Button {
            button,
            pressed: state == 1,
        }),
        EventKind::Absolute => map_absolute(code, state),
    }
}

/// Normalize a wire event, carrying its origin along.
pub fn canonicalize(event: &WireEvent) -> Option<CanonicalEvent> {
    map_raw(event.kind, &event.code, event.state).map(|input| CanonicalEvent {
        input,
        origin: event.origin.clone(),
    })
}
