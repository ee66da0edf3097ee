//! Physical input device access
//!
//! Opens the evdev device backing the physical pad and converts its events
//! into the code-string form that travels over the wire. Only the codes the
//! relay understands are forwarded; everything else (sync reports, misc
//! events, unrelated keys) is skipped at the source.

use evdev::{AbsoluteAxisCode, Device, EventSummary, InputEvent, KeyCode};
use tracing::info;

use crate::protocol::{EventKind, RawEvent};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No gamepad-like input device found")]
    NotFound,

    #[error("Failed to open input device {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to create device event stream: {0}")]
    Stream(std::io::Error),
}

/// Open the physical pad, either from an explicit path or by scanning for
/// the first device that advertises BTN_SOUTH.
pub fn open_device(path: Option<&str>) -> Result<Device, DeviceError> {
    if let Some(path) = path {
        let device = Device::open(path).map_err(|source| DeviceError::Open {
            path: path.to_string(),
            source,
        })?;
        info!(
            "opened input device {} ({})",
            device.name().unwrap_or("<unnamed>"),
            path
        );
        return Ok(device);
    }

    for (path, device) in evdev::enumerate() {
        let is_gamepad = device
            .supported_keys()
            .map_or(false, |keys| keys.contains(KeyCode::BTN_SOUTH));
        if is_gamepad {
            info!(
                "selected input device {} ({})",
                device.name().unwrap_or("<unnamed>"),
                path.display()
            );
            return Ok(device);
        }
    }

    Err(DeviceError::NotFound)
}

/// Convert one kernel input event into the wire's raw form.
pub fn raw_event(event: InputEvent) -> Option<RawEvent> {
    match event.destructure() {
        EventSummary::Key(_, key, state) => key_name(key).map(|code| RawEvent {
            kind: EventKind::Key,
            code: code.to_string(),
            state,
        }),
        EventSummary::AbsoluteAxis(_, axis, state) => axis_name(axis).map(|code| RawEvent {
            kind: EventKind::Absolute,
            code: code.to_string(),
            state,
        }),
        _ => None,
    }
}

// BTN_MODE is forwarded even though no virtual button maps to it; the
// receiving side drops it like any other unmapped code.
fn key_name(key: KeyCode) -> Option<&'static str> {
    match key {
        KeyCode::BTN_SOUTH => Some("BTN_SOUTH"),
        KeyCode::BTN_EAST => Some("BTN_EAST"),
        KeyCode::BTN_WEST => Some("BTN_WEST"),
        KeyCode::BTN_NORTH => Some("BTN_NORTH"),
        KeyCode::BTN_TL => Some("BTN_TL"),
        KeyCode::BTN_TR => Some("BTN_TR"),
        KeyCode::BTN_SELECT => Some("BTN_SELECT"),
        KeyCode::BTN_START => Some("BTN_START"),
        KeyCode::BTN_MODE => Some("BTN_MODE"),
        KeyCode::BTN_THUMBL => Some("BTN_THUMBL"),
        KeyCode::BTN_THUMBR => Some("BTN_THUMBR"),
        _ => None,
    }
}

fn axis_name(axis: AbsoluteAxisCode) -> Option<&'static str> {
    match axis {
        AbsoluteAxisCode::ABS_X => Some("ABS_X"),
        AbsoluteAxisCode::ABS_Y => Some("ABS_Y"),
        AbsoluteAxisCode::ABS_RX => Some("ABS_RX"),
        AbsoluteAxisCode::ABS_RY => Some("ABS_RY"),
        AbsoluteAxisCode::ABS_Z => Some("ABS_Z"),
        AbsoluteAxisCode::ABS_RZ => Some("ABS_RZ"),
        AbsoluteAxisCode::ABS_HAT0X => Some("ABS_HAT0X"),
        AbsoluteAxisCode::ABS_HAT0Y => Some("ABS_HAT0Y"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    #[test]
    fn test_known_key_converts() {
        let ev = InputEvent::new(EventType::KEY.0, KeyCode::BTN_SOUTH.0, 1);
        assert_eq!(
            raw_event(ev),
            Some(RawEvent {
                kind: EventKind::Key,
                code: "BTN_SOUTH".to_string(),
                state: 1,
            })
        );
    }

    #[test]
    fn test_known_axis_converts() {
        let ev = InputEvent::new(EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_HAT0Y.0, -1);
        assert_eq!(
            raw_event(ev),
            Some(RawEvent {
                kind: EventKind::Absolute,
                code: "ABS_HAT0Y".to_string(),
                state: -1,
            })
        );
    }

    #[test]
    fn test_sync_and_unknown_events_are_skipped() {
        let sync = InputEvent::new(EventType::SYNCHRONIZATION.0, 0, 0);
        assert_eq!(raw_event(sync), None);

        let volume = InputEvent::new(EventType::KEY.0, KeyCode::KEY_VOLUMEUP.0, 1);
        assert_eq!(raw_event(volume), None);
    }
}
