//! Virtual pad backed by a uinput device with an Xbox-360-style layout.

use evdev::uinput::VirtualDevice;
use evdev::{
    AbsInfo, AbsoluteAxisCode, AttributeSet, EventType, InputEvent, KeyCode, UinputAbsSetup,
};
use tracing::info;

use crate::mapping::{PadButton, Stick, Trigger};

use super::pad::{PadError, VirtualPad};

const STICK_RANGE: i32 = 32767;
const TRIGGER_MAX: i32 = 255;

/// Accumulates input events and flushes them on commit.
pub struct UinputPad {
    device: VirtualDevice,
    queued: Vec<InputEvent>,
}

impl UinputPad {
    /// Create the virtual device. Failure here is fatal for the process.
    pub fn create(name: &str) -> Result<Self, PadError> {
        let device = build_device(name).map_err(PadError::Open)?;
        info!("created virtual pad '{}'", name);
        Ok(Self {
            device,
            queued: Vec::new(),
        })
    }
}

fn build_device(name: &str) -> std::io::Result<VirtualDevice> {
    let stick_info = AbsInfo::new(0, -STICK_RANGE, STICK_RANGE, 16, 128, 0);
    let trigger_info = AbsInfo::new(0, 0, TRIGGER_MAX, 0, 0, 0);
    let hat_info = AbsInfo::new(0, -1, 1, 0, 0, 0);

    let mut buttons: AttributeSet<KeyCode> = AttributeSet::default();
    buttons.insert(KeyCode::BTN_SOUTH);
    buttons.insert(KeyCode::BTN_EAST);
    buttons.insert(KeyCode::BTN_WEST);
    buttons.insert(KeyCode::BTN_NORTH);
    buttons.insert(KeyCode::BTN_TL);
    buttons.insert(KeyCode::BTN_TR);
    buttons.insert(KeyCode::BTN_SELECT);
    buttons.insert(KeyCode::BTN_START);
    buttons.insert(KeyCode::BTN_THUMBL);
    buttons.insert(KeyCode::BTN_THUMBR);

    VirtualDevice::builder()?
        .name(name)
        .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisCode::ABS_X, stick_info))?
        .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisCode::ABS_Y, stick_info))?
        .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisCode::ABS_RX, stick_info))?
        .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisCode::ABS_RY, stick_info))?
        .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisCode::ABS_Z, trigger_info))?
        .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisCode::ABS_RZ, trigger_info))?
        // Part of the standard pad layout even though replay steers the hat
        // onto the left stick.
        .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0X, hat_info))?
        .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0Y, hat_info))?
        .with_keys(&buttons)?
        .build()
}

fn key_code(button: PadButton) -> KeyCode {
    match button {
        PadButton::South => KeyCode::BTN_SOUTH,
        PadButton::East => KeyCode::BTN_EAST,
        PadButton::West => KeyCode::BTN_WEST,
        PadButton::North => KeyCode::BTN_NORTH,
        PadButton::LeftShoulder => KeyCode::BTN_TL,
        PadButton::RightShoulder => KeyCode::BTN_TR,
        PadButton::Back => KeyCode::BTN_SELECT,
        PadButton::Start => KeyCode::BTN_START,
        PadButton::LeftThumb => KeyCode::BTN_THUMBL,
        PadButton::RightThumb => KeyCode::BTN_THUMBR,
    }
}

fn stick_codes(stick: Stick) -> (AbsoluteAxisCode, AbsoluteAxisCode) {
    match stick {
        Stick::Left => (AbsoluteAxisCode::ABS_X, AbsoluteAxisCode::ABS_Y),
        Stick::Right => (AbsoluteAxisCode::ABS_RX, AbsoluteAxisCode::ABS_RY),
    }
}

fn trigger_code(trigger: Trigger) -> AbsoluteAxisCode {
    match trigger {
        Trigger::Left => AbsoluteAxisCode::ABS_Z,
        Trigger::Right => AbsoluteAxisCode::ABS_RZ,
    }
}

fn stick_units(value: f32) -> i32 {
    (value * STICK_RANGE as f32) as i32
}

impl VirtualPad for UinputPad {
    fn press(&mut self, button: PadButton) {
        self.queued
            .push(InputEvent::new(EventType::KEY.0, key_code(button).0, 1));
    }

    fn release(&mut self, button: PadButton) {
        self.queued
            .push(InputEvent::new(EventType::KEY.0, key_code(button).0, 0));
    }

    fn set_stick(&mut self, stick: Stick, x: f32, y: f32) {
        let (x_code, y_code) = stick_codes(stick);
        self.queued
            .push(InputEvent::new(EventType::ABSOLUTE.0, x_code.0, stick_units(x)));
        self.queued
            .push(InputEvent::new(EventType::ABSOLUTE.0, y_code.0, stick_units(y)));
    }

    fn set_trigger(&mut self, trigger: Trigger, pressure: u8) {
        self.queued.push(InputEvent::new(
            EventType::ABSOLUTE.0,
            trigger_code(trigger).0,
            pressure as i32,
        ));
    }

    fn commit(&mut self) -> Result<(), PadError> {
        if self.queued.is_empty() {
            return Ok(());
        }
        // emit appends the SYN_REPORT itself.
        self.device.emit(&self.queued).map_err(PadError::Commit)?;
        self.queued.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stick_units_cover_full_range() {
        assert_eq!(stick_units(1.0), 32767);
        assert_eq!(stick_units(-1.0), -32767);
        assert_eq!(stick_units(0.0), 0);
    }

    #[test]
    fn test_button_layout_matches_canonical_set() {
        // Back/Start mirror the evdev select/start pair.
        assert_eq!(key_code(PadButton::Back), KeyCode::BTN_SELECT);
        assert_eq!(key_code(PadButton::Start), KeyCode::BTN_START);
        assert_eq!(key_code(PadButton::South), KeyCode::BTN_SOUTH);
    }
}
