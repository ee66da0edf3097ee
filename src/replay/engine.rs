use tracing::trace;

use crate::mapping::{AxisId, CanonicalEvent, CanonicalInput, Stick};

use super::pad::{PadError, VirtualPad};

/// Minimum stick movement that gets replayed; smaller deltas are jitter.
pub const AXIS_EPSILON: f32 = 0.02;

/// Last-applied value per canonical axis, one instance per virtual pad.
///
/// A stick commits both of its axes together, so when one axis updates the
/// partner value is read back from here instead of being recomputed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AxisState {
    values: [f32; 6],
}

impl AxisState {
    pub fn value(&self, axis: AxisId) -> f32 {
        self.values[axis.index()]
    }

    fn set(&mut self, axis: AxisId, value: f32) {
        self.values[axis.index()] = value;
    }
}

/// Applies canonical events to one virtual controller.
///
/// Owns the pad handle and its [`AxisState`] exclusively; callers serialize
/// access by owning the engine from a single task.
pub struct ReplayEngine<P: VirtualPad> {
    pad: P,
    axes: AxisState,
}

impl<P: VirtualPad> ReplayEngine<P> {
    pub fn new(pad: P) -> Self {
        Self {
            pad,
            axes: AxisState::default(),
        }
    }

    pub fn axis_state(&self) -> &AxisState {
        &self.axes
    }

    pub fn pad(&self) -> &P {
        &self.pad
    }

    /// Apply one canonical event and commit the resulting pad state.
    ///
    /// Every accepted change is committed immediately, never batched across
    /// events. Sub-epsilon stick movement is dropped without a commit.
    pub fn apply(&mut self, event: &CanonicalEvent) -> Result<(), PadError> {
        self.apply_input(&event.input)
    }

    pub fn apply_input(&mut self, input: &CanonicalInput) -> Result<(), PadError> {
        match input {
            CanonicalInput::Button { button, pressed } => {
                if *pressed {
                    self.pad.press(*button);
                } else {
                    self.pad.release(*button);
                }
                self.pad.commit()
            }
            CanonicalInput::Axis { axis, value } => self.apply_axis(*axis, *value),
            CanonicalInput::Hat { x, y } => self.apply_hat(*x, *y),
        }
    }

    fn apply_axis(&mut self, axis: AxisId, value: f32) -> Result<(), PadError> {
        if let Some(trigger) = axis.trigger() {
            // Triggers are not jitter-filtered.
            self.axes.set(axis, value);
            self.pad.set_trigger(trigger, trigger_pressure(value));
            return self.pad.commit();
        }

        let delta = value - self.axes.value(axis);
        if delta.abs() < AXIS_EPSILON {
            trace!("dropping sub-epsilon move on {:?}: {:.4}", axis, delta);
            return Ok(());
        }

        self.axes.set(axis, value);
        let stick = match axis.stick() {
            Some(stick) => stick,
            None => return Ok(()),
        };
        let (x_axis, y_axis) = stick.axes();
        self.pad
            .set_stick(stick, self.axes.value(x_axis), self.axes.value(y_axis));
        self.pad.commit()
    }

    /// Translate a hat reading into an absolute left-stick position.
    ///
    /// Components never combine diagonally; when both are nonzero the y
    /// branch wins because it runs last. The hat bypasses [`AxisState`].
    fn apply_hat(&mut self, x: i32, y: i32) -> Result<(), PadError> {
        if x == -1 {
            self.pad.set_stick(Stick::Left, -1.0, 0.0);
        }
        if x == 1 {
            self.pad.set_stick(Stick::Left, 1.0, 0.0);
        }
        if y == -1 {
            self.pad.set_stick(Stick::Left, 0.0, -1.0);
        }
        if y == 1 {
            self.pad.set_stick(Stick::Left, 0.0, 1.0);
        }
        if x == 0 && y == 0 {
            self.pad.set_stick(Stick::Left, 0.0, 0.0);
        }
        self.pad.commit()
    }
}

/// Rescale a -1..1 canonical trigger value back to 0..255 pressure.
pub fn trigger_pressure(value: f32) -> u8 {
    ((value + 1.0) / 2.0 * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{PadButton, Trigger};

    /// Records every pad call so tests can assert on the exact sequence.
    #[derive(Debug, Default)]
    struct MockPad {
        calls: Vec<PadCall>,
        commits: usize,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum PadCall {
        Press(PadButton),
        Release(PadButton),
        Stick(Stick, f32, f32),
        Trigger(Trigger, u8),
    }

    impl VirtualPad for MockPad {
        fn press(&mut self, button: PadButton) {
            self.calls.push(PadCall::Press(button));
        }

        fn release(&mut self, button: PadButton) {
            self.calls.push(PadCall::Release(button));
        }

        fn set_stick(&mut self, stick: Stick, x: f32, y: f32) {
            self.calls.push(PadCall::Stick(stick, x, y));
        }

        fn set_trigger(&mut self, trigger: Trigger, pressure: u8) {
            self.calls.push(PadCall::Trigger(trigger, pressure));
        }

        fn commit(&mut self) -> Result<(), PadError> {
            self.commits += 1;
            Ok(())
        }
    }

    fn axis(axis: AxisId, value: f32) -> CanonicalInput {
        CanonicalInput::Axis { axis, value }
    }

    #[test]
    fn test_sub_epsilon_stick_moves_never_commit() {
        for target in [AxisId::LeftX, AxisId::LeftY, AxisId::RightX, AxisId::RightY] {
            let mut engine = ReplayEngine::new(MockPad::default());
            engine.apply_input(&axis(target, 0.019)).unwrap();
            engine.apply_input(&axis(target, 0.01)).unwrap();

            assert!(engine.pad().calls.is_empty(), "{target:?} moved the pad");
            assert_eq!(engine.pad().commits, 0);
            assert_eq!(engine.axis_state().value(target), 0.0);
        }
    }

    #[test]
    fn test_stick_update_commits_pair_with_stored_partner() {
        let mut engine = ReplayEngine::new(MockPad::default());
        engine.apply_input(&axis(AxisId::LeftY, -0.5)).unwrap();
        engine.apply_input(&axis(AxisId::LeftX, 0.25)).unwrap();

        assert_eq!(
            engine.pad().calls,
            vec![
                PadCall::Stick(Stick::Left, 0.0, -0.5),
                PadCall::Stick(Stick::Left, 0.25, -0.5),
            ]
        );
        assert_eq!(engine.pad().commits, 2);
        // Only the targeted axis changed in state each time.
        assert_eq!(engine.axis_state().value(AxisId::LeftX), 0.25);
        assert_eq!(engine.axis_state().value(AxisId::LeftY), -0.5);
        assert_eq!(engine.axis_state().value(AxisId::RightX), 0.0);
    }

    #[test]
    fn test_sticks_are_independent() {
        let mut engine = ReplayEngine::new(MockPad::default());
        engine.apply_input(&axis(AxisId::RightX, 0.8)).unwrap();

        assert_eq!(
            engine.pad().calls,
            vec![PadCall::Stick(Stick::Right, 0.8, 0.0)]
        );
        assert_eq!(engine.axis_state().value(AxisId::LeftX), 0.0);
    }

    #[test]
    fn test_trigger_pressure_endpoints_and_center() {
        assert_eq!(trigger_pressure(-1.0), 0);
        assert_eq!(trigger_pressure(1.0), 255);
        // Rounding rule is round-half-away-from-zero: 127.5 -> 128.
        assert_eq!(trigger_pressure(0.0), 128);
    }

    #[test]
    fn test_triggers_always_commit_even_for_tiny_deltas() {
        let mut engine = ReplayEngine::new(MockPad::default());
        engine.apply_input(&axis(AxisId::LeftTrigger, -1.0)).unwrap();
        engine.apply_input(&axis(AxisId::LeftTrigger, -0.995)).unwrap();
        engine.apply_input(&axis(AxisId::RightTrigger, 1.0)).unwrap();

        assert_eq!(
            engine.pad().calls,
            vec![
                PadCall::Trigger(Trigger::Left, 0),
                PadCall::Trigger(Trigger::Left, 1),
                PadCall::Trigger(Trigger::Right, 255),
            ]
        );
        assert_eq!(engine.pad().commits, 3);
    }

    #[test]
    fn test_button_press_and_release_commit() {
        let mut engine = ReplayEngine::new(MockPad::default());
        engine
            .apply_input(&CanonicalInput::Button {
                button: PadButton::South,
                pressed: true,
            })
            .unwrap();
        engine
            .apply_input(&CanonicalInput::Button {
                button: PadButton::South,
                pressed: false,
            })
            .unwrap();

        assert_eq!(
            engine.pad().calls,
            vec![
                PadCall::Press(PadButton::South),
                PadCall::Release(PadButton::South),
            ]
        );
        assert_eq!(engine.pad().commits, 2);
    }

    #[test]
    fn test_hat_drives_left_stick_to_full_deflection() {
        let mut engine = ReplayEngine::new(MockPad::default());
        engine.apply_input(&CanonicalInput::Hat { x: 0, y: -1 }).unwrap();
        engine.apply_input(&CanonicalInput::Hat { x: 1, y: 0 }).unwrap();
        engine.apply_input(&CanonicalInput::Hat { x: 0, y: 0 }).unwrap();

        assert_eq!(
            engine.pad().calls,
            vec![
                PadCall::Stick(Stick::Left, 0.0, -1.0),
                PadCall::Stick(Stick::Left, 1.0, 0.0),
                PadCall::Stick(Stick::Left, 0.0, 0.0),
            ]
        );
        assert_eq!(engine.pad().commits, 3);
    }

    #[test]
    fn test_hat_never_combines_diagonally() {
        let mut engine = ReplayEngine::new(MockPad::default());
        engine.apply_input(&CanonicalInput::Hat { x: 1, y: 1 }).unwrap();

        // Both branches fire, y last; the committed position is vertical only.
        assert_eq!(
            engine.pad().calls,
            vec![
                PadCall::Stick(Stick::Left, 1.0, 0.0),
                PadCall::Stick(Stick::Left, 0.0, 1.0),
            ]
        );
        assert_eq!(engine.pad().commits, 1);
    }

    #[test]
    fn test_hat_bypasses_axis_state() {
        let mut engine = ReplayEngine::new(MockPad::default());
        engine.apply_input(&CanonicalInput::Hat { x: -1, y: 0 }).unwrap();

        assert_eq!(engine.axis_state(), &AxisState::default());
    }

    #[test]
    fn test_normalized_abs_x_scenario() {
        // End to end: ABS_X 16383 normalizes to ~0.4999, clears the epsilon
        // against a centered stick and commits the pair.
        let mut engine = ReplayEngine::new(MockPad::default());
        let input = crate::mapping::map_absolute("ABS_X", 16383).unwrap();
        engine.apply_input(&input).unwrap();

        match engine.pad().calls.as_slice() {
            [PadCall::Stick(Stick::Left, x, y)] => {
                assert!((x - 0.4999).abs() < 0.001);
                assert_eq!(*y, 0.0);
            }
            other => panic!("unexpected calls: {other:?}"),
        }
        assert_eq!(engine.pad().commits, 1);
    }
}
