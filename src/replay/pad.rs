use crate::mapping::{PadButton, Stick, Trigger};

/// Errors surfaced by a virtual-controller backend.
#[derive(Debug, thiserror::Error)]
pub enum PadError {
    #[error("Failed to open virtual device: {0}")]
    Open(std::io::Error),

    #[error("Failed to commit state to virtual device: {0}")]
    Commit(std::io::Error),
}

/// Seam to the virtual-controller collaborator.
///
/// State-setting calls accumulate pending changes and never fail; [`commit`]
/// flushes everything accumulated since the last commit to the underlying
/// device. Stick coordinates are floats in -1..1, trigger pressure is the
/// device-native 0..255 range.
///
/// [`commit`]: VirtualPad::commit
pub trait VirtualPad {
    fn press(&mut self, button: PadButton);
    fn release(&mut self, button: PadButton);
    fn set_stick(&mut self, stick: Stick, x: f32, y: f32);
    fn set_trigger(&mut self, trigger: Trigger, pressure: u8);
    fn commit(&mut self) -> Result<(), PadError>;
}
