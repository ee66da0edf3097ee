//! Deterministic replay of canonical events onto a virtual controller
//!
//! [`pad`] defines the seam to the virtual-controller collaborator,
//! [`engine`] holds the per-controller axis memory and the noise filter,
//! [`uinput`] drives a real uinput device through that seam.

pub mod engine;
pub mod pad;
pub mod uinput;

pub use engine::{AxisState, ReplayEngine, AXIS_EPSILON};
pub use pad::{PadError, VirtualPad};
pub use uinput::UinputPad;
