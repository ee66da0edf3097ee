//! padrelay - relays physical gamepad input to a virtual pad on another
//! machine, in near-real time.
//!
//! A node reads raw events from a local pad, stamps them with its identity
//! and forwards them to peers and observers; events received from remote
//! nodes are normalized and replayed onto a local uinput device. Delivery is
//! best-effort, order-preserving and lossy under load.

pub mod config;
pub mod device;
pub mod mapping;
pub mod protocol;
pub mod relay;
pub mod replay;
