//! Relay control plane
//!
//! One node = one poller draining the physical pad, an optional peer link,
//! an observer listener, and the node loop tying them together:
//!
//! ```text
//! device ──► Poller ──► RelayNode ──► peer + observers
//!                          ▲  │
//!        peer/observers ───┘  └──► ReplayEngine ──► virtual pad
//! ```
//!
//! Locally generated events are forwarded only; remote events are the only
//! ones replayed onto the local virtual pad. Events that come back carrying
//! this node's own identity are discarded before either path.

pub mod datagram;
pub mod node;
pub mod observers;
pub mod peer;
pub mod poller;

pub use node::RelayNode;
pub use peer::{PeerHandle, TransportError};
pub use poller::PollerHandle;
