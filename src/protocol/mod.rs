//! Wire-level types shared by every transport
//!
//! [`event`] defines the raw and canonical event representations, [`codec`]
//! turns them into the two interchangeable payload forms: a structured JSON
//! message for the socket transport and a comma-delimited line for the
//! datagram transport.

pub mod codec;
pub mod event;

pub use codec::{CodecError, WireMessage};
pub use event::{EventKind, NodeId, RawEvent, WireEvent};
