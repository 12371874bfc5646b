//! Signaling: envelope codec and the signaling transport capability

pub mod envelope;
pub mod transport;

pub use envelope::{Ack, SignalingEnvelope};
pub use transport::{InitAck, SignalingTransport};
