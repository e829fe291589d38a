//! # Envelope Protocol
//!
//! Every message travels as a [`MessageEnvelope`]: JSON payload encrypted
//! towards the receiver's pairing key, signed with the sender's pairing key,
//! encoded with bincode for the relay.

mod codec;
mod message;

pub use codec::{EnvelopeCodec, OpenError};
pub use message::{MessageEnvelope, ENVELOPE_VERSION, MAX_ENVELOPE_BYTES};
