//! Signed, encrypted transport unit.
//!
//! Layout on the wire is bincode with fixed-width integers. The signature
//! covers every header field plus the ciphertext, prefixed with a domain tag
//! so envelope signatures cannot be replayed as signatures over anything else.

use crate::domain::{ExchangeError, MessageType, Nonce, PublicKey};
use bincode::Options;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Protocol version written into every envelope.
pub const ENVELOPE_VERSION: u8 = 1;

/// Upper bound on an encoded envelope.
pub const MAX_ENVELOPE_BYTES: u64 = 256 * 1024;

const SIGNING_DOMAIN: &[u8] = b"pairing-exchange/envelope/v1";

/// Immutable message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub(crate) version: u8,
    pub(crate) id: Uuid,
    pub(crate) reply_to: Option<Uuid>,
    pub(crate) sender: PublicKey,
    pub(crate) receiver: PublicKey,
    pub(crate) nonce: Nonce,
    pub(crate) message_type: MessageType,
    pub(crate) payload: Vec<u8>,
    pub(crate) signature: Vec<u8>,
}

impl MessageEnvelope {
    /// Unique envelope id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Id of the envelope this one answers.
    pub fn reply_to(&self) -> Option<Uuid> {
        self.reply_to
    }

    /// Declared sender key.
    pub fn sender(&self) -> &PublicKey {
        &self.sender
    }

    /// Intended receiver key.
    pub fn receiver(&self) -> &PublicKey {
        &self.receiver
    }

    /// AEAD nonce.
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Type tag of the encrypted payload.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Encrypted payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Detached signature.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Bytes covered by the signature.
    pub(crate) fn signing_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SIGNING_DOMAIN.len() + 160 + self.payload.len());
        bytes.extend_from_slice(SIGNING_DOMAIN);
        bytes.push(self.version);
        bytes.extend_from_slice(self.id.as_bytes());
        match self.reply_to {
            Some(original) => {
                bytes.push(1);
                bytes.extend_from_slice(original.as_bytes());
            }
            None => bytes.push(0),
        }
        bytes.extend_from_slice(self.sender.as_bytes());
        bytes.extend_from_slice(self.receiver.as_bytes());
        bytes.extend_from_slice(self.nonce.as_bytes());
        bytes.extend_from_slice(self.message_type.as_str().as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Encode for the relay.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ExchangeError> {
        wire_options()
            .serialize(self)
            .map_err(|e| ExchangeError::ConstructionError(format!("encode envelope: {}", e)))
    }

    /// Decode relay bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExchangeError> {
        let envelope: Self = wire_options()
            .deserialize(bytes)
            .map_err(|e| ExchangeError::DecodeError(format!("envelope: {}", e)))?;

        if envelope.version != ENVELOPE_VERSION {
            return Err(ExchangeError::DecodeError(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }
        Ok(envelope)
    }
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_ENVELOPE_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MessageEnvelope {
        MessageEnvelope {
            version: ENVELOPE_VERSION,
            id: Uuid::new_v4(),
            reply_to: None,
            sender: PublicKey::new([1; 32]),
            receiver: PublicKey::new([2; 32]),
            nonce: Nonce([3; 24]),
            message_type: MessageType::Ping,
            payload: vec![4, 5, 6],
            signature: vec![7; 64],
        }
    }

    #[test]
    fn test_signing_bytes_cover_header() {
        let original = sample();
        let base = original.signing_bytes();

        let mut retyped = original.clone();
        retyped.message_type = MessageType::Pong;
        assert_ne!(retyped.signing_bytes(), base);

        let mut replied = original.clone();
        replied.reply_to = Some(Uuid::new_v4());
        assert_ne!(replied.signing_bytes(), base);

        let mut resigned = original;
        resigned.signature = vec![0; 64];
        assert_eq!(resigned.signing_bytes(), base);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = MessageEnvelope::from_bytes(&[0xFF; 7]).unwrap_err();
        assert!(matches!(err, ExchangeError::DecodeError(_)));
    }

    #[test]
    fn test_unknown_type_tag_is_decode_error() {
        let mut bytes = sample().to_bytes().unwrap();
        // version(1) + id(8 len + 16) + reply_to(1) + sender(8 + 64) + receiver(8 + 64) + nonce(24)
        let tag_offset = 1 + 24 + 1 + 72 + 72 + 24;
        bytes[tag_offset..tag_offset + 4].copy_from_slice(&99u32.to_le_bytes());

        let err = MessageEnvelope::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ExchangeError::DecodeError(_)));
    }

    #[test]
    fn test_version_checked() {
        let mut envelope = sample();
        envelope.version = 9;
        let bytes = envelope.to_bytes().unwrap();
        assert!(matches!(
            MessageEnvelope::from_bytes(&bytes),
            Err(ExchangeError::DecodeError(msg)) if msg.contains("version")
        ));
    }
}
