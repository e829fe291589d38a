//! Envelope construction and verification over the crypto port.

use super::message::{MessageEnvelope, ENVELOPE_VERSION};
use crate::domain::{ExchangeError, MessageType, PairingKey, Payload, PublicKey};
use crate::ports::CryptoCapability;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Why an envelope could not be opened.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// Signature or receiver check failed.
    #[error("envelope verification failed")]
    Verification,

    /// AEAD decryption failed.
    #[error("envelope decryption failed")]
    Decryption,

    /// The header tag does not match the requested payload type.
    #[error("expected {expected} payload, envelope carries {actual}")]
    WrongType {
        /// Requested payload type
        expected: MessageType,
        /// Tag in the envelope header
        actual: MessageType,
    },

    /// Plaintext is not a valid payload of the tagged type.
    #[error("malformed payload: {0}")]
    Payload(String),
}

impl From<OpenError> for ExchangeError {
    fn from(err: OpenError) -> Self {
        match err {
            OpenError::Verification => ExchangeError::VerificationFailed,
            other => ExchangeError::DecodeError(other.to_string()),
        }
    }
}

/// Builds, parses, verifies and decrypts envelopes.
#[derive(Clone)]
pub struct EnvelopeCodec {
    crypto: Arc<dyn CryptoCapability>,
}

impl EnvelopeCodec {
    /// Codec over a crypto capability.
    pub fn new(crypto: Arc<dyn CryptoCapability>) -> Self {
        Self { crypto }
    }

    /// Encrypt and sign `payload` for `peer`.
    pub fn build<P: Payload>(
        &self,
        peer: &PublicKey,
        local: &PairingKey,
        payload: &P,
    ) -> Result<MessageEnvelope, ExchangeError> {
        self.seal(peer, local, payload, None)
    }

    /// Same as [`build`](Self::build), addressed to the sender of `original`
    /// and linked to it through `reply_to`.
    pub fn build_reply<P: Payload>(
        &self,
        original: &MessageEnvelope,
        local: &PairingKey,
        payload: &P,
    ) -> Result<MessageEnvelope, ExchangeError> {
        self.seal(original.sender(), local, payload, Some(original.id()))
    }

    fn seal<P: Payload>(
        &self,
        peer: &PublicKey,
        local: &PairingKey,
        payload: &P,
        reply_to: Option<Uuid>,
    ) -> Result<MessageEnvelope, ExchangeError> {
        let plaintext = serde_json::to_vec(payload)
            .map_err(|e| ExchangeError::ConstructionError(format!("serialize payload: {}", e)))?;

        let nonce = self.crypto.generate_nonce();
        let ciphertext = self
            .crypto
            .encrypt(local, &plaintext, &nonce, peer)
            .map_err(|e| ExchangeError::ConstructionError(e.to_string()))?;

        let mut envelope = MessageEnvelope {
            version: ENVELOPE_VERSION,
            id: Uuid::new_v4(),
            reply_to,
            sender: local.public_key(),
            receiver: *peer,
            nonce,
            message_type: P::MESSAGE_TYPE,
            payload: ciphertext,
            signature: Vec::new(),
        };
        envelope.signature = self.crypto.sign(local, &envelope.signing_bytes());

        debug!(
            id = %envelope.id,
            message_type = %envelope.message_type,
            "[envelope] sealed"
        );
        Ok(envelope)
    }

    /// Encode for the relay.
    pub fn encode(&self, envelope: &MessageEnvelope) -> Result<Vec<u8>, ExchangeError> {
        envelope.to_bytes()
    }

    /// Decode relay bytes.
    pub fn parse(&self, bytes: &[u8]) -> Result<MessageEnvelope, ExchangeError> {
        MessageEnvelope::from_bytes(bytes)
    }

    /// True iff the signature holds under the declared sender and the
    /// envelope is addressed to `local`.
    pub fn verify(&self, envelope: &MessageEnvelope, local: &PairingKey) -> bool {
        if envelope.receiver() != &local.public_key() {
            return false;
        }
        self.crypto.verify(
            envelope.sender(),
            &envelope.signing_bytes(),
            envelope.signature(),
        )
    }

    /// Decrypt the payload. Call only after [`verify`](Self::verify).
    pub fn decrypt(
        &self,
        envelope: &MessageEnvelope,
        local: &PairingKey,
    ) -> Result<Vec<u8>, OpenError> {
        self.crypto
            .decrypt(local, envelope.payload(), envelope.nonce(), envelope.sender())
            .map_err(|_| OpenError::Decryption)
    }

    /// Verify, decrypt and deserialize in one step.
    pub fn open<P: Payload>(
        &self,
        envelope: &MessageEnvelope,
        local: &PairingKey,
    ) -> Result<P, OpenError> {
        if envelope.message_type() != P::MESSAGE_TYPE {
            return Err(OpenError::WrongType {
                expected: P::MESSAGE_TYPE,
                actual: envelope.message_type(),
            });
        }
        if !self.verify(envelope, local) {
            return Err(OpenError::Verification);
        }
        let plaintext = self.decrypt(envelope, local)?;
        serde_json::from_slice(&plaintext).map_err(|e| OpenError::Payload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DalekCrypto;
    use crate::domain::{MasterKey, PingMessage, PongMessage};
    use crate::ports::CryptoCapability;

    struct Pair {
        codec: EnvelopeCodec,
        alice: PairingKey,
        bob: PairingKey,
    }

    fn setup() -> Pair {
        let crypto = Arc::new(DalekCrypto::new());
        let alice = crypto
            .derive_pairing_key(&MasterKey::new([1; 32]), "bob")
            .unwrap();
        let bob = crypto
            .derive_pairing_key(&MasterKey::new([2; 32]), "alice")
            .unwrap();
        Pair {
            codec: EnvelopeCodec::new(crypto),
            alice,
            bob,
        }
    }

    fn ping(text: &str) -> PingMessage {
        PingMessage {
            message: text.to_string(),
        }
    }

    #[test]
    fn test_build_then_verify() {
        let p = setup();
        let envelope = p.codec.build(&p.bob.public_key(), &p.alice, &ping("hi")).unwrap();

        assert!(p.codec.verify(&envelope, &p.bob));
        assert_eq!(envelope.message_type(), MessageType::Ping);
        assert_eq!(envelope.sender(), &p.alice.public_key());
    }

    #[test]
    fn test_verify_fails_for_other_receiver() {
        let p = setup();
        let envelope = p.codec.build(&p.bob.public_key(), &p.alice, &ping("hi")).unwrap();

        // Alice is the sender, not the receiver.
        assert!(!p.codec.verify(&envelope, &p.alice));
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let p = setup();
        let mut envelope = p.codec.build(&p.bob.public_key(), &p.alice, &ping("hi")).unwrap();
        envelope.payload[0] ^= 0x01;

        assert!(!p.codec.verify(&envelope, &p.bob));
        assert_eq!(
            p.codec.open::<PingMessage>(&envelope, &p.bob),
            Err(OpenError::Verification)
        );
    }

    #[test]
    fn test_open_roundtrip_through_wire() {
        let p = setup();
        let envelope = p.codec.build(&p.bob.public_key(), &p.alice, &ping("hello")).unwrap();
        let bytes = p.codec.encode(&envelope).unwrap();
        let parsed = p.codec.parse(&bytes).unwrap();

        let opened: PingMessage = p.codec.open(&parsed, &p.bob).unwrap();
        assert_eq!(opened.message, "hello");
    }

    #[test]
    fn test_reply_links_original() {
        let p = setup();
        let request = p.codec.build(&p.bob.public_key(), &p.alice, &ping("x")).unwrap();
        let reply = p
            .codec
            .build_reply(
                &request,
                &p.bob,
                &PongMessage {
                    message: "x".into(),
                },
            )
            .unwrap();

        assert_eq!(reply.reply_to(), Some(request.id()));
        assert_eq!(reply.receiver(), &p.alice.public_key());
        assert!(p.codec.verify(&reply, &p.alice));
    }

    #[test]
    fn test_open_wrong_type() {
        let p = setup();
        let envelope = p.codec.build(&p.bob.public_key(), &p.alice, &ping("x")).unwrap();
        assert!(matches!(
            p.codec.open::<PongMessage>(&envelope, &p.bob),
            Err(OpenError::WrongType { .. })
        ));
    }

    #[test]
    fn test_fresh_nonce_and_id_per_build() {
        let p = setup();
        let a = p.codec.build(&p.bob.public_key(), &p.alice, &ping("x")).unwrap();
        let b = p.codec.build(&p.bob.public_key(), &p.alice, &ping("x")).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.nonce(), b.nonce());
        assert_ne!(a.payload(), b.payload());
    }
}
