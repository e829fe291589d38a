//! # Value Objects
//!
//! Immutable, self-validating values shared by every layer.

use super::errors::ExchangeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 32-byte public key, hex encoded at API and payload boundaries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse exactly 64 hex characters.
    pub fn from_hex(input: &str) -> Result<Self, ExchangeError> {
        let trimmed = input.trim();
        if trimmed.len() != 64 {
            return Err(ExchangeError::InvalidParameters(format!(
                "public key must be 64 hex characters, got {}",
                trimmed.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(trimmed, &mut bytes)
            .map_err(|e| ExchangeError::InvalidParameters(format!("public key: {}", e)))?;
        Ok(Self(bytes))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.to_hex()
    }
}

impl TryFrom<String> for PublicKey {
    type Error = ExchangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// Relay-assigned token identifying one inbox entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a relay token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle for a payment or call request waiting on the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for RequestId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Local master authentication key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    inner: [u8; 32],
}

impl MasterKey {
    /// Wrap 32 secret bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { inner: bytes }
    }

    /// Parse 64 hex characters.
    pub fn from_hex(input: &str) -> Result<Self, ExchangeError> {
        let mut inner = [0u8; 32];
        hex::decode_to_slice(input.trim(), &mut inner)
            .map_err(|_| ExchangeError::InvalidParameters("master key must be 32 hex bytes".into()))?;
        Ok(Self { inner })
    }

    /// Secret bytes. Do not keep copies around.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.inner
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(***)")
    }
}

/// 24-byte AEAD nonce carried in every envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce(pub [u8; 24]);

impl Nonce {
    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 24] {
        &self.0
    }
}
