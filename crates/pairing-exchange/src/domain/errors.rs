//! # Domain Errors
//!
//! Error taxonomy surfaced to the host, plus the adapter-level errors that
//! are converted into it at the service boundary.

use super::messages::ErrorCode;
use super::value_objects::PublicKey;
use std::fmt;
use thiserror::Error;

/// Errors reported by the pairing exchange.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Caller-supplied key, identifier or request id is unusable.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Payload serialization or encryption failed while building an envelope.
    #[error("Could not construct message: {0}")]
    ConstructionError(String),

    /// The relay did not accept an outgoing envelope.
    #[error("Message could not be sent: {0}")]
    SendFailed(String),

    /// The relay refused to register a public key as a recipient address.
    #[error("Public key registration failed: {0}")]
    RegistrationFailed(String),

    /// Envelope bytes or a decrypted payload are malformed.
    #[error("Malformed message: {0}")]
    DecodeError(String),

    /// Signature or addressing check failed.
    #[error("Message verification failed")]
    VerificationFailed,

    /// The other wallet declined the pairing request.
    #[error("The other wallet declined the pairing request{}", code_suffix(.code))]
    RemoteRejected {
        /// Error code the remote attached, if any
        code: Option<ErrorCode>,
    },

    /// The LINK response names a different identifier than the one we asked for.
    #[error("Pairing identifier mismatch: expected {expected}, received {received}")]
    IdentifierMismatch {
        /// Identifier the handshake was started with
        expected: String,
        /// Identifier carried by the response
        received: String,
    },

    /// No LINK response arrived within the polling budget.
    #[error("No response from the other wallet after {attempts} attempts")]
    Timeout {
        /// Poll ticks spent waiting
        attempts: u32,
    },

    /// No paired wallet is registered for the key.
    #[error("No paired wallet for key {0}")]
    UnknownPeer(PublicKey),

    /// The pairing succeeded but the record could not be stored.
    #[error("Paired wallet could not be saved: {0}")]
    PersistenceWarning(String),
}

fn code_suffix(code: &Option<ErrorCode>) -> String {
    match code {
        Some(code) => format!(" ({})", code),
        None => String::new(),
    }
}

/// Relay transport errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The relay could not be reached.
    #[error("Relay unavailable: {0}")]
    Unavailable(String),

    /// The relay refused the request.
    #[error("Relay rejected request: {0}")]
    Rejected(String),

    /// A cursor the relay does not know about.
    #[error("Unknown cursor: {0}")]
    UnknownCursor(String),
}

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    IOError {
        /// Underlying error text
        message: String,
    },
    /// A stored value could not be decoded.
    CorruptionError {
        /// Underlying error text
        message: String,
    },
}

impl fmt::Display for KVStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KVStoreError::IOError { message } => write!(f, "KV store I/O error: {}", message),
            KVStoreError::CorruptionError { message } => {
                write!(f, "KV store corruption: {}", message)
            }
        }
    }
}

impl std::error::Error for KVStoreError {}

/// Failures of the crypto capability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A pairing key could not be derived.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Bytes are not a usable public key.
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Authentication tag did not verify or the key is wrong.
    #[error("Decryption failed")]
    Decryption,
}

/// Paired-peer registry errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A record for this key already exists.
    #[error("Wallet {0} is already paired")]
    AlreadyPaired(PublicKey),

    /// The backing store failed.
    #[error("Registry storage failure: {0}")]
    Storage(#[from] KVStoreError),

    /// A stored record could not be decoded.
    #[error("Corrupt registry entry: {0}")]
    Corrupt(String),

    /// The pairing key for a stored identifier could not be re-derived.
    #[error("Pairing key derivation failed: {0}")]
    Derivation(#[from] CryptoError),
}

impl From<RegistryError> for ExchangeError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyPaired(key) => {
                ExchangeError::InvalidParameters(format!("wallet {} is already paired", key))
            }
            other => ExchangeError::PersistenceWarning(other.to_string()),
        }
    }
}
