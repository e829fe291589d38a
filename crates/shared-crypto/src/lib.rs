//! # Shared Crypto - Pairing Exchange Primitives
//!
//! **Status:** Production
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `pairing` | BLAKE3 derive-key + Ed25519 | Per-peer pairing keys |
//! | `signatures` | Ed25519 | Envelope authentication |
//! | `exchange` | X25519 (from Ed25519) + XChaCha20-Poly1305 | Sealed payloads |
//! | `symmetric` | XChaCha20-Poly1305 | AEAD with caller-supplied nonce |
//! | `hashing` | BLAKE3 | Key derivation, hashing |
//!
//! ## Security Properties
//!
//! - **Pairing keys** are a pure function of (master key, identifier); nothing is stored.
//! - **Ed25519**: Deterministic nonces, no RNG dependency when signing
//! - **X25519**: The Ed25519 key pair is mapped to Montgomery form, so one
//!   public key serves both signing and key agreement.
//! - **XChaCha20**: 192-bit nonce, safe to generate randomly per message

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod exchange;
pub mod hashing;
pub mod pairing;
pub mod signatures;
pub mod symmetric;

// Re-exports
pub use errors::CryptoError;
pub use exchange::{open, seal, shared_key};
pub use hashing::{blake3_derive_key, blake3_hash};
pub use pairing::derive_pairing_keypair;
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use symmetric::{decrypt, encrypt, Nonce, SecretKey, NONCE_LEN};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
