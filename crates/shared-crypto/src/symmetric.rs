//! # Symmetric Encryption
//!
//! XChaCha20-Poly1305 with a caller-supplied nonce. The nonce travels in the
//! envelope header, so it is generated by the envelope builder rather than here.

use crate::CryptoError;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// XChaCha20 nonce length in bytes.
pub const NONCE_LEN: usize = 24;

/// Secret key (256-bit).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Nonce for encryption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate random nonce (safe with XChaCha20's 192-bit nonce).
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// Encrypt plaintext with XChaCha20-Poly1305 under the given nonce.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if encryption fails.
pub fn encrypt(key: &SecretKey, nonce: &Nonce, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .encrypt(XNonce::from_slice(nonce.as_bytes()), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Decrypt ciphertext with XChaCha20-Poly1305.
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` if authentication fails.
pub fn decrypt(key: &SecretKey, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(XNonce::from_slice(nonce.as_bytes()), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SecretKey {
        SecretKey::from_bytes([byte; 32])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let nonce = Nonce::generate();
        let plaintext = b"account request";

        let ciphertext = encrypt(&key(1), &nonce, plaintext).unwrap();
        let decrypted = decrypt(&key(1), &nonce, &ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let nonce = Nonce::generate();
        let ciphertext = encrypt(&key(1), &nonce, b"Secret message").unwrap();

        assert_eq!(
            decrypt(&key(2), &nonce, &ciphertext),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let ciphertext = encrypt(&key(1), &Nonce::from_bytes([1; NONCE_LEN]), b"m").unwrap();
        assert!(decrypt(&key(1), &Nonce::from_bytes([2; NONCE_LEN]), &ciphertext).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let nonce = Nonce::generate();
        let mut ciphertext = encrypt(&key(1), &nonce, b"Secret message").unwrap();
        ciphertext[0] ^= 0xFF;

        assert!(decrypt(&key(1), &nonce, &ciphertext).is_err());
    }

    #[test]
    fn test_nonce_uniqueness() {
        assert_ne!(Nonce::generate(), Nonce::generate());
    }
}
