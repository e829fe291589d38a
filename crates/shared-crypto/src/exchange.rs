//! # Sealed Boxes
//!
//! Authenticated encryption between two pairing keys. Both sides compute the
//! same X25519 shared secret from their own Ed25519 key pair and the peer's
//! Ed25519 public key, then derive an XChaCha20-Poly1305 key from it.

use crate::hashing::blake3_derive_key;
use crate::signatures::{Ed25519KeyPair, Ed25519PublicKey};
use crate::symmetric::{self, Nonce, SecretKey};
use crate::CryptoError;

const BOX_KEY_CONTEXT: &str = "pairing-exchange 2024-06-01 sealed box key v1";

/// Derive the symmetric key shared between `local` and `remote`.
///
/// # Errors
///
/// - `CryptoError::InvalidPublicKey` - remote key is not a curve point
/// - `CryptoError::NonContributory` - remote key is a low-order point
pub fn shared_key(
    local: &Ed25519KeyPair,
    remote: &Ed25519PublicKey,
) -> Result<SecretKey, CryptoError> {
    let secret = local.to_x25519();
    let shared = secret.diffie_hellman(&remote.to_x25519()?);
    if !shared.was_contributory() {
        return Err(CryptoError::NonContributory);
    }
    Ok(SecretKey::from_bytes(blake3_derive_key(
        BOX_KEY_CONTEXT,
        shared.as_bytes(),
    )))
}

/// Encrypt `plaintext` from `local` to `remote`.
pub fn seal(
    local: &Ed25519KeyPair,
    remote: &Ed25519PublicKey,
    nonce: &Nonce,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let key = shared_key(local, remote)?;
    symmetric::encrypt(&key, nonce, plaintext)
}

/// Decrypt `ciphertext` that `remote` sealed for `local`.
pub fn open(
    local: &Ed25519KeyPair,
    remote: &Ed25519PublicKey,
    nonce: &Nonce,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let key = shared_key(local, remote)?;
    symmetric::decrypt(&key, nonce, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::derive_pairing_keypair;

    #[test]
    fn test_both_sides_agree() {
        let alice = derive_pairing_keypair(&[1u8; 32], "shop").unwrap();
        let bob = derive_pairing_keypair(&[2u8; 32], "shop").unwrap();

        let ab = shared_key(&alice, &bob.public_key()).unwrap();
        let ba = shared_key(&bob, &alice.public_key()).unwrap();

        assert_eq!(hex::encode(ab.as_bytes()), hex::encode(ba.as_bytes()));
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let alice = Ed25519KeyPair::generate();
        let bob = Ed25519KeyPair::generate();
        let nonce = Nonce::generate();

        let sealed = seal(&alice, &bob.public_key(), &nonce, b"{\"scope\":\"BTC\"}").unwrap();
        let opened = open(&bob, &alice.public_key(), &nonce, &sealed).unwrap();

        assert_eq!(opened, b"{\"scope\":\"BTC\"}");
    }

    #[test]
    fn test_third_party_cannot_open() {
        let alice = Ed25519KeyPair::generate();
        let bob = Ed25519KeyPair::generate();
        let mallory = Ed25519KeyPair::generate();
        let nonce = Nonce::generate();

        let sealed = seal(&alice, &bob.public_key(), &nonce, b"secret").unwrap();
        assert_eq!(
            open(&mallory, &alice.public_key(), &nonce, &sealed),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_empty_plaintext() {
        let alice = Ed25519KeyPair::generate();
        let bob = Ed25519KeyPair::generate();
        let nonce = Nonce::generate();

        let sealed = seal(&alice, &bob.public_key(), &nonce, b"").unwrap();
        assert!(open(&bob, &alice.public_key(), &nonce, &sealed).unwrap().is_empty());
    }
}
