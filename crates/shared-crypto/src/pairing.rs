//! # Pairing Key Derivation
//!
//! A pairing key is an Ed25519 key pair whose seed is derived from the local
//! master key and the identifier both peers agreed on. Re-deriving with the
//! same inputs always yields the same key, so only the identifier is persisted.

use crate::hashing::blake3_derive_key;
use crate::signatures::Ed25519KeyPair;
use crate::CryptoError;
use zeroize::Zeroize;

/// Domain-separation context for pairing seeds. Changing it re-keys every pairing.
const PAIRING_SEED_CONTEXT: &str = "pairing-exchange 2024-06-01 pairing key seed v1";

/// Derive the pairing key pair for `identifier` under `master`.
///
/// # Errors
///
/// `CryptoError::InvalidInput` if the identifier is empty.
pub fn derive_pairing_keypair(
    master: &[u8; 32],
    identifier: &str,
) -> Result<Ed25519KeyPair, CryptoError> {
    if identifier.is_empty() {
        return Err(CryptoError::InvalidInput("empty pairing identifier".into()));
    }

    // master || 0x00 || identifier
    let mut material = Vec::with_capacity(master.len() + 1 + identifier.len());
    material.extend_from_slice(master);
    material.push(0);
    material.extend_from_slice(identifier.as_bytes());

    let mut seed = blake3_derive_key(PAIRING_SEED_CONTEXT, &material);
    material.zeroize();

    let keypair = Ed25519KeyPair::from_seed(seed);
    seed.zeroize();
    Ok(keypair)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_pairing_keypair(&[7u8; 32], "merchant-42").unwrap();
        let b = derive_pairing_keypair(&[7u8; 32], "merchant-42").unwrap();
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_identifier_changes_key() {
        let a = derive_pairing_keypair(&[7u8; 32], "merchant-42").unwrap();
        let b = derive_pairing_keypair(&[7u8; 32], "merchant-43").unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_master_changes_key() {
        let a = derive_pairing_keypair(&[7u8; 32], "merchant-42").unwrap();
        let b = derive_pairing_keypair(&[8u8; 32], "merchant-42").unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_empty_identifier_rejected() {
        assert!(matches!(
            derive_pairing_keypair(&[7u8; 32], ""),
            Err(CryptoError::InvalidInput(_))
        ));
    }
}
