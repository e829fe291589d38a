//! Crypto capability backed by `shared-crypto`.
//!
//! Pairing keys are Ed25519; sealing uses X25519 agreement between the two
//! pairing keys and XChaCha20-Poly1305.

use crate::domain::{CryptoError, MasterKey, Nonce, PairingKey, PublicKey};
use crate::ports::CryptoCapability;
use shared_crypto::{
    derive_pairing_keypair, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature,
    Nonce as AeadNonce,
};

/// Production crypto adapter.
#[derive(Clone, Copy, Debug, Default)]
pub struct DalekCrypto;

impl DalekCrypto {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }

    fn keypair(key: &PairingKey) -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed(*key.seed())
    }

    fn remote(key: &PublicKey) -> Result<Ed25519PublicKey, CryptoError> {
        Ed25519PublicKey::from_bytes(*key.as_bytes()).map_err(|_| CryptoError::InvalidPublicKey)
    }
}

impl CryptoCapability for DalekCrypto {
    fn derive_pairing_key(
        &self,
        master: &MasterKey,
        identifier: &str,
    ) -> Result<PairingKey, CryptoError> {
        let keypair = derive_pairing_keypair(master.as_bytes(), identifier)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        let public_key = PublicKey::new(*keypair.public_key().as_bytes());
        Ok(PairingKey::new(public_key, keypair.to_seed()))
    }

    fn generate_nonce(&self) -> Nonce {
        Nonce(*AeadNonce::generate().as_bytes())
    }

    fn encrypt(
        &self,
        key: &PairingKey,
        plaintext: &[u8],
        nonce: &Nonce,
        recipient: &PublicKey,
    ) -> Result<Vec<u8>, CryptoError> {
        let remote = Self::remote(recipient)?;
        shared_crypto::seal(
            &Self::keypair(key),
            &remote,
            &AeadNonce::from_bytes(nonce.0),
            plaintext,
        )
        .map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    fn decrypt(
        &self,
        key: &PairingKey,
        ciphertext: &[u8],
        nonce: &Nonce,
        sender: &PublicKey,
    ) -> Result<Vec<u8>, CryptoError> {
        let remote = Self::remote(sender)?;
        shared_crypto::open(
            &Self::keypair(key),
            &remote,
            &AeadNonce::from_bytes(nonce.0),
            ciphertext,
        )
        .map_err(|_| CryptoError::Decryption)
    }

    fn sign(&self, key: &PairingKey, message: &[u8]) -> Vec<u8> {
        Self::keypair(key).sign(message).as_bytes().to_vec()
    }

    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
        let Ok(remote) = Self::remote(public_key) else {
            return false;
        };
        let Ok(signature) = Ed25519Signature::from_slice(signature) else {
            return false;
        };
        remote.verify(message, &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (DalekCrypto, PairingKey, PairingKey) {
        let crypto = DalekCrypto::new();
        let a = crypto
            .derive_pairing_key(&MasterKey::new([10; 32]), "peer-b")
            .unwrap();
        let b = crypto
            .derive_pairing_key(&MasterKey::new([20; 32]), "peer-a")
            .unwrap();
        (crypto, a, b)
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let crypto = DalekCrypto::new();
        let master = MasterKey::new([3; 32]);
        let first = crypto.derive_pairing_key(&master, "shop").unwrap();
        let second = crypto.derive_pairing_key(&master, "shop").unwrap();
        let other = crypto.derive_pairing_key(&master, "other").unwrap();

        assert_eq!(first.public_key(), second.public_key());
        assert_ne!(first.public_key(), other.public_key());
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let crypto = DalekCrypto::new();
        assert!(matches!(
            crypto.derive_pairing_key(&MasterKey::new([3; 32]), ""),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_encrypt_decrypt_between_peers() {
        let (crypto, a, b) = keys();
        let nonce = crypto.generate_nonce();

        let ciphertext = crypto
            .encrypt(&a, b"secret payload", &nonce, &b.public_key())
            .unwrap();
        let plaintext = crypto
            .decrypt(&b, &ciphertext, &nonce, &a.public_key())
            .unwrap();

        assert_eq!(plaintext, b"secret payload");
    }

    #[test]
    fn test_decrypt_with_wrong_nonce_fails() {
        let (crypto, a, b) = keys();
        let ciphertext = crypto
            .encrypt(&a, b"m", &crypto.generate_nonce(), &b.public_key())
            .unwrap();

        assert_eq!(
            crypto.decrypt(&b, &ciphertext, &crypto.generate_nonce(), &a.public_key()),
            Err(CryptoError::Decryption)
        );
    }

    #[test]
    fn test_sign_verify() {
        let (crypto, a, b) = keys();
        let signature = crypto.sign(&a, b"envelope");

        assert!(crypto.verify(&a.public_key(), b"envelope", &signature));
        assert!(!crypto.verify(&b.public_key(), b"envelope", &signature));
        assert!(!crypto.verify(&a.public_key(), b"envelope", &signature[..10]));
    }
}
