//! # BLAKE3 Hashing
//!
//! One-shot hashing and context-separated key derivation.

/// BLAKE3 hash output (256-bit).
pub type Hash = [u8; 32];

/// Hash data with BLAKE3 (one-shot).
pub fn blake3_hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Derive key from context and input key material.
///
/// The context string must be hardcoded and globally unique per use.
pub fn blake3_derive_key(context: &str, key_material: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(key_material);
    *hasher.finalize().as_bytes()
}
