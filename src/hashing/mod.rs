//! Content fingerprints for the exact-match tier.
//!
//! Inputs are normalized (lower-cased, whitespace collapsed) before hashing so that
//! cosmetic differences in a pasted job description never split the cache.

use blake3::Hasher;

use crate::session::Difficulty;

/// Lower-cases `text` and collapses every whitespace run into a single space.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 32-byte BLAKE3 fingerprint of a (role, description, tier) request.
///
/// Components are `|`-delimited so that `("ab", "c")` and `("a", "bc")` never collide.
#[inline]
pub fn fingerprint(role: &str, description: &str, difficulty: Difficulty) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(normalize_text(description).as_bytes());
    hasher.update(b"|");
    hasher.update(normalize_text(role).as_bytes());
    hasher.update(b"|");
    hasher.update(difficulty.as_str().as_bytes());
    *hasher.finalize().as_bytes()
}

/// Hex form of a fingerprint, used as a storage key suffix.
pub fn fingerprint_hex(fingerprint: &[u8; 32]) -> String {
    blake3::Hash::from_bytes(*fingerprint).to_hex().to_string()
}

/// 64-bit BLAKE3 digest, truncated from the full 256-bit output.
///
/// Only used for non-security purposes (deterministic rotation seeds, file names).
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}
