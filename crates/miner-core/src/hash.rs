//! SHA256 double-hashing and the proof-of-work check.

use sha2::{Digest, Sha256};

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Single SHA256 hash.
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Check whether a double-SHA256 digest satisfies a target.
///
/// The digest is read as a little-endian 256-bit integer and the target as
/// a big-endian one (as produced by [`crate::bits_to_target`]). Returns true
/// when digest <= target.
#[inline]
pub fn meets_target(hash: &[u8; 32], target: &[u8; 32]) -> bool {
    // Most significant byte of the digest is its last one
    for (hash_byte, target_byte) in hash.iter().rev().zip(target.iter()) {
        if hash_byte < target_byte {
            return true;
        }
        if hash_byte > target_byte {
            return false;
        }
    }
    // Equal meets the target
    true
}

/// Convert a hash to its display format (reversed hex).
pub fn hash_to_display_hex(hash: &[u8; 32]) -> String {
    crate::byte_order::internal_to_display_hex(hash)
}

/// Count leading zero bits in the DISPLAYED hash format.
///
/// Hashes are displayed in reversed byte order, so the leading zeros of a
/// block hash like "00000000000..." are the TRAILING bytes of the digest.
pub fn count_leading_zeros(hash: &[u8; 32]) -> u32 {
    let mut zeros = 0u32;
    for byte in hash.iter().rev() {
        if *byte == 0 {
            zeros += 8;
        } else {
            zeros += byte.leading_zeros();
            break;
        }
    }
    zeros
}
