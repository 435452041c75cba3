//! Byte-order conversions for 32-byte hashes.
//!
//! Hashes travel in three orders and every crossing goes through one of
//! these functions:
//!
//! - display hex: the big-endian text used by block templates and explorers
//! - internal: little-endian bytes held by [`crate::BlockHeader`]
//! - wire: the order written into the 80-byte serialized header
//!
//! Template -> internal reverses the decoded bytes, internal -> wire
//! reverses them back.

use crate::error::{MinerError, Result};

/// Reverse the byte order of a 32-byte array.
#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Decode a 64-character display-order hex hash into internal little-endian
/// bytes. Source byte `i` lands at index `31 - i`.
pub fn display_hex_to_internal(field: &'static str, hex_str: &str) -> Result<[u8; 32]> {
    let decoded = hex::decode(hex_str)
        .map_err(|e| MinerError::malformed(field, format!("is not valid hex: {}", e)))?;

    let bytes: [u8; 32] = decoded.as_slice().try_into().map_err(|_| {
        MinerError::malformed(
            field,
            format!("must decode to 32 bytes, got {}", decoded.len()),
        )
    })?;

    Ok(reverse_bytes(&bytes))
}

/// Encode internal little-endian bytes back into display-order hex.
pub fn internal_to_display_hex(internal: &[u8; 32]) -> String {
    hex::encode(reverse_bytes(internal))
}

/// Convert an internally stored hash into the order it is serialized in.
#[inline]
pub fn internal_to_wire(internal: &[u8; 32]) -> [u8; 32] {
    reverse_bytes(internal)
}

/// Decode the compact `bits` field from its 8-character big-endian hex form.
/// The first hex byte becomes the most significant byte.
pub fn bits_from_hex(hex_str: &str) -> Result<u32> {
    let decoded = hex::decode(hex_str)
        .map_err(|e| MinerError::malformed("bits", format!("is not valid hex: {}", e)))?;

    let bytes: [u8; 4] = decoded.as_slice().try_into().map_err(|_| {
        MinerError::malformed(
            "bits",
            format!("must decode to 4 bytes, got {}", decoded.len()),
        )
    })?;

    Ok(u32::from_be_bytes(bytes))
}

/// Encode `bits` as the 8-character big-endian hex used by templates.
pub fn bits_to_hex(bits: u32) -> String {
    hex::encode(bits.to_be_bytes())
}
