//! Bitcoin difficulty target conversion and utilities.

use crate::error::{MinerError, Result};

/// Compact bits of the "difficulty 1" target used by the genesis block.
pub const GENESIS_BITS: u32 = 0x1d00ffff;

const SIGN_BIT: u32 = 0x0080_0000;

/// Convert compact "bits" representation to a 256-bit target.
///
/// The bits format is: [exponent (1 byte)][mantissa (3 bytes)]
/// Target = mantissa * 256^(exponent - 3)
///
/// The result is a 32-byte big-endian representation of the target.
/// Bits with the sign flag set, or with an exponent that would push the
/// mantissa past the most significant byte, are rejected.
pub fn bits_to_target(bits: u32) -> Result<[u8; 32]> {
    let exponent = (bits >> 24) as usize;
    let mantissa = bits & 0x007F_FFFF;

    if bits & SIGN_BIT != 0 {
        return Err(MinerError::InvalidBits {
            bits,
            reason: "sign bit is set",
        });
    }
    if exponent > 32 {
        return Err(MinerError::InvalidBits {
            bits,
            reason: "exponent exceeds 32 bytes",
        });
    }

    let mut target = [0u8; 32];

    if exponent <= 3 {
        // Mantissa fits in fewer bytes than specified
        let value = mantissa >> (8 * (3 - exponent));

        target[31] = (value & 0xFF) as u8;
        target[30] = ((value >> 8) & 0xFF) as u8;
        target[29] = ((value >> 16) & 0xFF) as u8;
    } else {
        let pos = 32 - exponent;

        target[pos] = ((mantissa >> 16) & 0xFF) as u8;
        target[pos + 1] = ((mantissa >> 8) & 0xFF) as u8;
        target[pos + 2] = (mantissa & 0xFF) as u8;
    }

    Ok(target)
}

/// Convert a 256-bit target back to compact "bits" representation.
///
/// This is the inverse of `bits_to_target` for targets it can produce.
pub fn target_to_bits(target: &[u8; 32]) -> u32 {
    let first_nonzero = match target.iter().position(|&b| b != 0) {
        Some(pos) => pos,
        None => return 0,
    };

    // Number of significant bytes
    let exponent = (32 - first_nonzero) as u32;

    let mut mantissa: u32 = 0;
    for offset in 0..3 {
        let byte = target.get(first_nonzero + offset).copied().unwrap_or(0);
        mantissa |= (byte as u32) << (16 - 8 * offset);
    }

    // A set high bit would read as negative, so widen by one byte
    let (exp_adj, mant_adj) = if mantissa & SIGN_BIT != 0 {
        (exponent + 1, mantissa >> 8)
    } else {
        (exponent, mantissa)
    };

    (exp_adj << 24) | (mant_adj & 0x007F_FFFF)
}

/// Calculate approximate difficulty from bits.
///
/// Difficulty = max_target / current_target, where max_target is the
/// genesis block target.
pub fn bits_to_difficulty(bits: u32) -> Result<f64> {
    let current_f64 = target_to_f64(&bits_to_target(bits)?);
    let genesis_f64 = target_to_f64(&bits_to_target(GENESIS_BITS)?);

    if current_f64 == 0.0 {
        return Ok(f64::INFINITY);
    }

    Ok(genesis_f64 / current_f64)
}

/// Convert a 256-bit target to an approximate f64 value.
fn target_to_f64(target: &[u8; 32]) -> f64 {
    target
        .iter()
        .fold(0.0, |acc, &byte| acc * 256.0 + byte as f64)
}

/// Format difficulty for display (e.g., "1.23T" for trillion).
pub fn format_difficulty(difficulty: f64) -> String {
    if difficulty >= 1e15 {
        format!("{:.2}P", difficulty / 1e15)
    } else if difficulty >= 1e12 {
        format!("{:.2}T", difficulty / 1e12)
    } else if difficulty >= 1e9 {
        format!("{:.2}G", difficulty / 1e9)
    } else if difficulty >= 1e6 {
        format!("{:.2}M", difficulty / 1e6)
    } else if difficulty >= 1e3 {
        format!("{:.2}K", difficulty / 1e3)
    } else {
        format!("{:.2}", difficulty)
    }
}

/// Estimate average hashes needed to find a block at given difficulty.
pub fn expected_hashes(difficulty: f64) -> f64 {
    // On average, need difficulty * 2^32 hashes
    difficulty * 4_294_967_296.0
}
