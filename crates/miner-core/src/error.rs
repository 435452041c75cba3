//! Error types for template parsing, hashing and nonce search.

use thiserror::Error;

/// Errors surfaced by the mining core.
///
/// Running out of nonces and being cancelled are normal ends of a search and
/// are reported through [`crate::search::SearchOutcome`] instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MinerError {
    /// A block template field is missing or cannot be decoded.
    #[error("malformed block template: field `{field}` {reason}")]
    MalformedTemplate {
        /// Name of the offending template field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A SHA256 block was not exactly 64 bytes long.
    #[error("invalid block size: expected 64 bytes, got {0}")]
    InvalidBlockSize(usize),

    /// A compact target cannot be expanded into a valid 256-bit target.
    #[error("invalid compact target bits {bits:#010x}: {reason}")]
    InvalidBits {
        /// The rejected compact value.
        bits: u32,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A batch hasher claimed a nonce that does not meet the target.
    #[error("batch hasher returned nonce {nonce:#010x} which does not meet the target")]
    RejectedSolution {
        /// The claimed nonce.
        nonce: u32,
    },
}

impl MinerError {
    /// Create a malformed template error for `field`.
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedTemplate {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for the mining core.
pub type Result<T> = core::result::Result<T, MinerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_names_field() {
        let err = MinerError::malformed("merkleroot", "is missing");
        assert_eq!(
            err.to_string(),
            "malformed block template: field `merkleroot` is missing"
        );
    }

    #[test]
    fn test_invalid_bits_message() {
        let err = MinerError::InvalidBits {
            bits: 0x1d80ffff,
            reason: "sign bit is set",
        };
        assert_eq!(
            err.to_string(),
            "invalid compact target bits 0x1d80ffff: sign bit is set"
        );
    }
}
