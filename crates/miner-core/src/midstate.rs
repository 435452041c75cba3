//! SHA256 midstate computation for block headers.
//!
//! An 80-byte header spans two SHA256 blocks. The first 64 bytes never
//! change while the nonce is searched, so their compression is done once
//! and each attempt only compresses the 16-byte tail plus padding.

use sha2::compress256;
use sha2::digest::consts::U64;
use sha2::digest::generic_array::GenericArray;

use crate::block::{BlockHeader, HEADER_SIZE};
use crate::error::{MinerError, Result};
use crate::hash::sha256;

/// Size of one SHA256 compression block.
pub const BLOCK_SIZE: usize = 64;

/// Header bytes left over after the first compression block.
pub const TAIL_SIZE: usize = HEADER_SIZE - BLOCK_SIZE;

/// Offset of the nonce inside the tail (header bytes 76..80).
pub const NONCE_OFFSET: usize = 12;

/// SHA256 initial hash values.
const SHA256_IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// SHA256 state after compressing one 64-byte block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Midstate([u32; 8]);

impl Midstate {
    /// Wrap raw state words.
    pub fn from_words(words: [u32; 8]) -> Self {
        Midstate(words)
    }

    /// The eight state words, e.g. for upload to an accelerator.
    pub fn words(&self) -> &[u32; 8] {
        &self.0
    }
}

/// Compress the first 64 header bytes from the standard initial state.
pub fn compute_midstate(first_block: &[u8]) -> Result<Midstate> {
    let block: &[u8; BLOCK_SIZE] = first_block
        .try_into()
        .map_err(|_| MinerError::InvalidBlockSize(first_block.len()))?;

    let mut state = SHA256_IV;
    compress(&mut state, block);
    Ok(Midstate(state))
}

/// The last 16 bytes of the serialized header (merkle root tail, time,
/// bits and nonce).
pub fn tail_bytes(header: &BlockHeader) -> [u8; TAIL_SIZE] {
    let serialized = header.serialize();
    let mut tail = [0u8; TAIL_SIZE];
    tail.copy_from_slice(&serialized[BLOCK_SIZE..]);
    tail
}

/// Pad a header tail into the final SHA256 block: the tail, a 0x80 marker,
/// zeros, and the 640-bit message length as a big-endian u64.
pub fn pad_tail(tail: &[u8; TAIL_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    block[..TAIL_SIZE].copy_from_slice(tail);
    block[TAIL_SIZE] = 0x80;

    let bit_len = (HEADER_SIZE as u64) * 8;
    block[56..].copy_from_slice(&bit_len.to_be_bytes());
    block
}

/// Resume compression from `midstate` over the padded tail and return the
/// single SHA256 digest of the whole header.
pub fn finish_hash(midstate: &Midstate, padded_tail: &[u8; BLOCK_SIZE]) -> [u8; 32] {
    let mut state = midstate.0;
    compress(&mut state, padded_tail);

    let mut hash = [0u8; 32];
    for (chunk, word) in hash.chunks_exact_mut(4).zip(state.iter()) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    hash
}

fn compress(state: &mut [u32; 8], block: &[u8; BLOCK_SIZE]) {
    let block: GenericArray<u8, U64> = GenericArray::clone_from_slice(block);
    compress256(state, &[block]);
}

/// Per-header hashing state: the midstate and a padded tail template whose
/// nonce bytes are overwritten on every attempt.
#[derive(Debug, Clone)]
pub struct HeaderHasher {
    midstate: Midstate,
    padded_tail: [u8; BLOCK_SIZE],
}

impl HeaderHasher {
    /// Precompute the midstate and padding for `header`. Its nonce is
    /// irrelevant.
    pub fn new(header: &BlockHeader) -> Result<Self> {
        let serialized = header.serialize();
        let midstate = compute_midstate(&serialized[..BLOCK_SIZE])?;

        Ok(HeaderHasher {
            midstate,
            padded_tail: pad_tail(&tail_bytes(header)),
        })
    }

    pub fn midstate(&self) -> &Midstate {
        &self.midstate
    }

    /// The padded final block, carrying the nonce of the source header.
    pub fn padded_tail(&self) -> &[u8; BLOCK_SIZE] {
        &self.padded_tail
    }

    /// Single SHA256 of the header with `nonce` substituted.
    #[inline]
    pub fn first_hash(&self, nonce: u32) -> [u8; 32] {
        let mut block = self.padded_tail;
        block[NONCE_OFFSET..NONCE_OFFSET + 4].copy_from_slice(&nonce.to_le_bytes());
        finish_hash(&self.midstate, &block)
    }

    /// Double SHA256 of the header with `nonce` substituted.
    #[inline]
    pub fn double_hash(&self, nonce: u32) -> [u8; 32] {
        sha256(&self.first_hash(nonce))
    }
}
