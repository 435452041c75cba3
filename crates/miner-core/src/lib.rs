//! Core Bitcoin proof-of-work search for the goblin miner.
//!
//! This crate provides pure Rust implementations of:
//! - Compact "bits" decoding into 256-bit targets
//! - Block header serialization and block template parsing
//! - SHA256 midstate precomputation for the fixed header prefix
//! - Double-SHA256 hashing and the proof-of-work check
//! - The nonce search loop with shared, thread-safe progress

pub mod block;
pub mod byte_order;
pub mod difficulty;
pub mod error;
pub mod hash;
pub mod midstate;
pub mod search;
pub mod stats;

pub use block::{BlockHeader, BlockTemplate};
pub use difficulty::{bits_to_difficulty, bits_to_target, target_to_bits};
pub use error::{MinerError, Result};
pub use hash::{double_sha256, meets_target};
pub use midstate::{compute_midstate, finish_hash, pad_tail, tail_bytes, HeaderHasher, Midstate};
pub use search::{
    BatchHasher, BatchResult, CpuBatchHasher, NonceSearch, SearchConfig, SearchMode,
    SearchOutcome, Solution,
};
pub use stats::{HashRate, MiningStats, SearchState, StatsSnapshot};
