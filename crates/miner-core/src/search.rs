//! Nonce search over a fixed block header.
//!
//! A [`NonceSearch`] owns one header and target and walks the 32-bit nonce
//! space either one nonce at a time ([`NonceSearch::run_direct`]) or in
//! batches handed to a [`BatchHasher`] ([`NonceSearch::run_batched`]).
//! Progress goes to a shared [`MiningStats`], whose cancellation flag is
//! checked before every attempt (direct) or every batch (batched).

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::block::{BlockHeader, BlockTemplate};
use crate::error::{MinerError, Result};
use crate::hash::{hash_to_display_hex, meets_target};
use crate::midstate::HeaderHasher;
use crate::stats::{MiningStats, SearchState};

/// A nonce whose header hash meets the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u32,
    /// Double-SHA256 digest of `header`.
    pub hash: [u8; 32],
    /// The searched header with `nonce` filled in.
    pub header: BlockHeader,
}

/// How a search session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Solution),
    /// No nonce in the searched range met the target.
    Exhausted,
    /// Cancellation was observed; no result is reported.
    Cancelled,
}

impl SearchOutcome {
    /// The terminal state matching this outcome.
    pub fn state(&self) -> SearchState {
        match self {
            SearchOutcome::Found(_) => SearchState::Found,
            SearchOutcome::Exhausted => SearchState::Exhausted,
            SearchOutcome::Cancelled => SearchState::Cancelled,
        }
    }
}

/// Loop shape used by [`NonceSearch::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// One nonce per iteration, cancellation checked every attempt.
    Direct,
    /// Batches through the CPU batch hasher, cancellation checked per batch.
    Batched,
}

/// Search session configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// First nonce to try.
    pub start_nonce: u32,
    pub mode: SearchMode,
    /// Nonces per batch in batched mode.
    pub batch_size: u32,
    /// Batches to run before giving up as exhausted.
    pub max_batches: u32,
    /// Direct mode refreshes the sample hash every this many attempts.
    pub sample_interval: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            start_nonce: 0,
            mode: SearchMode::Batched,
            batch_size: 1 << 20,
            max_batches: 1000,
            sample_interval: 1 << 16,
        }
    }
}

/// Outcome of one batch of hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchResult {
    /// The first nonce in the batch meeting the target, if any.
    pub winning_nonce: Option<u32>,
    /// The winning hash, or the last hash computed when nothing was found.
    pub hash: [u8; 32],
    /// How far the batch advanced through the nonce space.
    pub hashes_attempted: u64,
}

/// Evaluates a batch of nonces starting at `nonce_base`.
///
/// Implementations must report `hashes_attempted` accurately so the next
/// base can be chosen, and only report a winning nonce whose header hash
/// meets `target`. Claims are re-checked by the search loop.
pub trait BatchHasher {
    fn try_batch(
        &mut self,
        header: &BlockHeader,
        target: &[u8; 32],
        nonce_base: u32,
    ) -> Result<BatchResult>;
}

/// Single-threaded reference [`BatchHasher`] built on the midstate engine.
#[derive(Debug, Clone)]
pub struct CpuBatchHasher {
    batch_size: u32,
    cached: Option<(BlockHeader, HeaderHasher)>,
}

impl CpuBatchHasher {
    /// Create a hasher trying up to `batch_size` nonces per batch.
    pub fn new(batch_size: u32) -> Self {
        CpuBatchHasher {
            batch_size: batch_size.max(1),
            cached: None,
        }
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    fn scan(&self, hasher: &HeaderHasher, target: &[u8; 32], nonce_base: u32) -> BatchResult {
        let batch_size = self.batch_size as u64;
        let mut nonce = nonce_base;
        let mut attempted = 0u64;

        loop {
            let hash = hasher.double_hash(nonce);
            attempted += 1;

            if meets_target(&hash, target) {
                return BatchResult {
                    winning_nonce: Some(nonce),
                    hash,
                    hashes_attempted: attempted,
                };
            }

            let next = if attempted < batch_size {
                nonce.checked_add(1)
            } else {
                None
            };
            match next {
                Some(next) => nonce = next,
                None => {
                    return BatchResult {
                        winning_nonce: None,
                        hash,
                        hashes_attempted: attempted,
                    }
                }
            }
        }
    }
}

impl BatchHasher for CpuBatchHasher {
    fn try_batch(
        &mut self,
        header: &BlockHeader,
        target: &[u8; 32],
        nonce_base: u32,
    ) -> Result<BatchResult> {
        // The midstate only depends on the nonce-free header
        let key = header.with_nonce(0);
        let hasher = match self.cached.take() {
            Some((cached, hasher)) if cached == key => hasher,
            _ => HeaderHasher::new(&key)?,
        };

        let result = self.scan(&hasher, target, nonce_base);
        self.cached = Some((key, hasher));
        Ok(result)
    }
}

/// One mining session over a fixed header and target.
#[derive(Debug)]
pub struct NonceSearch {
    header: BlockHeader,
    target: [u8; 32],
    config: SearchConfig,
    hasher: HeaderHasher,
    stats: Arc<MiningStats>,
}

impl NonceSearch {
    /// Prepare a session. The midstate is computed here, once.
    pub fn new(
        header: BlockHeader,
        target: [u8; 32],
        config: SearchConfig,
        stats: Arc<MiningStats>,
    ) -> Result<Self> {
        let hasher = HeaderHasher::new(&header)?;

        Ok(NonceSearch {
            header,
            target,
            config,
            hasher,
            stats,
        })
    }

    /// Prepare a session from a parsed block template.
    pub fn from_template(
        template: &BlockTemplate,
        config: SearchConfig,
        stats: Arc<MiningStats>,
    ) -> Result<Self> {
        let header = template.header()?;
        let target = template.target()?;
        NonceSearch::new(header, target, config, stats)
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Target as a big-endian 256-bit number.
    pub fn target(&self) -> &[u8; 32] {
        &self.target
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<MiningStats> {
        &self.stats
    }

    /// Run the session in the configured mode. Batched mode uses
    /// [`CpuBatchHasher`].
    pub fn run(&self) -> Result<SearchOutcome> {
        match self.config.mode {
            SearchMode::Direct => self.run_direct(),
            SearchMode::Batched => {
                let mut hasher = CpuBatchHasher::new(self.config.batch_size);
                self.run_batched(&mut hasher)
            }
        }
    }

    /// Try nonces one at a time from `start_nonce` up to `u32::MAX`.
    pub fn run_direct(&self) -> Result<SearchOutcome> {
        self.stats.begin();
        info!(
            start_nonce = self.config.start_nonce,
            bits = %format!("{:08x}", self.header.bits()),
            "Starting direct nonce search"
        );

        let sample_interval = self.config.sample_interval.max(1);
        let mut since_sample = 0u32;
        let mut nonce = self.config.start_nonce;

        loop {
            if self.stats.is_cancelled() {
                return Ok(self.finish(SearchOutcome::Cancelled));
            }

            let hash = self.hasher.double_hash(nonce);
            self.stats.add_hashes(1);

            if meets_target(&hash, &self.target) {
                return Ok(self.finish(SearchOutcome::Found(self.solution(nonce, hash))));
            }

            since_sample += 1;
            if since_sample == sample_interval {
                self.stats.record_sample(hash);
                since_sample = 0;
            }

            match nonce.checked_add(1) {
                Some(next) => nonce = next,
                None => return Ok(self.finish(SearchOutcome::Exhausted)),
            }
        }
    }

    /// Delegate the search to `hasher`, one batch at a time.
    pub fn run_batched<H>(&self, hasher: &mut H) -> Result<SearchOutcome>
    where
        H: BatchHasher + ?Sized,
    {
        self.stats.begin();
        info!(
            start_nonce = self.config.start_nonce,
            max_batches = self.config.max_batches,
            bits = %format!("{:08x}", self.header.bits()),
            "Starting batched nonce search"
        );

        let mut nonce_base = self.config.start_nonce;

        for batch in 0..self.config.max_batches {
            if self.stats.is_cancelled() {
                return Ok(self.finish(SearchOutcome::Cancelled));
            }

            let result = hasher.try_batch(&self.header, &self.target, nonce_base)?;
            self.stats.add_hashes(result.hashes_attempted);
            self.stats.record_sample(result.hash);

            debug!(
                batch,
                nonce_base,
                hashes = result.hashes_attempted,
                total = self.stats.total_hashes(),
                sample = %hash_to_display_hex(&result.hash),
                "Batch complete"
            );

            if let Some(nonce) = result.winning_nonce {
                let hash = self.hasher.double_hash(nonce);
                if !meets_target(&hash, &self.target) {
                    error!(nonce, "Batch hasher reported a nonce that misses the target");
                    return Err(MinerError::RejectedSolution { nonce });
                }
                return Ok(self.finish(SearchOutcome::Found(self.solution(nonce, hash))));
            }

            let next_base = u32::try_from(result.hashes_attempted)
                .ok()
                .and_then(|advance| nonce_base.checked_add(advance));
            match next_base {
                Some(next) => nonce_base = next,
                None => return Ok(self.finish(SearchOutcome::Exhausted)),
            }
        }

        Ok(self.finish(SearchOutcome::Exhausted))
    }

    fn solution(&self, nonce: u32, hash: [u8; 32]) -> Solution {
        Solution {
            nonce,
            hash,
            header: self.header.with_nonce(nonce),
        }
    }

    fn finish(&self, outcome: SearchOutcome) -> SearchOutcome {
        let total = self.stats.total_hashes();
        match &outcome {
            SearchOutcome::Found(solution) => {
                info!(
                    nonce = solution.nonce,
                    hashes = total,
                    "Solved block with hash: {}",
                    hash_to_display_hex(&solution.hash)
                );
                self.stats.finish(SearchState::Found, Some(*solution));
            }
            SearchOutcome::Exhausted => {
                warn!(hashes = total, "Nonce space exhausted without a solution");
                self.stats.finish(SearchState::Exhausted, None);
            }
            SearchOutcome::Cancelled => {
                info!(hashes = total, "Nonce search cancelled");
                self.stats.finish(SearchState::Cancelled, None);
            }
        }
        outcome
    }
}
