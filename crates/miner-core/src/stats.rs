//! Mining session statistics shared between the search worker and any
//! status reporters.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::hash::hash_to_display_hex;
use crate::search::Solution;

/// Lifecycle of a nonce search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchState {
    /// Header and target are set, nothing hashed yet.
    Idle,
    /// The worker is hashing.
    Searching,
    /// A nonce meeting the target was found.
    Found,
    /// The nonce space or batch allowance ran out.
    Exhausted,
    /// Cancellation was observed between attempts.
    Cancelled,
}

impl SearchState {
    /// Whether the session has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchState::Found | SearchState::Exhausted | SearchState::Cancelled
        )
    }

    /// Lowercase name for display.
    pub fn name(&self) -> &'static str {
        match self {
            SearchState::Idle => "idle",
            SearchState::Searching => "searching",
            SearchState::Found => "found",
            SearchState::Exhausted => "exhausted",
            SearchState::Cancelled => "cancelled",
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SearchState::Idle => 0,
            SearchState::Searching => 1,
            SearchState::Found => 2,
            SearchState::Exhausted => 3,
            SearchState::Cancelled => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SearchState::Searching,
            2 => SearchState::Found,
            3 => SearchState::Exhausted,
            4 => SearchState::Cancelled,
            _ => SearchState::Idle,
        }
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hashes per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct HashRate(pub f64);

impl fmt::Display for HashRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rate = self.0;
        if rate >= 1_000_000_000.0 {
            write!(f, "{:.2} GH/s", rate / 1_000_000_000.0)
        } else if rate >= 1_000_000.0 {
            write!(f, "{:.2} MH/s", rate / 1_000_000.0)
        } else if rate >= 1_000.0 {
            write!(f, "{:.2} KH/s", rate / 1_000.0)
        } else {
            write!(f, "{:.2} H/s", rate)
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    sample_hash: Option<[u8; 32]>,
    solution: Option<Solution>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

/// Session progress.
///
/// The hash counter, state and cancellation flag are atomics so the worker
/// never waits on a reader. The sample hash, solution and timing change
/// rarely and sit behind one short-held lock.
#[derive(Debug)]
pub struct MiningStats {
    hashes: AtomicU64,
    state: AtomicU8,
    cancelled: AtomicBool,
    progress: Mutex<Progress>,
}

impl Default for MiningStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MiningStats {
    /// Create new empty stats in the `Idle` state.
    pub fn new() -> Self {
        MiningStats {
            hashes: AtomicU64::new(0),
            state: AtomicU8::new(SearchState::Idle.as_u8()),
            cancelled: AtomicBool::new(false),
            progress: Mutex::new(Progress::default()),
        }
    }

    /// Ask the worker to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Total hashes attempted so far.
    pub fn total_hashes(&self) -> u64 {
        self.hashes.load(Ordering::Relaxed)
    }

    pub fn add_hashes(&self, count: u64) {
        self.hashes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn state(&self) -> SearchState {
        SearchState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_found(&self) -> bool {
        self.state() == SearchState::Found
    }

    /// Replace the sample hash shown by reporters.
    pub fn record_sample(&self, hash: [u8; 32]) {
        self.progress.lock().sample_hash = Some(hash);
    }

    pub fn sample_hash(&self) -> Option<[u8; 32]> {
        self.progress.lock().sample_hash
    }

    pub fn solution(&self) -> Option<Solution> {
        self.progress.lock().solution
    }

    /// Time spent searching, up to now or to the end of the session.
    pub fn elapsed(&self) -> Duration {
        let progress = self.progress.lock();
        match (progress.started_at, progress.finished_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Average hash rate over the session.
    pub fn hash_rate(&self) -> HashRate {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            HashRate(self.total_hashes() as f64 / elapsed)
        } else {
            HashRate::default()
        }
    }

    /// Consistent copy of the current progress for display.
    pub fn snapshot(&self) -> StatsSnapshot {
        let (sample_hash, solution) = {
            let progress = self.progress.lock();
            (progress.sample_hash, progress.solution)
        };
        let elapsed = self.elapsed();

        StatsSnapshot {
            state: self.state(),
            total_hashes: self.total_hashes(),
            hash_rate: self.hash_rate().0,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            sample_hash: sample_hash.as_ref().map(hash_to_display_hex),
            nonce: solution.map(|s| s.nonce),
            hash: solution.as_ref().map(|s| hash_to_display_hex(&s.hash)),
        }
    }

    /// Start a new session. Counters and results from any earlier session
    /// on this handle are discarded; a pending cancellation is kept.
    pub(crate) fn begin(&self) {
        {
            let mut progress = self.progress.lock();
            *progress = Progress {
                started_at: Some(Instant::now()),
                ..Progress::default()
            };
            self.hashes.store(0, Ordering::Relaxed);
        }
        self.set_state(SearchState::Searching);
    }

    pub(crate) fn finish(&self, state: SearchState, solution: Option<Solution>) {
        {
            let mut progress = self.progress.lock();
            progress.finished_at = Some(Instant::now());
            if let Some(solution) = solution {
                progress.sample_hash = Some(solution.hash);
                progress.solution = Some(solution);
            }
        }
        self.set_state(state);
    }

    fn set_state(&self, state: SearchState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

/// Point-in-time view of [`MiningStats`]. Hashes are in display order.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub state: SearchState,
    pub total_hashes: u64,
    pub hash_rate: f64,
    pub elapsed_ms: f64,
    pub sample_hash: Option<String>,
    pub nonce: Option<u32>,
    pub hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockHeader;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_stats_are_idle() {
        let stats = MiningStats::new();
        assert_eq!(stats.state(), SearchState::Idle);
        assert_eq!(stats.total_hashes(), 0);
        assert!(!stats.is_cancelled());
        assert!(stats.solution().is_none());
        assert_eq!(stats.elapsed(), Duration::ZERO);
        assert_eq!(stats.hash_rate(), HashRate(0.0));
    }

    #[test]
    fn test_cancel_is_sticky() {
        let stats = MiningStats::new();
        stats.cancel();
        assert!(stats.is_cancelled());
        stats.cancel();
        assert!(stats.is_cancelled());
    }

    #[test]
    fn test_concurrent_hash_counting() {
        let stats = Arc::new(MiningStats::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        stats.add_hashes(1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.total_hashes(), 40_000);
    }

    #[test]
    fn test_finish_records_solution() {
        let stats = MiningStats::new();
        stats.begin();
        assert_eq!(stats.state(), SearchState::Searching);

        let header = BlockHeader::new(1, [0; 32], [0; 32], 0, 0x2000ffff).with_nonce(7);
        let mut hash = [0u8; 32];
        hash[0] = 0x42;
        stats.finish(
            SearchState::Found,
            Some(Solution {
                nonce: 7,
                hash,
                header,
            }),
        );

        assert!(stats.is_found());
        assert_eq!(stats.solution().map(|s| s.nonce), Some(7));
        assert_eq!(stats.sample_hash(), Some(hash));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.state, SearchState::Found);
        assert_eq!(snapshot.nonce, Some(7));
        assert!(snapshot.hash.unwrap().ends_with("42"));
    }

    #[test]
    fn test_begin_clears_previous_session() {
        let stats = MiningStats::new();
        stats.begin();
        stats.add_hashes(12);
        let header = BlockHeader::new(1, [0; 32], [0; 32], 0, 0x2000ffff).with_nonce(11);
        stats.finish(
            SearchState::Found,
            Some(Solution {
                nonce: 11,
                hash: [0x42; 32],
                header,
            }),
        );

        stats.begin();
        assert_eq!(stats.state(), SearchState::Searching);
        assert_eq!(stats.total_hashes(), 0);
        assert!(stats.solution().is_none());
        assert!(stats.sample_hash().is_none());

        stats.add_hashes(5);
        stats.finish(SearchState::Exhausted, None);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.state, SearchState::Exhausted);
        assert_eq!(snapshot.total_hashes, 5);
        assert!(snapshot.nonce.is_none());
        assert!(snapshot.hash.is_none());
    }

    #[test]
    fn test_begin_keeps_pending_cancel() {
        let stats = MiningStats::new();
        stats.cancel();
        stats.begin();
        assert!(stats.is_cancelled());
    }

    #[test]
    fn test_state_terminal() {
        assert!(!SearchState::Idle.is_terminal());
        assert!(!SearchState::Searching.is_terminal());
        assert!(SearchState::Found.is_terminal());
        assert!(SearchState::Exhausted.is_terminal());
        assert!(SearchState::Cancelled.is_terminal());
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = MiningStats::new();
        stats.add_hashes(12);
        let json = serde_json::to_value(stats.snapshot()).unwrap();

        assert_eq!(json["state"], "idle");
        assert_eq!(json["total_hashes"], 12);
        assert!(json["nonce"].is_null());
    }

    #[test]
    fn test_hash_rate_display() {
        assert_eq!(HashRate(950.0).to_string(), "950.00 H/s");
        assert_eq!(HashRate(1_500.0).to_string(), "1.50 KH/s");
        assert_eq!(HashRate(2_500_000.0).to_string(), "2.50 MH/s");
        assert_eq!(HashRate(3_200_000_000.0).to_string(), "3.20 GH/s");
    }
}
