//! Periodic status reporting from a background thread.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use miner_core::hash::count_leading_zeros;
use miner_core::MiningStats;
use tracing::info;

/// Background thread logging [`MiningStats`] until stopped.
pub struct Reporter {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Reporter {
    /// Start reporting every `interval`. `expected_hashes` is the average
    /// work needed at the session's difficulty and scales the progress
    /// figure.
    pub fn spawn(
        stats: Arc<MiningStats>,
        interval: Duration,
        expected_hashes: f64,
    ) -> std::io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("status-reporter".into())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => report(&stats, expected_hashes),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Reporter { stop, handle })
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(self) {
        drop(self.stop);
        let _ = self.handle.join();
    }
}

fn report(stats: &MiningStats, expected_hashes: f64) {
    let total = stats.total_hashes();
    let sample = stats.sample_hash();

    info!(
        state = %stats.state(),
        hashes = total,
        rate = %stats.hash_rate(),
        progress = %format_progress(total, expected_hashes),
        sample_zeros = sample.as_ref().map(count_leading_zeros).unwrap_or(0),
        "Mining status"
    );
}

/// Share of the expected work done so far, as a percentage.
pub fn format_progress(total_hashes: u64, expected_hashes: f64) -> String {
    if expected_hashes <= 0.0 || !expected_hashes.is_finite() {
        return "n/a".to_string();
    }
    format!("{:.4}%", total_hashes as f64 / expected_hashes * 100.0)
}
