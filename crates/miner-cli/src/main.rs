//! goblin-miner: search a block template for a proof-of-work nonce.
//!
//! Exit status is 0 when a solution is found or the search is interrupted,
//! 2 when the nonce range runs out, and 1 on any fatal error.

mod args;
mod logging;
mod reporter;

use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use miner_core::difficulty::{expected_hashes, format_difficulty};
use miner_core::{
    bits_to_difficulty, BlockTemplate, MiningStats, NonceSearch, SearchOutcome, StatsSnapshot,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::args::Args;
use crate::reporter::Reporter;

const EXIT_FATAL: u8 = 1;
const EXIT_EXHAUSTED: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_logging(&args.log_level, args.log_format);

    let result = run(&args);
    if let Err(err) = &result {
        eprintln!("{}", error_line(err));
    }
    ExitCode::from(status_for(&result))
}

fn run(args: &Args) -> Result<SearchOutcome> {
    let json = fs::read_to_string(&args.template)
        .with_context(|| format!("failed to read template {}", args.template.display()))?;
    let template = BlockTemplate::from_json(&json).context("invalid block template")?;

    let stats = Arc::new(MiningStats::new());
    let search = NonceSearch::from_template(&template, args.search_config(), Arc::clone(&stats))
        .context("failed to prepare nonce search")?;

    let difficulty = bits_to_difficulty(search.header().bits())?;
    info!(
        height = template.height,
        difficulty = %format_difficulty(difficulty),
        target = %hex::encode(search.target()),
        "Loaded block template"
    );

    let handler_stats = Arc::clone(&stats);
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping search");
        handler_stats.cancel();
    })
    .context("failed to install interrupt handler")?;

    // Dropping the reporter on an early return stops its thread
    let reporter = args
        .report_interval()
        .map(|interval| Reporter::spawn(Arc::clone(&stats), interval, expected_hashes(difficulty)))
        .transpose()
        .context("failed to spawn status reporter")?;

    let worker = thread::Builder::new()
        .name("nonce-search".into())
        .spawn(move || search.run())
        .context("failed to spawn search worker")?;

    let joined = worker.join();
    if let Some(reporter) = reporter {
        reporter.stop();
    }
    let outcome = joined.map_err(|_| anyhow!("search worker panicked"))??;

    let result = SearchReport::new(&outcome, stats.snapshot());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", result.to_text());
    }

    Ok(outcome)
}

/// Process exit status for the result of [`run`].
fn status_for(result: &Result<SearchOutcome>) -> u8 {
    match result {
        Ok(outcome) => exit_status(outcome),
        Err(_) => EXIT_FATAL,
    }
}

/// One-line description of a fatal error, including its causes.
fn error_line(err: &anyhow::Error) -> String {
    format!("Error: {:#}", err)
}

/// Process exit status for a finished search.
fn exit_status(outcome: &SearchOutcome) -> u8 {
    match outcome {
        SearchOutcome::Found(_) | SearchOutcome::Cancelled => 0,
        SearchOutcome::Exhausted => EXIT_EXHAUSTED,
    }
}

/// Final result printed on stdout.
#[derive(Debug, Serialize)]
struct SearchReport {
    #[serde(flatten)]
    stats: StatsSnapshot,
    /// Solved 80-byte header, hex encoded in wire order.
    header: Option<String>,
}

impl SearchReport {
    fn new(outcome: &SearchOutcome, stats: StatsSnapshot) -> Self {
        let header = match outcome {
            SearchOutcome::Found(solution) => Some(hex::encode(solution.header.serialize())),
            _ => None,
        };
        SearchReport { stats, header }
    }

    fn to_text(&self) -> String {
        let mut out = format!(
            "state: {}\nhashes: {}\nelapsed: {:.3}s\n",
            self.stats.state,
            self.stats.total_hashes,
            self.stats.elapsed_ms / 1000.0
        );
        if let (Some(nonce), Some(hash)) = (self.stats.nonce, &self.stats.hash) {
            out.push_str(&format!("nonce: {}\nhash: {}\n", nonce, hash));
        }
        if let Some(header) = &self.header {
            out.push_str(&format!("header: {}\n", header));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miner_core::{SearchConfig, SearchMode};

    const TEMPLATE: &str = r#"{
        "version": 536870912,
        "previousblockhash": "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054",
        "merkleroot": "3ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a",
        "curtime": 1700000000,
        "bits": "2000ffff"
    }"#;

    fn solve() -> (SearchOutcome, Arc<MiningStats>) {
        let template = BlockTemplate::from_json(TEMPLATE).unwrap();
        let stats = Arc::new(MiningStats::new());
        let config = SearchConfig {
            mode: SearchMode::Direct,
            ..SearchConfig::default()
        };
        let search = NonceSearch::from_template(&template, config, Arc::clone(&stats)).unwrap();
        (search.run().unwrap(), stats)
    }

    #[test]
    fn test_exit_status() {
        let (found, _) = solve();
        assert_eq!(exit_status(&found), 0);
        assert_eq!(exit_status(&SearchOutcome::Cancelled), 0);
        assert_eq!(exit_status(&SearchOutcome::Exhausted), 2);
    }

    fn write_template(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "goblin-miner-{}-{}.json",
            std::process::id(),
            name
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_field_is_fatal() {
        let without_merkle = TEMPLATE.replace(
            r#""merkleroot": "3ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a","#,
            "",
        );
        let path = write_template("missing-merkleroot", &without_merkle);
        let args = Args::try_parse_from(["goblin-miner", path.to_str().unwrap()]).unwrap();

        let result = run(&args);
        fs::remove_file(&path).unwrap();

        assert_eq!(status_for(&result), 1);
        let line = error_line(&result.unwrap_err());
        assert!(line.starts_with("Error: invalid block template"));
        assert!(line.contains("`merkleroot` is missing"));
    }

    #[test]
    fn test_unreadable_template_is_fatal() {
        let path = std::env::temp_dir().join("goblin-miner-does-not-exist.json");
        let args = Args::try_parse_from(["goblin-miner", path.to_str().unwrap()]).unwrap();

        let result = run(&args);
        assert_eq!(status_for(&result), 1);
        assert!(error_line(&result.unwrap_err()).contains("failed to read template"));
    }

    #[test]
    fn test_status_for_outcomes() {
        assert_eq!(status_for(&Ok(SearchOutcome::Cancelled)), 0);
        assert_eq!(status_for(&Ok(SearchOutcome::Exhausted)), 2);
    }

    #[test]
    fn test_report_for_solution() {
        let (outcome, stats) = solve();
        let report = SearchReport::new(&outcome, stats.snapshot());

        let header = report.header.clone().unwrap();
        assert_eq!(header.len(), 160);
        // Nonce 11, little-endian, closes the header
        assert!(header.ends_with("0b000000"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "found");
        assert_eq!(json["nonce"], 11);
        assert_eq!(json["total_hashes"], 12);
        assert_eq!(json["header"], header);

        let text = report.to_text();
        assert!(text.contains("state: found\n"));
        assert!(text.contains("nonce: 11\n"));
    }

    #[test]
    fn test_report_without_solution() {
        let stats = MiningStats::new();
        let report = SearchReport::new(&SearchOutcome::Cancelled, stats.snapshot());

        assert!(report.header.is_none());
        assert!(!report.to_text().contains("nonce"));
        assert!(serde_json::to_value(&report).unwrap()["header"].is_null());
    }
}
