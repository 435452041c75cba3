//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::args::LogFormat;

/// Install the global subscriber. Logs go to stderr so stdout carries only
/// the result.
pub fn init_logging(level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_names(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
