//! Logging module for authsock-pin
//!
//! Human-readable diagnostics go to stderr via tracing; structured
//! per-event records optionally go to a JSONL file. Neither is part of
//! the forwarding contract.

pub mod jsonl;

pub use jsonl::{JsonlWriter, LogEvent, LogEventKind};

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` overrides the verbosity flags when set.
pub fn init(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else if quiet {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
