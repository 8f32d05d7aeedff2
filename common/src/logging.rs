//! Tracing subscriber setup shared by the dcc-tools binaries.
//!
//! Verbosity follows the `-v` counting convention used across the CLI:
//! `0 = ERROR, 1 = INFO, 2 = DEBUG, 3+ = TRACE`. `RUST_LOG` always wins when
//! set, so a developer chasing one noisy module can still reach for it
//! without fighting `-v`.

use crate::config::OutputConfig;

fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    if quiet {
        return tracing::Level::ERROR;
    }
    match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

/// Install a global `tracing` subscriber for a `dcc-tools` binary. A no-op
/// if a subscriber is already installed (e.g. under a test harness).
pub fn init(output: &OutputConfig) {
    let default_directive = level_for(output.verbose, output.quiet);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_directive.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}
