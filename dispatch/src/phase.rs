//! Phase notifications and the end-of-dispatch summary line.
//!
//! Uses the same `#[instrument]` + `tracing::info!` idiom as
//! `remote/src/lib.rs` and `rcp/src/source.rs`. Elapsed-time math uses
//! `std::time::Instant`, never wall-clock timestamps.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub enum Phase {
    Connect { hostname: String },
    Send { hostname: String },
    Cpp { input: PathBuf },
    Compile { hostname: String },
}

impl Phase {
    pub fn locality(&self) -> Locality {
        match self {
            Phase::Cpp { .. } => Locality::Local,
            Phase::Connect { .. } | Phase::Send { .. } | Phase::Compile { .. } => Locality::Remote,
        }
    }
}

/// Publish a phase transition. A thin wrapper over `tracing` today; kept as
/// a function (rather than inlined `tracing::info!` calls at each call
/// site) so every phase notification carries the same fields.
pub fn notify(phase: &Phase) {
    match phase {
        Phase::Connect { hostname } => {
            tracing::info!(hostname, locality = ?phase.locality(), "phase: connect")
        }
        Phase::Send { hostname } => {
            tracing::info!(hostname, locality = ?phase.locality(), "phase: send")
        }
        Phase::Cpp { input } => {
            tracing::info!(input = %input.display(), locality = ?phase.locality(), "phase: running local preprocessor")
        }
        Phase::Compile { hostname } => {
            tracing::info!(hostname, locality = ?phase.locality(), "phase: remote compile")
        }
    }
}

/// Emitted once, on a successful CLIENT dispatch: DOTI byte count, input
/// filename, hostname, elapsed seconds, throughput in kB/s. Timing samples
/// are taken immediately before CONNECT and immediately after RECEIVE.
pub fn log_summary(doti_bytes: u64, input: &std::path::Path, hostname: &str, elapsed: Duration) {
    let elapsed_secs = elapsed.as_secs_f64();
    let kb_per_sec = if elapsed_secs > 0.0 {
        (doti_bytes as f64 / 1024.0) / elapsed_secs
    } else {
        0.0
    };
    tracing::info!(
        doti_bytes,
        input = %input.display(),
        hostname,
        elapsed_secs,
        kb_per_sec,
        "dispatch summary"
    );
}
