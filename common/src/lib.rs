//! Ambient stack shared by the `dcc-tools` binaries: output/runtime
//! configuration, tracing subscriber setup, and build-time version info.

pub mod config;
pub mod logging;
pub mod progress;
pub mod version;
