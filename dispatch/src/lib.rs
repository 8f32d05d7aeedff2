//! The remote compilation dispatch engine.
//!
//! Given one local compiler invocation, opens a transport to a chosen
//! compile host, overlaps local preprocessing with connection setup,
//! frames and streams the compile request, handles the `.gcda`
//! profile-guided-optimization side channel, retrieves the remote result,
//! and guarantees teardown of every local resource - lock, file
//! descriptors, child processes - on every exit path.
//!
//! Argument parsing, host selection, the preprocessor child itself, and the
//! compile server are all out of scope: this crate only drives the
//! dispatch state machine once a caller has already decided to go remote
//! and built a [`HostDef`]/[`JobDescriptor`] pair.

pub mod auth;
pub mod cleanup;
pub mod cpp_wait;
pub mod error;
pub mod framer;
pub mod gcda;
pub mod host;
pub mod job;
mod orchestrator;
pub mod path_mangle;
pub mod phase;
pub mod result_receiver;
pub mod transport;
pub mod wire;

pub use error::DispatchError;
pub use host::{HostDef, PreprocessingSite, TransportMode};
pub use job::{DispatchOutcome, JobDescriptor};
pub use orchestrator::{dispatch, dispatch_with};
pub use path_mangle::mangle_path;
