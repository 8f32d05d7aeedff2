use std::path::PathBuf;

/// One dispatch call's inputs: the compiler invocation plus everything the
/// orchestrator needs to stream it and collect a result.
pub struct JobDescriptor {
    pub argv: Vec<String>,
    /// Input source filename, carried for logging/state only.
    pub input_filename: PathBuf,
    /// Meaningful only when `site == Client`: the already-preprocessed source.
    pub preprocessed_source: Option<PathBuf>,
    /// Meaningful only when `site == Server`: files to ship for remote preprocessing.
    pub file_list: Vec<PathBuf>,
    pub output_object: PathBuf,
    pub dependency_output: Option<PathBuf>,
    pub server_stderr_path: Option<PathBuf>,
    /// The backgrounded preprocessor child, if one was forked before dispatch.
    /// `None` is the "id 0 / already reaped" case from the wire spec.
    pub cpp_child: Option<tokio::process::Child>,
    /// An already-acquired local preprocessing slot, or none. The orchestrator
    /// releases this at the appropriate point but never acquires one itself.
    pub local_lock: Option<lock::LockHandle>,
    pub lto_distribution: bool,
}

impl JobDescriptor {
    /// Whether GCDA staging applies to this job (spec: client-side, non-LTO).
    pub fn wants_gcda_staging(&self, site: crate::host::PreprocessingSite) -> bool {
        site == crate::host::PreprocessingSite::Client && !self.lto_distribution
    }
}

/// The two independent results of a dispatch call: whether the dispatch
/// machinery itself completed cleanly, and what the remote compiler did (if
/// we got far enough to ask). `remote_wait_status` is the raw status word
/// the result receiver read off the wire, not a local `ExitStatus` - the
/// remote process is never a child of this one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOutcome {
    /// Zero iff no communication failure occurred. A zero status does not
    /// imply a successful compile.
    pub transport_status: i32,
    pub remote_wait_status: Option<i32>,
}
