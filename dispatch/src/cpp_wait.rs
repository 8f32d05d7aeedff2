//! Synchronizes with the background preprocessor child, classifies its
//! exit, and hands the release of the local preprocessing slot back to the
//! caller (the orchestrator releases it, this module only waits).

use std::path::Path;

use crate::error::DispatchError;
use crate::phase::{self, Phase};

/// The outcome of waiting on the preprocessor child.
#[derive(Debug)]
pub enum WaitOutcome {
    /// No child was provided (id 0 / already reaped) - proceed immediately.
    NotApplicable,
    Succeeded,
    /// A clean wait with a non-zero exit. This is a "critiqued" signal, not
    /// an error: the orchestrator skips STREAM/RECEIVE but still returns a
    /// zero dispatch status.
    Failed(std::process::ExitStatus),
}

/// Wait for the preprocessor child, if one exists. A `wait()` that itself
/// errors (the process vanished, an `ECHILD`-class failure) is
/// [`DispatchError::Child`] - fatal, distinct from a non-zero-but-clean exit.
pub async fn wait_for_preprocessor(
    cpp_child: Option<tokio::process::Child>,
    input: &Path,
) -> Result<WaitOutcome, DispatchError> {
    let Some(mut child) = cpp_child else {
        return Ok(WaitOutcome::NotApplicable);
    };

    phase::notify(&Phase::Cpp {
        input: input.to_path_buf(),
    });

    let status = child
        .wait()
        .await
        .map_err(|e| DispatchError::Child(e.to_string()))?;

    if status.success() {
        Ok(WaitOutcome::Succeeded)
    } else {
        tracing::warn!(
            ?status,
            input = %input.display(),
            "preprocessor child exited with failure"
        );
        Ok(WaitOutcome::Failed(status))
    }
}
