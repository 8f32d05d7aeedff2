//! The process-wide staging-file cleanup registry.
//!
//! Matches the `lazy_static! { static ref ... }` singleton idiom used
//! elsewhere in this codebase (`throttle/src/lib.rs`), with
//! `once_cell::sync::Lazy` substituted in since newer crates here have
//! moved off `lazy_static`. Modeled as a trait so the dispatcher can be
//! tested against a recording fake instead of the real registry.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::DispatchError;

pub trait CleanupRegistry: Send + Sync {
    /// Enqueue `path` for removal. Serializes internally; the core assumes
    /// this call is safe to make from any task.
    fn register(&self, path: PathBuf) -> Result<(), DispatchError>;
}

/// The real, process-wide registry: an unlink-on-drain list.
#[derive(Default)]
pub struct ProcessCleanupRegistry {
    paths: Mutex<Vec<PathBuf>>,
}

impl ProcessCleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every registered path from disk and clear the registry.
    /// Individual unlink failures are logged, not propagated - by the time
    /// this runs the dispatch call that staged the file is already done.
    pub fn drain(&self) {
        let mut paths = match self.paths.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for path in paths.drain(..) {
            if let Err(err) = std::fs::remove_file(&path) {
                tracing::debug!(?path, %err, "failed to remove staged cleanup file");
            }
        }
    }
}

impl CleanupRegistry for ProcessCleanupRegistry {
    fn register(&self, path: PathBuf) -> Result<(), DispatchError> {
        match self.paths.lock() {
            Ok(mut paths) => {
                paths.push(path);
                Ok(())
            }
            Err(_) => Err(DispatchError::Logic("cleanup registry poisoned".into())),
        }
    }
}

pub static PROCESS_CLEANUP: once_cell::sync::Lazy<ProcessCleanupRegistry> =
    once_cell::sync::Lazy::new(ProcessCleanupRegistry::new);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_paths_are_removed_on_drain() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("staged.gcda");
        std::fs::write(&file, b"counters").unwrap();

        let registry = ProcessCleanupRegistry::new();
        registry.register(file.clone()).unwrap();
        assert!(file.exists());
        registry.drain();
        assert!(!file.exists());
    }

    #[test]
    fn draining_twice_is_harmless() {
        let registry = ProcessCleanupRegistry::new();
        registry.drain();
        registry.drain();
    }
}
