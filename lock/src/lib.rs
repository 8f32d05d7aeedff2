//! The local preprocessing-slot lock.
//!
//! Limits how many local preprocessor children may run concurrently. The
//! dispatch engine itself never acquires this lock - it only accepts an
//! already-acquired [`LockHandle`] (or none) as part of a job, and
//! guarantees to release it exactly once regardless of how the dispatch
//! call exits. See `dcc-tools-dispatch` for that guarantee.

mod semaphore;

use once_cell::sync::Lazy;

static SLOTS: Lazy<semaphore::Semaphore> = Lazy::new(semaphore::Semaphore::new);

/// Configure the number of local preprocessing slots. Call once at startup;
/// a value of 0 (the default) means unlimited.
pub fn set_max_local_preprocessors(max: usize) {
    SLOTS.setup(max);
}

/// A held (or empty) local-lock slot.
///
/// Dropping a held handle without calling [`LockHandle::release`] also
/// releases the slot - `release` exists so callers can release it earlier
/// than end-of-scope and observe that it happened.
pub struct LockHandle {
    permit: Option<tokio::sync::OwnedSemaphorePermit>,
}

impl LockHandle {
    /// A handle that holds no slot - the "none" case from the job descriptor.
    pub fn none() -> Self {
        Self { permit: None }
    }

    pub fn is_held(&self) -> bool {
        self.permit.is_some()
    }

    /// Release the slot if held. Idempotent: calling this more than once,
    /// or on a handle that never held a slot, is a no-op.
    pub fn release(&mut self) {
        if self.permit.take().is_some() {
            tracing::trace!("released local preprocessing slot");
        }
    }
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("held", &self.is_held())
            .finish()
    }
}

/// Acquire a local preprocessing slot, waiting if the configured limit is
/// currently exhausted. Returns a handle holding no slot if no limit was
/// ever configured via [`set_max_local_preprocessors`].
pub async fn acquire_local_preprocess_slot() -> LockHandle {
    LockHandle {
        permit: SLOTS.acquire().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_handle_is_not_held() {
        let mut h = LockHandle::none();
        assert!(!h.is_held());
        h.release();
        assert!(!h.is_held());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        set_max_local_preprocessors(1);
        let mut h = acquire_local_preprocess_slot().await;
        assert!(h.is_held());
        h.release();
        assert!(!h.is_held());
        h.release();
        assert!(!h.is_held());
    }

}
