use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A counting semaphore that can be left unconfigured, in which case
/// [`Semaphore::acquire`] is a no-op (unlimited capacity).
pub struct Semaphore {
    flag: AtomicBool,
    sem: Arc<tokio::sync::Semaphore>,
}

impl Semaphore {
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            sem: Arc::new(tokio::sync::Semaphore::const_new(
                tokio::sync::Semaphore::MAX_PERMITS,
            )),
        }
    }

    pub fn setup(&self, value: usize) {
        self.flag.store(value > 0, Ordering::Release);
        if value == 0 {
            return;
        }
        self.sem.forget_permits(self.sem.available_permits());
        self.sem.add_permits(value);
    }

    /// Acquire one slot. Returns `None` if the semaphore was never configured
    /// (i.e. the caller placed no limit on concurrency).
    pub async fn acquire(&self) -> Option<tokio::sync::OwnedSemaphorePermit> {
        if self.flag.load(Ordering::Acquire) {
            Some(self.sem.clone().acquire_owned().await.unwrap())
        } else {
            None
        }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_semaphore_never_blocks() {
        let sem = Semaphore::new();
        assert!(sem.acquire().await.is_none());
        assert!(sem.acquire().await.is_none());
    }

    #[tokio::test]
    async fn configured_semaphore_serializes_acquisition() {
        let sem = Semaphore::new();
        sem.setup(1);
        let first = sem.acquire().await;
        assert!(first.is_some());
        let second_fut = sem.acquire();
        tokio::pin!(second_fut);
        // second acquisition cannot complete while the only slot is held
        assert!(futures::poll!(&mut second_fut).is_pending());
        drop(first);
        let second = second_fut.await;
        assert!(second.is_some());
    }
}
