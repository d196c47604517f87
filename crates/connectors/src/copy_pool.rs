use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Bounded permit pool shared between entity-level copy tasks and the part
/// copies nested inside a multipart copy.
///
/// The pool is handed to `multipart_copy` explicitly so a nested copy draws
/// permits from the same pool instead of spawning its own and starving the
/// outer tasks. The scheduler caps entity-level tasks at half the pool,
/// leaving the rest for parts.
#[derive(Debug, Clone)]
pub struct CopyPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl CopyPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        CopyPool {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Concurrency limit for entity-level copy tasks.
    pub fn max_concurrent_copies(&self) -> usize {
        (self.size / 2).max(1)
    }

    /// Wait for a permit. The permit is released on drop.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        Arc::clone(&self.permits).acquire_owned().await
    }
}
