//! Process-wide concurrency controls.
//!
//! Both are built once at startup from configuration and handed to the
//! components that need them.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::{Error, Result};

/// Caps how many sessions may run their decision graph at once.
///
/// Callers beyond the bound wait in `acquire` until a permit is dropped.
#[derive(Debug, Clone)]
pub struct TurnLimiter {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// Held for the duration of one graph run; the slot frees on drop.
#[derive(Debug)]
pub struct TurnPermit {
    _permit: OwnedSemaphorePermit,
}

impl TurnLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<TurnPermit> {
        if self.permits.available_permits() == 0 {
            debug!(capacity = self.capacity, "All turn slots busy, waiting");
        }
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::Internal(format!("turn limiter closed: {e}")))?;
        Ok(TurnPermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

/// Fixed-size pool for CPU-bound work that must stay off the async workers.
#[derive(Debug, Clone)]
pub struct BlockingPool {
    slots: Arc<Semaphore>,
    workers: usize,
}

impl BlockingPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            slots: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` on a blocking thread once one of the pool's slots is free.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::Internal(format!("blocking pool closed: {e}")))?;
        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| Error::Internal(format!("blocking job failed: {e}")))
    }
}

impl Default for BlockingPool {
    fn default() -> Self {
        Self::new(4)
    }
}
