//! The process-wide generation lock
//!
//! Every report generation forks a memory-hungry worker, so generations are
//! totally ordered: one handle is constructed at startup and cloned into both
//! caches and the generator. The lock is not re-entrant; code that already
//! holds it passes its [`GenerationPermit`] along instead of acquiring again.

use recap_core::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

#[derive(Debug, Clone)]
pub struct GenerationLock {
    semaphore: Arc<Semaphore>,
    acquisitions: Arc<AtomicU64>,
}

/// Proof of holding the generation lock; released on drop
#[derive(Debug)]
pub struct GenerationPermit {
    _permit: OwnedSemaphorePermit,
    semaphore: Arc<Semaphore>,
    acquired_at: Instant,
}

impl GenerationPermit {
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Whether this permit was granted by `lock` (or one of its clones)
    pub fn issued_by(&self, lock: &GenerationLock) -> bool {
        Arc::ptr_eq(&self.semaphore, &lock.semaphore)
    }
}

impl GenerationLock {
    /// A single-slot lock: at most one generation at a time
    pub fn new() -> Self {
        Self::with_permits(1)
    }

    /// A lock that never blocks, for tests that want to observe unserialized behaviour
    pub fn unrestricted() -> Self {
        Self::with_permits(Semaphore::MAX_PERMITS)
    }

    fn with_permits(permits: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            acquisitions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wait for the lock
    pub async fn acquire(&self) -> Result<GenerationPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::configuration("generation lock has been closed"))?;
        Ok(self.granted(permit))
    }

    /// Take the lock only if nobody holds it
    pub fn try_acquire(&self) -> Option<GenerationPermit> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Some(self.granted(permit)),
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => None,
        }
    }

    fn granted(&self, permit: OwnedSemaphorePermit) -> GenerationPermit {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        GenerationPermit {
            _permit: permit,
            semaphore: Arc::clone(&self.semaphore),
            acquired_at: Instant::now(),
        }
    }

    /// Total number of times the lock has been granted
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Whether two handles guard the same generations
    pub fn same_lock(&self, other: &GenerationLock) -> bool {
        Arc::ptr_eq(&self.semaphore, &other.semaphore)
    }
}

impl Default for GenerationLock {
    fn default() -> Self {
        Self::new()
    }
}
