use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Process-wide admission gate for subprocess-backed jobs.
///
/// One budget covers clone and scan jobs alike. Waiters are admitted in the
/// order they arrived (tokio's semaphore is fair), so nobody starves while
/// slots keep turning over. Cloning the limiter shares the same slots.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    admissions: Arc<AtomicUsize>,
}

/// An admitted slot. Dropping it frees the slot and wakes at most one waiter.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl Slot {
    /// Free the slot explicitly (same as dropping it)
    pub fn release(self) {}
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            admissions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait until a slot is free and take it.
    pub async fn acquire(&self) -> Slot {
        // The semaphore is owned here and never closed, so acquisition cannot fail.
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        self.admissions.fetch_add(1, Ordering::Relaxed);
        Slot { _permit: permit }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Total number of admissions since construction
    pub fn admissions(&self) -> usize {
        self.admissions.load(Ordering::Relaxed)
    }
}
