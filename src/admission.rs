//! Bounded resources used by the dispatcher to admit requests.
//!
//! Admission and concurrency are two separate limits: an [`AdmissionGate`]
//! hands out at most `N` admissions over the whole run and never takes them
//! back, while a [`ConcurrencyLimit`] caps the number of requests in flight at
//! `C` and gets each slot back once its request completes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Monotonic counter with a hard cap.
#[derive(Debug)]
pub struct AdmissionGate {
    admitted: AtomicU64,
    limit: u64,
}

impl AdmissionGate {
    pub fn new(limit: u64) -> Self {
        Self {
            admitted: AtomicU64::new(0),
            limit,
        }
    }

    /// Consumes one admission slot. Returns `false` once `limit` slots have
    /// been handed out.
    pub fn try_admit(&self) -> bool {
        self.admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |admitted| {
                (admitted < self.limit).then_some(admitted + 1)
            })
            .is_ok()
    }

    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.admitted() >= self.limit
    }
}

/// Counting semaphore holding one permit per concurrency slot.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimit {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimit {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        Arc::clone(&self.semaphore).acquire_owned().await
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
