//! Counting admission control for simultaneous transfers.
//!
//! Wraps a fair tokio semaphore: waiters are admitted in the order they
//! asked, and a released permit goes to the longest-waiting caller.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// Capacity must be at least one.
    #[error("concurrency gate capacity must be at least 1")]
    ZeroCapacity,

    /// The gate was closed while waiting.
    #[error("concurrency gate is closed")]
    Closed,
}

/// Admits at most `capacity` holders at a time.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Proof of admission. Dropping it (or calling `release`) returns the permit.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Return the permit to the gate.
    pub fn release(self) {}
}

impl ConcurrencyGate {
    /// Create a gate with the given number of permits.
    pub fn new(capacity: usize) -> Result<Self, GateError> {
        if capacity == 0 {
            return Err(GateError::ZeroCapacity);
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait until a permit is free.
    pub async fn acquire(&self) -> Result<GatePermit, GateError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GateError::Closed)?;
        Ok(GatePermit { _permit: permit })
    }

    /// Take a permit only if one is free right now.
    ///
    /// Never jumps ahead of callers already suspended in `acquire`.
    pub fn try_acquire(&self) -> Result<Option<GatePermit>, GateError> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(Some(GatePermit { _permit: permit })),
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(TryAcquireError::Closed) => Err(GateError::Closed),
        }
    }

    /// Close the gate. Pending and future `acquire` calls fail with `Closed`.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }
}
