//! Concurrency gate for provider calls.
//!
//! Backed by a fair [`tokio::sync::Semaphore`]: waiters are admitted in the
//! order they called [`WorkerPool::acquire`]. Shutting the pool down wakes
//! every waiter with [`AppError::PoolClosed`] instead of leaving it parked.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::AppError;

/// Bounds how many provider calls run at the same time.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One admitted slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct PoolSlot {
    _permit: OwnedSemaphorePermit,
}

impl PoolSlot {
    /// Free the slot explicitly.
    pub fn release(self) {}
}

impl WorkerPool {
    /// Create a pool admitting at most `capacity` concurrent tasks.
    ///
    /// Zero capacity would block every task forever, so it is a
    /// configuration error.
    pub fn new(capacity: usize) -> Result<Self, AppError> {
        if capacity == 0 {
            return Err(AppError::ConfigError(
                "worker pool capacity must be at least 1".into(),
            ));
        }
        if capacity > Semaphore::MAX_PERMITS {
            return Err(AppError::ConfigError(format!(
                "worker pool capacity {capacity} exceeds {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait until fewer than `capacity` tasks are active, then admit one.
    pub async fn acquire(&self) -> Result<PoolSlot, AppError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map(|permit| PoolSlot { _permit: permit })
            .map_err(|_| AppError::PoolClosed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn active(&self) -> usize {
        self.capacity
            .saturating_sub(self.semaphore.available_permits())
    }

    /// Tear the pool down, releasing all waiters with `PoolClosed`.
    ///
    /// Slots already held stay valid until dropped.
    pub fn shutdown(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}
