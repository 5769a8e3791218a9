//! Admission gate bounding concurrent fetch workers
//!
//! Wraps a [`Semaphore`] with owned permits. A [`GatePermit`] is held by a
//! worker for its whole lifetime and returns its slot when dropped, so release
//! happens on every exit path including panics.

use crate::metrics::GateMetrics;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Gate errors
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Capacity must be at least one
    #[error("admission gate capacity must be at least 1")]
    ZeroCapacity,

    /// Semaphore was closed while waiting
    #[error("admission gate closed: {0}")]
    Closed(String),
}

/// Counting limiter with a fixed capacity
#[derive(Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    /// Create a gate admitting at most `capacity` holders at once
    pub fn new(capacity: usize) -> Result<Self, GateError> {
        if capacity == 0 {
            return Err(GateError::ZeroCapacity);
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot. Suspends only the calling task.
    pub async fn acquire(&self) -> Result<GatePermit, GateError> {
        let mut metrics = GateMetrics::new();
        metrics.start_acquire();

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| GateError::Closed(e.to_string()))?;

        metrics.record_acquired();
        metrics.update_available(self.available());
        Ok(GatePermit { _permit: permit })
    }

    /// Reclaim every slot. Completes only once no permit is held anywhere.
    pub async fn drain(&self) -> Result<DrainedGate, GateError> {
        let permits = self
            .semaphore
            .clone()
            .acquire_many_owned(self.capacity as u32)
            .await
            .map_err(|e| GateError::Closed(e.to_string()))?;
        Ok(DrainedGate { _permits: permits })
    }
}

/// One admission slot. Dropping it releases the slot without blocking.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Release the slot now
    pub fn release(self) {}
}

/// All slots of a gate, held by the drain barrier
#[derive(Debug)]
pub struct DrainedGate {
    _permits: OwnedSemaphorePermit,
}
