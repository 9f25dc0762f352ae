//! Counting gate for decode work
//!
//! Wraps a fair semaphore: waiters are granted permits strictly in the order
//! they started waiting. A permit is returned when it is released or
//! dropped, so early returns and failed decodes cannot leak capacity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Errors returned by [`ConcurrencyLimiter::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LimiterError {
    /// The limiter was closed; no further permits will be granted
    #[error("concurrency limiter is closed")]
    Closed,
}

/// Limiter statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    /// Total permits granted
    pub acquired: u64,

    /// Permits that were granted only after waiting for capacity
    pub contended: u64,

    /// Permits currently held
    pub in_use: usize,
}

impl LimiterStats {
    /// Fraction of acquisitions that had to wait (0.0 to 1.0)
    pub fn contention_rate(&self) -> f64 {
        if self.acquired == 0 {
            0.0
        } else {
            self.contended as f64 / self.acquired as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    contended: AtomicU64,
}

/// Bounds the number of decodes running at the same time
///
/// Cloning is cheap; clones share capacity.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    counters: Arc<Counters>,
}

/// Proof of a held decode slot
///
/// The slot is returned to the limiter when the permit is released or
/// dropped. Permits are not reentrant: holding one does not let the same
/// task acquire another without waiting.
#[derive(Debug)]
pub struct DecodePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    /// Create a limiter that allows `capacity` concurrent holders
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Wait for a free slot
    ///
    /// Suspends the caller while the limiter is at capacity. Waiters are
    /// served first come, first served.
    ///
    /// # Errors
    /// Returns [`LimiterError::Closed`] once [`close`](Self::close) was called.
    pub async fn acquire(&self) -> Result<DecodePermit, LimiterError> {
        let permit = match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(LimiterError::Closed),
            Err(TryAcquireError::NoPermits) => {
                tracing::trace!(capacity = self.capacity, "waiting for decode slot");
                self.counters.contended.fetch_add(1, Ordering::Relaxed);
                Arc::clone(&self.semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| LimiterError::Closed)?
            }
        };

        self.counters.acquired.fetch_add(1, Ordering::Relaxed);
        Ok(DecodePermit { _permit: permit })
    }

    /// Take a free slot without waiting, if one is available
    pub fn try_acquire(&self) -> Option<DecodePermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        self.counters.acquired.fetch_add(1, Ordering::Relaxed);
        Some(DecodePermit { _permit: permit })
    }

    /// Return a slot to the limiter
    ///
    /// Equivalent to dropping the permit.
    pub fn release(&self, permit: DecodePermit) {
        drop(permit);
    }

    /// Stop granting permits; pending and future `acquire` calls fail
    ///
    /// Permits already held stay valid until released.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Returns true if [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Maximum number of concurrent holders
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held
    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Get current limiter statistics
    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            acquired: self.counters.acquired.load(Ordering::Relaxed),
            contended: self.counters.contended.load(Ordering::Relaxed),
            in_use: self.in_use(),
        }
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_CONCURRENT_DECODES)
    }
}
