//! Memory pressure monitoring
//!
//! [`MemorySignal`] is a process-wide low-memory event source: the host
//! application forwards its platform notification into it. A
//! [`MemoryPressureMonitor`] listens on the signal and drops the memory
//! cache on [`MemoryPressure::High`] or [`MemoryPressure::Critical`]. The
//! persistent cache is never touched, so the next request after a pressure
//! event is served from disk where possible.
//!
//! Platforms without such a notification can use
//! [`MemoryPressureMonitor::spawn_polling`], which samples a pressure
//! reading at a fixed interval instead.

use std::time::Duration;

use imgview_cache::{MemoryImageCache, MemoryPressure};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Number of undelivered events kept per subscriber
const SIGNAL_CAPACITY: usize = 16;

/// Shortest polling interval accepted by [`MemoryPressureMonitor::spawn_polling`]
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Low-memory event source
///
/// Cloning is cheap; clones deliver to the same subscribers.
#[derive(Debug, Clone)]
pub struct MemorySignal {
    sender: broadcast::Sender<MemoryPressure>,
}

impl MemorySignal {
    /// Create a signal with no subscribers
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { sender }
    }

    /// Report a pressure level to every subscriber
    ///
    /// Returns the number of subscribers that will see the event.
    pub fn notify(&self, level: MemoryPressure) -> usize {
        self.sender.send(level).unwrap_or(0)
    }

    /// Receive future events
    pub fn subscribe(&self) -> broadcast::Receiver<MemoryPressure> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemorySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task that clears a memory cache under pressure
///
/// The task stops when the monitor is dropped.
#[derive(Debug)]
pub struct MemoryPressureMonitor {
    task: JoinHandle<()>,
}

impl MemoryPressureMonitor {
    /// Listen on `signal` and clear `cache` on high or critical pressure
    ///
    /// If events were dropped because the monitor fell behind, the cache is
    /// cleared as well. The task ends once every sender of the signal is gone.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(cache: MemoryImageCache, signal: &MemorySignal) -> Self {
        let mut events = signal.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(level) if level.needs_eviction() => {
                        tracing::debug!(?level, entries = cache.len(), "memory pressure, clearing cache");
                        cache.clear();
                    }
                    Ok(level) => {
                        tracing::trace!(?level, "memory pressure event ignored");
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "missed memory pressure events, clearing cache");
                        cache.clear();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Self { task }
    }

    /// Call `sample` every `interval` and clear `cache` on high or critical pressure
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn_polling<F>(cache: MemoryImageCache, interval: Duration, mut sample: F) -> Self
    where
        F: FnMut() -> MemoryPressure + Send + 'static,
    {
        let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
        let task = tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let level = sample();
                if level.needs_eviction() && !cache.is_empty() {
                    tracing::debug!(?level, entries = cache.len(), "polled memory pressure, clearing cache");
                    cache.clear();
                }
            }
        });
        Self { task }
    }

    /// Returns true while the background task is alive
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop monitoring
    ///
    /// Aborts the background task; events sent afterwards are not seen.
    /// Dropping the monitor has the same effect.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for MemoryPressureMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
