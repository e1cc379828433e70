use super::{Event, Outcome, SchedulerStats, UpdateScheduler};
use crate::engine::InferenceEngine;
use crate::pixels::RenderSink;
use anyhow::{Result, anyhow};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError};

/// A scheduler that can be driven from several threads.
///
/// The lock covers every region write and every engine call, so at most one
/// call is ever outstanding. Ticks use `try_lock` and are dropped when the
/// lock is held; every other event waits its turn. An in-flight call is never
/// cancelled.
pub struct SharedScheduler<E: InferenceEngine, S> {
    inner: Arc<Mutex<UpdateScheduler<E, S>>>,
    dropped: Arc<AtomicU64>,
}

impl<E: InferenceEngine, S> Clone for SharedScheduler<E, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            dropped: self.dropped.clone(),
        }
    }
}

impl<E: InferenceEngine, S> fmt::Debug for SharedScheduler<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedScheduler")
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish()
    }
}

impl<E: InferenceEngine, S: RenderSink> SharedScheduler<E, S> {
    pub fn new(scheduler: UpdateScheduler<E, S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(scheduler)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Tick unless an engine call is already in flight.
    pub fn tick(&self) -> Result<Outcome> {
        match self.inner.try_lock() {
            Ok(mut scheduler) => scheduler.tick(),
            Err(TryLockError::WouldBlock) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Tick dropped: engine call still in flight");
                Ok(Outcome::Dropped)
            }
            Err(TryLockError::Poisoned(_)) => Err(poisoned()),
        }
    }

    /// Handle one event. Ticks may be dropped; everything else blocks.
    pub fn dispatch(&self, event: Event) -> Result<Outcome> {
        if event == Event::Tick {
            return self.tick();
        }
        self.with(|scheduler| scheduler.dispatch(event))?
    }

    /// Run `f` with exclusive access to the scheduler.
    pub fn with<R>(&self, f: impl FnOnce(&mut UpdateScheduler<E, S>) -> R) -> Result<R> {
        let mut scheduler = self.inner.lock().map_err(|_| poisoned())?;
        Ok(f(&mut scheduler))
    }

    pub fn dropped_ticks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Scheduler counters, including ticks dropped at the lock.
    pub fn stats(&self) -> Result<SchedulerStats> {
        let mut stats = self.with(|scheduler| scheduler.stats())?;
        stats.dropped_ticks += self.dropped_ticks();
        Ok(stats)
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("Scheduler lock poisoned by a panicked engine call")
}
