//! # Isolate Threading
//!
//! Concurrency control for isolate execution: exactly one native thread
//! runs interpreted code against an isolate at any instant, while multiple
//! threads take turns owning that right — cooperatively through scoped
//! release, or preemptively under a timer-driven clock. Also home to the
//! process-wide thread identity registry and the thin collaborator
//! primitives (engine thread wrapper, counting semaphore) the turn-taking
//! patterns are built from.
//!
//! This is a mutual-exclusion layer with fairness-by-yielding, not a
//! scheduler: there is no waiter ordering, no cancellation, and no attempt
//! to run two isolates' code truly in parallel.

use std::sync::atomic::{AtomicUsize, Ordering};

pub mod isolate_lock;
pub mod preemption;
pub mod semaphore;
pub mod thread;
pub mod thread_id;

pub use isolate_lock::{IsolateLock, LockGuard, Unlocker};
pub use preemption::{is_preemption_armed, start_preemption, stop_preemption};
pub use semaphore::Semaphore;
pub use thread::{yield_cpu, EngineThread};
pub use thread_id::{register_thread_name, thread_name, ThreadId};

/// Counters for monitoring the threading layer.
#[derive(Debug, Default)]
pub struct ThreadingStats {
    /// Acquisitions that had to park behind another owner.
    pub contended_acquires: AtomicUsize,
    /// Acquisitions satisfied because the caller already held the lock.
    pub reentrant_acquires: AtomicUsize,
    /// Temporary full releases performed through an unlocker.
    pub temporary_releases: AtomicUsize,
    /// Clock ticks delivered while some thread held the lock.
    pub preemption_ticks: AtomicUsize,
    /// Forced yields actually observed at safe interruption points.
    pub forced_yields: AtomicUsize,
}

impl Clone for ThreadingStats {
    fn clone(&self) -> Self {
        Self {
            contended_acquires: AtomicUsize::new(self.contended_acquires.load(Ordering::Relaxed)),
            reentrant_acquires: AtomicUsize::new(self.reentrant_acquires.load(Ordering::Relaxed)),
            temporary_releases: AtomicUsize::new(self.temporary_releases.load(Ordering::Relaxed)),
            preemption_ticks: AtomicUsize::new(self.preemption_ticks.load(Ordering::Relaxed)),
            forced_yields: AtomicUsize::new(self.forced_yields.load(Ordering::Relaxed)),
        }
    }
}

impl ThreadingStats {
    /// Share of delivered ticks that were observed as forced yields, as a
    /// percentage. A tick raised just before the clock stops may never be
    /// observed, so this can sit below 100 even in a quiet system.
    pub fn forced_yield_rate(&self) -> f64 {
        let ticks = self.preemption_ticks.load(Ordering::Relaxed) as f64;
        let yields = self.forced_yields.load(Ordering::Relaxed) as f64;

        if ticks > 0.0 {
            (yields / ticks) * 100.0
        } else {
            0.0
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.contended_acquires.store(0, Ordering::Relaxed);
        self.reentrant_acquires.store(0, Ordering::Relaxed);
        self.temporary_releases.store(0, Ordering::Relaxed);
        self.preemption_ticks.store(0, Ordering::Relaxed);
        self.forced_yields.store(0, Ordering::Relaxed);
    }
}
