//! Timer-driven forced preemption of the running isolate thread.
//!
//! A background clock thread ticks at a fixed interval. On each tick, if
//! some thread holds the isolate lock, the isolate's preemption flag is
//! raised; the interpreter observes the flag at the next safe interruption
//! point (an instruction boundary) and performs a full temporary release of
//! the lock, yielding its turn to any waiter. A tick while the lock is free
//! is a no-op.
//!
//! This is a correctness mechanism, not a performance feature: it exists to
//! prove that interruption at an arbitrary, clock-chosen instruction
//! boundary cannot corrupt interpreter-internal caches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, trace};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::thread_id;
use crate::isolate::Isolate;

/// At most one clock is armed per process at a time.
static ARMED_CLOCK: Lazy<Mutex<Option<PreemptionClock>>> = Lazy::new(|| Mutex::new(None));

struct PreemptionClock {
    shutdown: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Arms the preemption clock against `isolate` at the given interval.
///
/// Fatal if a clock is already armed (arming twice without an intervening
/// [`stop_preemption`] is a programming error) or if the clock thread
/// cannot be spawned.
pub fn start_preemption(isolate: &Arc<Isolate>, interval: Duration) {
    let mut armed = ARMED_CLOCK.lock();
    assert!(
        armed.is_none(),
        "preemption clock armed twice without an intervening stop_preemption"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let thread = {
        let shutdown = Arc::clone(&shutdown);
        let isolate = Arc::clone(isolate);
        thread::Builder::new()
            .name("sigil-preemption".into())
            .spawn(move || tick_loop(isolate, shutdown, interval))
            .expect("failed to spawn preemption clock thread")
    };

    debug!("preemption clock armed at {:?}", interval);
    *armed = Some(PreemptionClock { shutdown, thread });
}

/// Disarms the preemption clock and joins its thread. Idempotent: a no-op
/// when no clock is armed.
///
/// A tick signaled before the clock observed the shutdown may still force
/// one more yield after this returns; callers that need preemption to have
/// fully ceased allow one extra interval of latency.
pub fn stop_preemption() {
    let clock = ARMED_CLOCK.lock().take();
    let Some(clock) = clock else {
        return;
    };
    clock.shutdown.store(true, Ordering::Release);
    let _ = clock.thread.join();
    debug!("preemption clock disarmed");
}

/// Whether a preemption clock is currently armed.
pub fn is_preemption_armed() -> bool {
    ARMED_CLOCK.lock().is_some()
}

fn tick_loop(isolate: Arc<Isolate>, shutdown: Arc<AtomicBool>, interval: Duration) {
    loop {
        thread::sleep(interval);
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        let holder = isolate.holder();
        if !holder.is_valid() {
            continue;
        }
        isolate.request_preemption();
        isolate
            .stats()
            .preemption_ticks
            .fetch_add(1, Ordering::Relaxed);
        trace!(
            "preemption tick: forcing yield of {}",
            thread_id::thread_name(holder).unwrap_or_else(|| holder.to_string())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::{Mutex as StdMutex, OnceLock};

    // The armed-clock registry is process-wide; tests touching it must not
    // overlap.
    fn run_serialized<F: FnOnce()>(f: F) {
        static LOCK: OnceLock<StdMutex<()>> = OnceLock::new();
        let mutex = LOCK.get_or_init(|| StdMutex::new(()));
        let _guard = match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f();
    }

    #[test]
    fn test_arm_disarm_lifecycle() {
        run_serialized(|| {
            let isolate = Isolate::new();
            assert!(!is_preemption_armed());
            start_preemption(&isolate, Duration::from_millis(5));
            assert!(is_preemption_armed());
            stop_preemption();
            assert!(!is_preemption_armed());
            // Disarmed stop is a no-op.
            stop_preemption();
        });
    }

    #[test]
    fn test_tick_raises_flag_while_locked() {
        run_serialized(|| {
            let isolate = Isolate::new();
            let scope = isolate.enter();
            start_preemption(&isolate, Duration::from_millis(2));
            thread::sleep(Duration::from_millis(40));
            stop_preemption();
            assert!(
                isolate.stats().preemption_ticks.load(Ordering::Relaxed) > 0,
                "clock never ticked while the lock was held"
            );
            assert!(isolate.take_preemption_request());
            drop(scope);
        });
    }

    #[test]
    fn test_tick_is_noop_while_unlocked() {
        run_serialized(|| {
            let isolate = Isolate::new();
            start_preemption(&isolate, Duration::from_millis(2));
            thread::sleep(Duration::from_millis(30));
            stop_preemption();
            assert_eq!(isolate.stats().preemption_ticks.load(Ordering::Relaxed), 0);
            assert!(!isolate.take_preemption_request());
        });
    }

    #[test]
    fn test_double_arm_is_fatal() {
        run_serialized(|| {
            let isolate = Isolate::new();
            start_preemption(&isolate, Duration::from_millis(50));
            let second = catch_unwind(AssertUnwindSafe(|| {
                start_preemption(&isolate, Duration::from_millis(50));
            }));
            assert!(second.is_err(), "double arming must be rejected");
            stop_preemption();
        });
    }
}
