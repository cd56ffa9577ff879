//! Reentrant exclusive lock over an isolate's execution right.
//!
//! At most one thread executes interpreted code against an isolate at any
//! instant. Acquisition is scoped: [`LockGuard`] releases one level of the
//! reentrant hold on every exit path, and [`Unlocker`] temporarily gives up
//! the *entire* hold so another waiter can take a turn, reacquiring it at
//! the prior depth before control returns to the owner.
//!
//! There is no fairness or FIFO ordering among waiters and no timeout;
//! callers that need turn-taking serialize with their own shared state.

use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_utils::Backoff;
use log::trace;
use parking_lot::{Condvar, Mutex};

use super::thread_id::ThreadId;
use super::ThreadingStats;

struct LockState {
    owner: ThreadId,
    depth: usize,
}

/// The exclusive lock guarding one isolate's execution right.
///
/// Reentrant: the owning thread may acquire again without blocking, and the
/// lock is released only when every acquisition has been dropped. Hold
/// times are expected to be short; contended acquisition spins briefly
/// before parking on a condition variable.
pub struct IsolateLock {
    state: Mutex<LockState>,
    unlocked: Condvar,
    stats: Arc<ThreadingStats>,
}

impl IsolateLock {
    pub fn new() -> Self {
        Self::with_stats(Arc::new(ThreadingStats::default()))
    }

    pub(crate) fn with_stats(stats: Arc<ThreadingStats>) -> Self {
        Self {
            state: Mutex::new(LockState {
                owner: ThreadId::invalid(),
                depth: 0,
            }),
            unlocked: Condvar::new(),
            stats,
        }
    }

    /// Blocks until the lock is unlocked or already owned by the calling
    /// thread, then acquires one level. Blocking is unbounded by design.
    pub fn lock(&self) -> LockGuard<'_> {
        let me = ThreadId::current();
        let backoff = Backoff::new();
        loop {
            {
                let mut state = self.state.lock();
                if state.owner == me {
                    state.depth += 1;
                    self.stats.reentrant_acquires.fetch_add(1, Ordering::Relaxed);
                    return LockGuard::new(self);
                }
                if !state.owner.is_valid() {
                    state.owner = me;
                    state.depth = 1;
                    return LockGuard::new(self);
                }
                if backoff.is_completed() {
                    self.stats.contended_acquires.fetch_add(1, Ordering::Relaxed);
                    trace!("{} parking on contended isolate lock", me);
                    while state.owner.is_valid() {
                        self.unlocked.wait(&mut state);
                    }
                    state.owner = me;
                    state.depth = 1;
                    return LockGuard::new(self);
                }
            }
            // Lock dropped here so the owner can make progress while we spin.
            backoff.snooze();
        }
    }

    /// Whether any thread currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_valid()
    }

    /// Whether the calling thread holds the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == ThreadId::current()
    }

    /// The calling thread's reentrant hold depth, 0 when not the owner.
    pub fn held_depth(&self) -> usize {
        let state = self.state.lock();
        if state.owner == ThreadId::current() {
            state.depth
        } else {
            0
        }
    }

    pub(crate) fn owner(&self) -> ThreadId {
        self.state.lock().owner
    }

    fn release_one(&self) {
        let mut state = self.state.lock();
        assert!(
            state.owner == ThreadId::current(),
            "isolate lock released by a thread that does not hold it"
        );
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = ThreadId::invalid();
            drop(state);
            self.unlocked.notify_all();
        }
    }

    /// Drops the entire reentrant hold, returning the depth to restore.
    fn release_all(&self) -> usize {
        let mut state = self.state.lock();
        assert!(
            state.owner == ThreadId::current(),
            "isolate lock released by a thread that does not hold it"
        );
        let depth = state.depth;
        state.depth = 0;
        state.owner = ThreadId::invalid();
        drop(state);
        self.unlocked.notify_all();
        depth
    }

    fn reacquire(&self, depth: usize) {
        let me = ThreadId::current();
        let mut state = self.state.lock();
        while state.owner.is_valid() {
            debug_assert!(
                state.owner != me,
                "reacquire while already holding the isolate lock"
            );
            self.unlocked.wait(&mut state);
        }
        state.owner = me;
        state.depth = depth;
    }
}

impl Default for IsolateLock {
    fn default() -> Self {
        Self::new()
    }
}

/// One level of scoped ownership of an [`IsolateLock`].
///
/// Dropping the guard releases its level on every exit path. Guards must be
/// dropped in reverse acquisition order (stack discipline); releasing out
/// of order is a fatal programming error, not a recoverable condition.
pub struct LockGuard<'a> {
    lock: &'a IsolateLock,
    // Guards are tied to the acquiring thread.
    _not_send: PhantomData<*mut ()>,
}

impl<'a> LockGuard<'a> {
    fn new(lock: &'a IsolateLock) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }

    /// Temporarily gives up the entire reentrant hold so other waiters can
    /// acquire the lock. The hold is restored, at the same depth, when the
    /// returned [`Unlocker`] is dropped.
    ///
    /// The token borrows this guard mutably: it cannot outlive the
    /// enclosing acquisition, and no second release can overlap it.
    pub fn unlock(&mut self) -> Unlocker<'_> {
        let depth = self.lock.release_all();
        self.lock.stats.temporary_releases.fetch_add(1, Ordering::Relaxed);
        Unlocker {
            lock: self.lock,
            depth,
            _not_send: PhantomData,
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_one();
    }
}

/// A temporarily released hold on an [`IsolateLock`].
///
/// While the token is live the lock is unlocked and a different thread may
/// own it. Dropping the token blocks until the original thread has
/// reacquired the lock at its prior depth; only then does control return.
pub struct Unlocker<'g> {
    lock: &'g IsolateLock,
    depth: usize,
    _not_send: PhantomData<*mut ()>,
}

impl Drop for Unlocker<'_> {
    fn drop(&mut self) {
        self.lock.reacquire(self.depth);
    }
}
