//! Counting semaphore collaborator.
//!
//! Used by callers as a completion barrier: signaled exactly N times it
//! releases exactly N waiters, no more, no fewer. Not consumed by the core
//! primitives themselves.

use parking_lot::{Condvar, Mutex};

pub struct Semaphore {
    count: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    /// Increments the count, waking one waiter if any.
    pub fn signal(&self) {
        let mut count = self.count.lock();
        *count += 1;
        drop(count);
        self.available.notify_one();
    }

    /// Blocks until the count is positive, then decrements it.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
    }

    /// Decrements the count without blocking. Returns false when the count
    /// was zero.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock();
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }
}
