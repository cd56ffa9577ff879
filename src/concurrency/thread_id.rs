//! Process-wide thread identities.
//!
//! Every native thread that enters the engine gets a unique, comparable
//! identity on its first query, distinct from all other threads' identities
//! for the lifetime of the process. Identity allocation is a single atomic
//! increment and is never blocked by isolate locking: a thread must be able
//! to identify itself before it can even attempt to acquire an isolate.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;

/// Next identity to hand out. 0 is reserved for the invalid sentinel.
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// Names registered for engine threads, keyed by identity.
static THREAD_NAMES: Lazy<DashMap<ThreadId, String>> = Lazy::new(DashMap::new);

thread_local! {
    static CURRENT_THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// A process-unique identity for a native thread.
///
/// Distinct from OS-level thread handles: identities are engine-assigned,
/// totally ordered, hashable, and usable as cache or lookup keys. The
/// default value obtained from [`ThreadId::invalid`] compares equal only to
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(u64);

impl ThreadId {
    /// The distinguished "not yet assigned" sentinel.
    pub const fn invalid() -> Self {
        ThreadId(0)
    }

    /// Returns the calling thread's identity, allocating one on first call.
    ///
    /// Idempotent per thread; unique across threads regardless of creation
    /// order or timing. Counter exhaustion cannot occur within a process
    /// lifetime (the counter is 64 bits wide).
    pub fn current() -> Self {
        CURRENT_THREAD_ID.with(|cell| {
            let mut raw = cell.get();
            if raw == 0 {
                raw = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
                cell.set(raw);
            }
            ThreadId(raw)
        })
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "thread-{}", self.0)
        } else {
            f.write_str("thread-invalid")
        }
    }
}

/// Associates a human-readable name with a thread identity.
///
/// [`EngineThread::start`](super::EngineThread::start) registers the wrapped
/// thread's name automatically; embedders may also name external threads.
pub fn register_thread_name(id: ThreadId, name: &str) {
    THREAD_NAMES.insert(id, name.to_string());
}

/// Looks up the registered name for a thread identity, if any.
pub fn thread_name(id: ThreadId) -> Option<String> {
    THREAD_NAMES.get(&id).map(|entry| entry.value().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_current_is_idempotent() {
        let first = ThreadId::current();
        let second = ThreadId::current();
        assert!(first.is_valid());
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_sentinel_is_isolated() {
        assert!(!ThreadId::invalid().is_valid());
        assert_eq!(ThreadId::invalid(), ThreadId::invalid());
        assert_ne!(ThreadId::invalid(), ThreadId::current());
    }

    #[test]
    fn test_identities_distinct_across_threads() {
        let ids: Vec<ThreadId> = (0..8)
            .map(|_| thread::spawn(ThreadId::current))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        for (i, a) in ids.iter().enumerate() {
            assert!(a.is_valid());
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
            assert_ne!(*a, ThreadId::current());
        }
    }

    #[test]
    fn test_name_registration() {
        let id = ThreadId::current();
        register_thread_name(id, "registry-test");
        assert_eq!(thread_name(id).as_deref(), Some("registry-test"));
        assert_eq!(thread_name(ThreadId::invalid()), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ThreadId::invalid().to_string(), "thread-invalid");
        assert!(ThreadId::current().to_string().starts_with("thread-"));
    }
}
