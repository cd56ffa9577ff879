//! Isolates: independent execution contexts and the scoped entry protocol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::concurrency::isolate_lock::{IsolateLock, LockGuard, Unlocker};
use crate::concurrency::thread_id::ThreadId;
use crate::concurrency::ThreadingStats;
use crate::vm::Value;

/// Sizing knobs for a fresh isolate.
#[derive(Debug, Clone)]
pub struct IsolateConfig {
    /// Initial capacity of the string-search result cache.
    pub search_cache_capacity: usize,
    /// Initial capacity of the object arena.
    pub heap_capacity: usize,
}

impl Default for IsolateConfig {
    fn default() -> Self {
        Self {
            search_cache_capacity: 256,
            heap_capacity: 1024,
        }
    }
}

/// Interpreter-visible state of one isolate.
///
/// Guarded by its own mutex with short critical sections that are never
/// held across a yield or release point; the isolate lock, not this mutex,
/// is what serializes script execution.
pub(crate) struct IsolateState {
    pub(crate) globals: HashMap<String, Value>,
    /// Object arena; a slot per allocation, indexed by object handle.
    pub(crate) heap: Vec<HashMap<String, Value>>,
    /// Memoized first-occurrence offsets, keyed by (haystack, needle).
    pub(crate) search_cache: HashMap<(String, String), i64>,
    pub(crate) search_hits: usize,
    pub(crate) search_misses: usize,
}

/// An independent execution context of the engine; the unit of mutual
/// exclusion.
///
/// All script execution happens through [`Isolate::enter`], which acquires
/// the isolate's exclusive lock for the calling thread. Scopes borrow the
/// isolate, so an isolate cannot be torn down while any thread still holds
/// it — the "must be unlocked at destruction" rule is enforced by the
/// borrow checker rather than at runtime.
pub struct Isolate {
    lock: IsolateLock,
    state: Mutex<IsolateState>,
    preemption_requested: AtomicBool,
    stats: Arc<ThreadingStats>,
    config: IsolateConfig,
}

impl Isolate {
    pub fn new() -> Arc<Self> {
        Self::with_config(IsolateConfig::default())
    }

    pub fn with_config(config: IsolateConfig) -> Arc<Self> {
        let stats = Arc::new(ThreadingStats::default());
        Arc::new(Self {
            lock: IsolateLock::with_stats(Arc::clone(&stats)),
            state: Mutex::new(IsolateState {
                globals: HashMap::new(),
                heap: Vec::with_capacity(config.heap_capacity),
                search_cache: HashMap::with_capacity(config.search_cache_capacity),
                search_hits: 0,
                search_misses: 0,
            }),
            preemption_requested: AtomicBool::new(false),
            stats,
            config,
        })
    }

    /// Acquires the exclusive execution right for the calling thread,
    /// blocking until it is available. Reentrant.
    pub fn enter(&self) -> IsolateScope<'_> {
        IsolateScope {
            isolate: self,
            guard: self.lock.lock(),
        }
    }

    /// Whether any thread currently holds the execution right.
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Whether the calling thread holds the execution right.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.lock.is_held_by_current_thread()
    }

    pub fn stats(&self) -> &Arc<ThreadingStats> {
        &self.stats
    }

    pub fn config(&self) -> &IsolateConfig {
        &self.config
    }

    pub(crate) fn holder(&self) -> ThreadId {
        self.lock.owner()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, IsolateState> {
        self.state.lock()
    }

    /// Raised by the preemption clock; observed at safe interruption
    /// points.
    pub(crate) fn request_preemption(&self) {
        self.preemption_requested.store(true, Ordering::Release);
    }

    pub(crate) fn take_preemption_request(&self) -> bool {
        self.preemption_requested.swap(false, Ordering::AcqRel)
    }
}

/// A scoped hold of an isolate's execution right.
///
/// Created by [`Isolate::enter`]; releases its level of the hold on every
/// exit path. All interpreter entry points hang off the scope, so touching
/// isolate state without the lock is unrepresentable.
pub struct IsolateScope<'iso> {
    pub(crate) isolate: &'iso Isolate,
    pub(crate) guard: LockGuard<'iso>,
}

impl<'iso> IsolateScope<'iso> {
    pub fn isolate(&self) -> &Isolate {
        self.isolate
    }

    /// Temporarily gives up the entire hold so another thread can take a
    /// turn; see [`LockGuard::unlock`]. While the returned token lives this
    /// scope is mutably borrowed and cannot run scripts.
    pub fn unlocker(&mut self) -> Unlocker<'_> {
        self.guard.unlock()
    }

    /// The calling thread's reentrant hold depth on this isolate.
    pub fn lock_depth(&self) -> usize {
        self.isolate.lock.held_depth()
    }

    /// Forces a full cache-clearing collection.
    ///
    /// Collection itself is outside this crate's scope; the engine-visible
    /// effect modeled here is that per-isolate result caches are dropped,
    /// exactly what a major collection does to them.
    pub fn collect_garbage(&mut self) {
        let mut state = self.isolate.state();
        state.search_cache.clear();
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.isolate.state().globals.get(name).cloned()
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.isolate.state().globals.insert(name.to_string(), value);
    }

    /// Number of objects allocated in this isolate so far.
    pub fn objects_allocated(&self) -> usize {
        self.isolate.state().heap.len()
    }

    /// Number of memoized search results currently cached.
    pub fn cached_searches(&self) -> usize {
        self.isolate.state().search_cache.len()
    }

    /// Cumulative (hits, misses) of the search result cache.
    pub fn search_cache_stats(&self) -> (usize, usize) {
        let state = self.isolate.state();
        (state.search_hits, state.search_misses)
    }
}
