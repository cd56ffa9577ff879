//! Cooperative engine thread wrapper.
//!
//! The unit of schedulable work against an isolate. Construction and start
//! are separate so a running thread can hand a not-yet-started thread to
//! another owner, or start the next thread in a chain after recording its
//! own identity.

use std::thread::{self, JoinHandle};

use super::thread_id::{self, ThreadId};
use crate::error::{Error, Result};

/// A named native thread participating in engine execution.
pub struct EngineThread {
    name: String,
    body: Option<Box<dyn FnOnce() + Send + 'static>>,
    handle: Option<JoinHandle<()>>,
}

impl EngineThread {
    pub fn new(name: impl Into<String>, body: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.into(),
            body: Some(Box::new(body)),
            handle: None,
        }
    }

    /// Begins executing the thread body on a new native thread.
    ///
    /// The thread registers its identity under this thread's name before the
    /// body runs. Starting a thread twice is a fatal programming error.
    pub fn start(&mut self) -> Result<()> {
        let body = self.body.take().expect("engine thread started twice");
        let name = self.name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            thread_id::register_thread_name(ThreadId::current(), &name);
            body();
        })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Blocks until the thread body returns. A no-op when the thread was
    /// never started or has already been joined.
    pub fn join(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        handle.join().map_err(|_| Error::Thread {
            message: format!("engine thread '{}' panicked", self.name),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Voluntarily cedes the calling thread's scheduling slot.
///
/// A hint only: never blocks and never touches lock state. Used inside
/// spin-with-yield polling loops so contention resolves promptly; the
/// absence of a blocking wait there is a deliberate low-latency choice,
/// acceptable because isolate hold times are short.
pub fn yield_cpu() {
    thread::yield_now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_start_and_join_runs_body() {
        let ran = Arc::new(AtomicBool::new(false));
        let mut thread = {
            let ran = Arc::clone(&ran);
            EngineThread::new("body-test", move || {
                ran.store(true, Ordering::Release);
            })
        };
        thread.start().unwrap();
        thread.join().unwrap();
        assert!(ran.load(Ordering::Acquire));
    }

    #[test]
    fn test_join_before_start_is_noop() {
        let mut thread = EngineThread::new("idle", || {});
        thread.join().unwrap();
        thread.start().unwrap();
        thread.join().unwrap();
        thread.join().unwrap();
    }

    #[test]
    fn test_started_thread_registers_name() {
        let id = Arc::new(parking_lot::Mutex::new(ThreadId::invalid()));
        let mut thread = {
            let id = Arc::clone(&id);
            EngineThread::new("named-worker", move || {
                *id.lock() = ThreadId::current();
            })
        };
        thread.start().unwrap();
        thread.join().unwrap();
        let id = *id.lock();
        assert!(id.is_valid());
        assert_eq!(thread_id::thread_name(id).as_deref(), Some("named-worker"));
    }

    #[test]
    fn test_panicking_body_surfaces_as_error() {
        let mut thread = EngineThread::new("doomed", || panic!("boom"));
        thread.start().unwrap();
        assert!(thread.join().is_err());
    }

    #[test]
    #[should_panic(expected = "started twice")]
    fn test_double_start_is_fatal() {
        let mut thread = EngineThread::new("twice", || {});
        thread.start().unwrap();
        thread.join().unwrap();
        let _ = thread.start();
    }
}
