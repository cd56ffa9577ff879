pub mod concurrency;
pub mod error;
pub mod isolate;
pub mod vm;

pub use concurrency::{
    is_preemption_armed, register_thread_name, start_preemption, stop_preemption, thread_name,
    yield_cpu, EngineThread, IsolateLock, LockGuard, Semaphore, ThreadId, ThreadingStats, Unlocker,
};
pub use error::{Error, Result};
pub use isolate::{Isolate, IsolateConfig, IsolateScope};
pub use vm::{Instruction, OpCode, Script, ScriptBuilder, Value, VmError, VmResult};
