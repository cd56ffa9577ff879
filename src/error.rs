use thiserror::Error;

use crate::vm::VmError;

pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the Sigil engine core
///
/// Covers everything the embedding API can surface. Misuse of the threading
/// primitives (releasing a lock that is not held, arming the preemption
/// clock twice, starting a thread twice) is a programming error and aborts
/// instead of producing a value of this type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Thread error: {message}")]
    Thread { message: String },

    #[error(transparent)]
    Vm(#[from] VmError),
}
