//! Error types of the execution engine.
//!
//! Inside the interpreter every fault travels as an [`Exception`]: either an
//! engine-raised [`VmError`] that has not been allocated yet, or a throwable
//! already on the heap. Callers outside the interpreter see an
//! [`UncaughtException`] once unwinding runs out of frames.

use crate::config::ConfigError;
use core_types::{ObjectId, StackFrame, VmError};
use memory_manager::HeapError;
use std::fmt;
use thiserror::Error;

/// A throwable in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    /// Raised by the engine; materialized when dispatch begins
    Pending(VmError),
    /// A heap throwable
    Thrown(ObjectId),
}

impl From<VmError> for Exception {
    fn from(error: VmError) -> Self {
        Exception::Pending(error)
    }
}

/// Result of anything that may throw.
pub type ExecResult<T> = Result<T, Exception>;

/// Failure to bring up the engine.
#[derive(Debug, Error)]
pub enum StartupError {
    /// A bootstrap class is missing or malformed
    #[error("cannot load bootstrap class {class}: {source}")]
    Bootstrap {
        /// Internal name of the class
        class: String,
        /// What went wrong
        #[source]
        source: VmError,
    },

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The heap cannot hold the startup objects
    #[error(transparent)]
    Heap(#[from] HeapError),
}

/// A throwable that reached the bottom of a thread's call stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct UncaughtException {
    /// The heap throwable
    pub throwable: ObjectId,
    /// Internal name of its class
    pub class_name: String,
    /// Detail message
    pub message: Option<String>,
    /// Backtrace recorded when the throwable was raised, innermost first
    pub stack_trace: Vec<StackFrame>,
}

impl fmt::Display for UncaughtException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class_name.replace('/', "."))?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        for frame in &self.stack_trace {
            write!(f, "\n\tat {}", frame)?;
        }
        Ok(())
    }
}
