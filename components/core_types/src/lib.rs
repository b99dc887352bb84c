//! Core value, identity and error types shared by the execution engine.
//!
//! This crate provides the foundational types every other component speaks:
//! the typed operand-stack slot, the handles used to name heap objects,
//! classes, loaders and threads, and the errors the engine raises.
//!
//! # Overview
//!
//! - [`Value`] - One operand-stack or local-variable slot
//! - [`ObjectId`], [`ClassId`], [`LoaderId`], [`ThreadId`] - Opaque handles
//! - [`VmError`] - An engine-raised throwable that has not yet reached the heap
//! - [`ErrorKind`] - The throwable classes the engine raises itself
//! - [`StackFrame`] - One element of a stack trace
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, Value, VmError};
//!
//! let slot = Value::Long(7);
//! assert!(slot.is_wide());
//! assert_eq!(slot.as_long(), Some(7));
//!
//! let error = VmError::with_message(ErrorKind::ArithmeticException, "/ by zero");
//! assert_eq!(error.to_string(), "java.lang.ArithmeticException: / by zero");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod ids;
mod source;
mod value;

pub use error::{ErrorKind, VmError};
pub use ids::{ClassId, LoaderId, ObjectId, ThreadId};
pub use source::StackFrame;
pub use value::Value;
