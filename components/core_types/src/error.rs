//! Throwables raised by the engine itself.
//!
//! Runtime faults and linkage failures are first described by a [`VmError`].
//! The interpreter turns them into heap throwables of the class named by
//! [`ErrorKind::class_name`] when exception dispatch begins.

use crate::ObjectId;
use std::fmt;
use thiserror::Error;

/// The throwable classes the engine raises without executing bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Integer divide or remainder by zero
    ArithmeticException,
    /// Dereference of the null reference
    NullPointerException,
    /// Array index outside `[0, length)`
    ArrayIndexOutOfBoundsException,
    /// Array created with a negative length
    NegativeArraySizeException,
    /// Reference stored into an array of an incompatible component type
    ArrayStoreException,
    /// Failed `checkcast`
    ClassCastException,
    /// Monitor released or waited on by a non-owner
    IllegalMonitorStateException,
    /// Argument outside the range a native method accepts
    IllegalArgumentException,
    /// Blocking wait interrupted
    InterruptedException,
    /// Java stack exhausted
    StackOverflowError,
    /// Heap exhausted
    OutOfMemoryError,
    /// Engine invariant violated by malformed input
    InternalError,
    /// Class could not be found or is unusable
    NoClassDefFoundError,
    /// Class data is malformed
    ClassFormatError,
    /// A class is its own superclass or superinterface
    ClassCircularityError,
    /// Class hierarchy changed incompatibly
    IncompatibleClassChangeError,
    /// Field missing from the class and its ancestry
    NoSuchFieldError,
    /// Method missing from the class and its ancestry
    NoSuchMethodError,
    /// Abstract method invoked
    AbstractMethodError,
    /// Native method has no implementation
    UnsatisfiedLinkError,
    /// Static initializer threw a non-`Error` throwable
    ExceptionInInitializerError,
}

impl ErrorKind {
    /// Every kind, in dependency order (superclasses before subclasses).
    pub const ALL: [ErrorKind; 21] = [
        ErrorKind::ArithmeticException,
        ErrorKind::NullPointerException,
        ErrorKind::ArrayIndexOutOfBoundsException,
        ErrorKind::NegativeArraySizeException,
        ErrorKind::ArrayStoreException,
        ErrorKind::ClassCastException,
        ErrorKind::IllegalMonitorStateException,
        ErrorKind::IllegalArgumentException,
        ErrorKind::InterruptedException,
        ErrorKind::StackOverflowError,
        ErrorKind::OutOfMemoryError,
        ErrorKind::InternalError,
        ErrorKind::NoClassDefFoundError,
        ErrorKind::ClassFormatError,
        ErrorKind::ClassCircularityError,
        ErrorKind::IncompatibleClassChangeError,
        ErrorKind::NoSuchFieldError,
        ErrorKind::NoSuchMethodError,
        ErrorKind::AbstractMethodError,
        ErrorKind::UnsatisfiedLinkError,
        ErrorKind::ExceptionInInitializerError,
    ];

    /// Internal (slash-separated) name of the throwable class.
    pub fn class_name(self) -> &'static str {
        match self {
            ErrorKind::ArithmeticException => "java/lang/ArithmeticException",
            ErrorKind::NullPointerException => "java/lang/NullPointerException",
            ErrorKind::ArrayIndexOutOfBoundsException => {
                "java/lang/ArrayIndexOutOfBoundsException"
            }
            ErrorKind::NegativeArraySizeException => "java/lang/NegativeArraySizeException",
            ErrorKind::ArrayStoreException => "java/lang/ArrayStoreException",
            ErrorKind::ClassCastException => "java/lang/ClassCastException",
            ErrorKind::IllegalMonitorStateException => "java/lang/IllegalMonitorStateException",
            ErrorKind::IllegalArgumentException => "java/lang/IllegalArgumentException",
            ErrorKind::InterruptedException => "java/lang/InterruptedException",
            ErrorKind::StackOverflowError => "java/lang/StackOverflowError",
            ErrorKind::OutOfMemoryError => "java/lang/OutOfMemoryError",
            ErrorKind::InternalError => "java/lang/InternalError",
            ErrorKind::NoClassDefFoundError => "java/lang/NoClassDefFoundError",
            ErrorKind::ClassFormatError => "java/lang/ClassFormatError",
            ErrorKind::ClassCircularityError => "java/lang/ClassCircularityError",
            ErrorKind::IncompatibleClassChangeError => "java/lang/IncompatibleClassChangeError",
            ErrorKind::NoSuchFieldError => "java/lang/NoSuchFieldError",
            ErrorKind::NoSuchMethodError => "java/lang/NoSuchMethodError",
            ErrorKind::AbstractMethodError => "java/lang/AbstractMethodError",
            ErrorKind::UnsatisfiedLinkError => "java/lang/UnsatisfiedLinkError",
            ErrorKind::ExceptionInInitializerError => "java/lang/ExceptionInInitializerError",
        }
    }

    /// Internal name of the direct superclass.
    pub fn superclass_name(self) -> &'static str {
        match self {
            ErrorKind::ArithmeticException
            | ErrorKind::NullPointerException
            | ErrorKind::NegativeArraySizeException
            | ErrorKind::ArrayStoreException
            | ErrorKind::ClassCastException
            | ErrorKind::IllegalMonitorStateException
            | ErrorKind::IllegalArgumentException => "java/lang/RuntimeException",
            ErrorKind::ArrayIndexOutOfBoundsException => "java/lang/IndexOutOfBoundsException",
            ErrorKind::InterruptedException => "java/lang/Exception",
            ErrorKind::StackOverflowError
            | ErrorKind::OutOfMemoryError
            | ErrorKind::InternalError => "java/lang/VirtualMachineError",
            ErrorKind::NoClassDefFoundError
            | ErrorKind::ClassFormatError
            | ErrorKind::ClassCircularityError
            | ErrorKind::IncompatibleClassChangeError
            | ErrorKind::UnsatisfiedLinkError
            | ErrorKind::ExceptionInInitializerError => "java/lang/LinkageError",
            ErrorKind::NoSuchFieldError
            | ErrorKind::NoSuchMethodError
            | ErrorKind::AbstractMethodError => "java/lang/IncompatibleClassChangeError",
        }
    }

    /// Returns true if the class descends from `java/lang/Error`.
    pub fn is_error(self) -> bool {
        !matches!(
            self,
            ErrorKind::ArithmeticException
                | ErrorKind::NullPointerException
                | ErrorKind::ArrayIndexOutOfBoundsException
                | ErrorKind::NegativeArraySizeException
                | ErrorKind::ArrayStoreException
                | ErrorKind::ClassCastException
                | ErrorKind::IllegalMonitorStateException
                | ErrorKind::IllegalArgumentException
                | ErrorKind::InterruptedException
        )
    }

    /// Returns true for the `LinkageError` family.
    pub fn is_linkage_error(self) -> bool {
        matches!(
            self,
            ErrorKind::NoClassDefFoundError
                | ErrorKind::ClassFormatError
                | ErrorKind::ClassCircularityError
                | ErrorKind::IncompatibleClassChangeError
                | ErrorKind::NoSuchFieldError
                | ErrorKind::NoSuchMethodError
                | ErrorKind::AbstractMethodError
                | ErrorKind::UnsatisfiedLinkError
                | ErrorKind::ExceptionInInitializerError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class_name().replace('/', "."))
    }
}

fn message_suffix(message: &Option<String>) -> String {
    match message {
        Some(text) => format!(": {}", text),
        None => String::new(),
    }
}

/// A throwable raised by the engine that has not been allocated yet.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, VmError};
///
/// let error = VmError::new(ErrorKind::NullPointerException);
/// assert_eq!(error.to_string(), "java.lang.NullPointerException");
/// assert!(!error.kind.is_error());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}{}", message_suffix(.message))]
pub struct VmError {
    /// Class of the throwable to create
    pub kind: ErrorKind,
    /// Detail message
    pub message: Option<String>,
    /// Heap throwable recorded as the cause
    pub cause: Option<ObjectId>,
}

impl VmError {
    /// Creates an error without a message.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            cause: None,
        }
    }

    /// Creates an error with a detail message.
    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
            cause: None,
        }
    }

    /// Attaches a cause.
    pub fn caused_by(mut self, cause: ObjectId) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Integer division by zero.
    pub fn divide_by_zero() -> Self {
        Self::with_message(ErrorKind::ArithmeticException, "/ by zero")
    }

    /// Null dereference.
    pub fn null_pointer() -> Self {
        Self::new(ErrorKind::NullPointerException)
    }

    /// Array index out of bounds; the message is the offending index.
    pub fn index_out_of_bounds(index: i32) -> Self {
        Self::with_message(ErrorKind::ArrayIndexOutOfBoundsException, index.to_string())
    }

    /// Engine invariant broken by malformed bytecode.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::InternalError, message)
    }
}
