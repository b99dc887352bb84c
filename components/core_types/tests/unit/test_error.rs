//! Unit tests for VmError and ErrorKind

use core_types::{ErrorKind, ObjectId, VmError};

#[cfg(test)]
mod error_kind_tests {
    use super::*;

    #[test]
    fn test_runtime_exceptions_are_not_errors() {
        for kind in [
            ErrorKind::ArithmeticException,
            ErrorKind::NullPointerException,
            ErrorKind::ClassCastException,
            ErrorKind::IllegalArgumentException,
            ErrorKind::InterruptedException,
        ] {
            assert!(!kind.is_error(), "{} must not be an Error", kind);
        }
    }

    #[test]
    fn test_linkage_errors_are_errors() {
        for kind in ErrorKind::ALL.iter().filter(|k| k.is_linkage_error()) {
            assert!(kind.is_error());
        }
    }

    #[test]
    fn test_superclasses_precede_subclasses() {
        let position = |name: &str| {
            ErrorKind::ALL
                .iter()
                .position(|k| k.class_name() == name)
        };
        for (index, kind) in ErrorKind::ALL.iter().enumerate() {
            if let Some(parent) = position(kind.superclass_name()) {
                assert!(parent < index, "{} listed before its superclass", kind);
            }
        }
    }

    #[test]
    fn test_display_uses_dotted_name() {
        assert_eq!(
            ErrorKind::NoClassDefFoundError.to_string(),
            "java.lang.NoClassDefFoundError"
        );
    }
}

#[cfg(test)]
mod vm_error_tests {
    use super::*;

    #[test]
    fn test_divide_by_zero_message() {
        let error = VmError::divide_by_zero();
        assert_eq!(error.kind, ErrorKind::ArithmeticException);
        assert_eq!(error.message.as_deref(), Some("/ by zero"));
    }

    #[test]
    fn test_cause_is_attached() {
        let error = VmError::new(ErrorKind::ExceptionInInitializerError).caused_by(ObjectId(9));
        assert_eq!(error.cause, Some(ObjectId(9)));
        assert_eq!(error.to_string(), "java.lang.ExceptionInInitializerError");
    }

    #[test]
    fn test_internal_error_message() {
        let error = VmError::internal("bad opcode 253");
        assert_eq!(error.to_string(), "java.lang.InternalError: bad opcode 253");
    }
}
