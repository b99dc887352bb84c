//! Tests for descriptor parsing

use bytecode_system::{FieldType, MethodDescriptor};

#[test]
fn test_wide_parameters_count_twice() {
    let descriptor = MethodDescriptor::parse("(JDI)J").unwrap();
    assert_eq!(descriptor.arg_slots(), 5);
    assert_eq!(descriptor.return_slots(), 2);
}

#[test]
fn test_reference_parameters_count_once() {
    let descriptor = MethodDescriptor::parse("([JLjava/lang/Object;)V").unwrap();
    assert_eq!(descriptor.arg_slots(), 2);
    assert_eq!(
        descriptor.params[0],
        FieldType::Array(Box::new(FieldType::Long))
    );
    assert_eq!(
        descriptor.params[1],
        FieldType::Object("java/lang/Object".to_string())
    );
}

#[test]
fn test_malformed_descriptors() {
    for bad in ["", "V", "(", "(Q)V", "(Ljava/lang/Object)V", "()"] {
        assert!(MethodDescriptor::parse(bad).is_err(), "{:?}", bad);
    }
    assert!(FieldType::parse("V").is_err());
    assert!(FieldType::parse("[").is_err());
}

#[test]
fn test_error_reports_position() {
    let error = MethodDescriptor::parse("(IX)V").unwrap_err();
    assert_eq!(error.position, 2);
}
