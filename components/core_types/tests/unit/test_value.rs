//! Unit tests for operand-stack slots

use core_types::{ObjectId, Value};

#[test]
fn test_wide_values_take_two_slots() {
    assert_eq!(Value::Long(1).slot_count(), 2);
    assert_eq!(Value::Double(1.0).slot_count(), 2);
    assert_eq!(Value::Int(1).slot_count(), 1);
    assert_eq!(Value::Null.slot_count(), 1);
}

#[test]
fn test_zero_for_every_descriptor_kind() {
    let cases = [
        ("B", Value::Int(0)),
        ("C", Value::Int(0)),
        ("S", Value::Int(0)),
        ("I", Value::Int(0)),
        ("Z", Value::Int(0)),
        ("J", Value::Long(0)),
        ("F", Value::Float(0.0)),
        ("D", Value::Double(0.0)),
        ("Ljava/lang/String;", Value::Null),
        ("[[J", Value::Null),
    ];
    for (descriptor, expected) in cases {
        assert_eq!(Value::zero_for(descriptor), expected, "{}", descriptor);
    }
}

#[test]
fn test_typed_accessors_reject_other_tags() {
    assert_eq!(Value::Float(2.5).as_float(), Some(2.5));
    assert_eq!(Value::Float(2.5).as_int(), None);
    assert_eq!(Value::Int(2).as_long(), None);
    assert_eq!(Value::Top.as_reference(), None);
}

#[test]
fn test_from_reference() {
    assert_eq!(Value::from_reference(None), Value::Null);
    assert_eq!(
        Value::from_reference(Some(ObjectId(3))),
        Value::Reference(ObjectId(3))
    );
}

#[test]
fn test_conversions() {
    assert_eq!(Value::from(true), Value::Int(1));
    assert_eq!(Value::from(7i64), Value::Long(7));
    assert_eq!(Value::from(1.5f64), Value::Double(1.5));
}
