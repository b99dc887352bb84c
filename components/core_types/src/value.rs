//! Typed operand-stack and local-variable slots.
//!
//! Every slot carries its own tag. A 64-bit value occupies two consecutive
//! slots: the value itself followed by a [`Value::Top`] filler, so slot
//! indices line up with the local-variable numbering used by bytecode.

use crate::ObjectId;
use std::fmt;

/// One operand-stack or local-variable slot.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// assert_eq!(Value::zero_for("J"), Value::Long(0));
/// assert_eq!(Value::zero_for("Ljava/lang/Object;"), Value::Null);
/// assert_eq!(Value::Int(3).as_int(), Some(3));
/// assert!(Value::Double(1.0).is_wide());
/// ```
#[derive(Clone, Copy, PartialEq)]
pub enum Value {
    /// 32-bit integer; also carries boolean, byte, char and short values
    Int(i32),
    /// 64-bit integer (first of two slots)
    Long(i64),
    /// 32-bit IEEE float
    Float(f32),
    /// 64-bit IEEE float (first of two slots)
    Double(f64),
    /// Non-null object reference
    Reference(ObjectId),
    /// The null reference
    Null,
    /// Bytecode offset pushed by `jsr`
    ReturnAddress(u32),
    /// Second half of a wide value, or a never-written local
    Top,
}

impl Value {
    /// Returns the zero value for a field descriptor.
    pub fn zero_for(descriptor: &str) -> Value {
        match descriptor.as_bytes().first() {
            Some(b'J') => Value::Long(0),
            Some(b'F') => Value::Float(0.0),
            Some(b'D') => Value::Double(0.0),
            Some(b'L') | Some(b'[') => Value::Null,
            _ => Value::Int(0),
        }
    }

    /// Returns true if this value occupies two slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    /// Number of slots the value occupies.
    pub fn slot_count(&self) -> usize {
        if self.is_wide() {
            2
        } else {
            1
        }
    }

    /// Returns the integer payload.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the long payload.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float payload.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the double payload.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns `Some(None)` for null, `Some(Some(id))` for an object and
    /// `None` for every non-reference slot.
    pub fn as_reference(&self) -> Option<Option<ObjectId>> {
        match self {
            Value::Reference(id) => Some(Some(*id)),
            Value::Null => Some(None),
            _ => None,
        }
    }

    /// Returns the referenced object, if this slot holds one.
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Builds a reference slot from an optional object.
    pub fn from_reference(reference: Option<ObjectId>) -> Value {
        match reference {
            Some(id) => Value::Reference(id),
            None => Value::Null,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Value::Long(v) => f.debug_tuple("Long").field(v).finish(),
            Value::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Value::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Value::Reference(id) => write!(f, "Reference({})", id.0),
            Value::Null => write!(f, "Null"),
            Value::ReturnAddress(pc) => f.debug_tuple("ReturnAddress").field(pc).finish(),
            Value::Top => write!(f, "Top"),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Top
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(v as i32)
    }
}
