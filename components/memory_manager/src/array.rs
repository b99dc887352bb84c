//! Typed array storage.
//!
//! Each element kind keeps its own backing vector so stores truncate and
//! loads extend exactly as the instruction set requires.

use core_types::{ObjectId, Value};

/// Element kind of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    /// `Z`, stored as bytes
    Boolean,
    /// `C`
    Char,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `B`
    Byte,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// Any object or array component
    Reference,
}

impl ArrayKind {
    /// Decodes a `newarray` type code (4 through 11).
    pub fn from_type_code(code: u8) -> Option<ArrayKind> {
        match code {
            4 => Some(ArrayKind::Boolean),
            5 => Some(ArrayKind::Char),
            6 => Some(ArrayKind::Float),
            7 => Some(ArrayKind::Double),
            8 => Some(ArrayKind::Byte),
            9 => Some(ArrayKind::Short),
            10 => Some(ArrayKind::Int),
            11 => Some(ArrayKind::Long),
            _ => None,
        }
    }

    /// Kind of the elements of an array whose component descriptor is given.
    pub fn from_component(descriptor: &str) -> ArrayKind {
        match descriptor.as_bytes().first() {
            Some(b'Z') => ArrayKind::Boolean,
            Some(b'C') => ArrayKind::Char,
            Some(b'F') => ArrayKind::Float,
            Some(b'D') => ArrayKind::Double,
            Some(b'B') => ArrayKind::Byte,
            Some(b'S') => ArrayKind::Short,
            Some(b'I') => ArrayKind::Int,
            Some(b'J') => ArrayKind::Long,
            _ => ArrayKind::Reference,
        }
    }

    /// Component descriptor of a primitive kind; `None` for references.
    pub fn descriptor(self) -> Option<&'static str> {
        match self {
            ArrayKind::Boolean => Some("Z"),
            ArrayKind::Char => Some("C"),
            ArrayKind::Float => Some("F"),
            ArrayKind::Double => Some("D"),
            ArrayKind::Byte => Some("B"),
            ArrayKind::Short => Some("S"),
            ArrayKind::Int => Some("I"),
            ArrayKind::Long => Some("J"),
            ArrayKind::Reference => None,
        }
    }

    /// Bytes per element, used for heap accounting.
    pub fn element_size(self) -> usize {
        match self {
            ArrayKind::Boolean | ArrayKind::Byte => 1,
            ArrayKind::Char | ArrayKind::Short => 2,
            ArrayKind::Float | ArrayKind::Int => 4,
            ArrayKind::Double | ArrayKind::Long | ArrayKind::Reference => 8,
        }
    }
}

/// Backing store of an array object.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayStorage {
    /// Boolean and byte arrays
    Byte(Vec<i8>),
    /// Char arrays
    Char(Vec<u16>),
    /// Short arrays
    Short(Vec<i16>),
    /// Int arrays
    Int(Vec<i32>),
    /// Long arrays
    Long(Vec<i64>),
    /// Float arrays
    Float(Vec<f32>),
    /// Double arrays
    Double(Vec<f64>),
    /// Reference arrays
    Reference(Vec<Option<ObjectId>>),
}

impl ArrayStorage {
    /// Allocates zeroed storage.
    pub fn new(kind: ArrayKind, length: usize) -> Self {
        match kind {
            ArrayKind::Boolean | ArrayKind::Byte => ArrayStorage::Byte(vec![0; length]),
            ArrayKind::Char => ArrayStorage::Char(vec![0; length]),
            ArrayKind::Short => ArrayStorage::Short(vec![0; length]),
            ArrayKind::Int => ArrayStorage::Int(vec![0; length]),
            ArrayKind::Long => ArrayStorage::Long(vec![0; length]),
            ArrayKind::Float => ArrayStorage::Float(vec![0.0; length]),
            ArrayKind::Double => ArrayStorage::Double(vec![0.0; length]),
            ArrayKind::Reference => ArrayStorage::Reference(vec![None; length]),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayStorage::Byte(v) => v.len(),
            ArrayStorage::Char(v) => v.len(),
            ArrayStorage::Short(v) => v.len(),
            ArrayStorage::Int(v) => v.len(),
            ArrayStorage::Long(v) => v.len(),
            ArrayStorage::Float(v) => v.len(),
            ArrayStorage::Double(v) => v.len(),
            ArrayStorage::Reference(v) => v.len(),
        }
    }

    /// Returns true for zero-length arrays.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads element `index` as a stack value. Narrow kinds widen to int.
    pub fn load(&self, index: usize) -> Option<Value> {
        Some(match self {
            ArrayStorage::Byte(v) => Value::Int(*v.get(index)? as i32),
            ArrayStorage::Char(v) => Value::Int(*v.get(index)? as i32),
            ArrayStorage::Short(v) => Value::Int(*v.get(index)? as i32),
            ArrayStorage::Int(v) => Value::Int(*v.get(index)?),
            ArrayStorage::Long(v) => Value::Long(*v.get(index)?),
            ArrayStorage::Float(v) => Value::Float(*v.get(index)?),
            ArrayStorage::Double(v) => Value::Double(*v.get(index)?),
            ArrayStorage::Reference(v) => Value::from_reference(*v.get(index)?),
        })
    }

    /// Stores a stack value into element `index`, truncating narrow kinds.
    /// Returns false if the index is out of range or the value has the wrong tag.
    pub fn store(&mut self, index: usize, value: Value) -> bool {
        match (self, value) {
            (ArrayStorage::Byte(v), Value::Int(x)) => put(v, index, x as i8),
            (ArrayStorage::Char(v), Value::Int(x)) => put(v, index, x as u16),
            (ArrayStorage::Short(v), Value::Int(x)) => put(v, index, x as i16),
            (ArrayStorage::Int(v), Value::Int(x)) => put(v, index, x),
            (ArrayStorage::Long(v), Value::Long(x)) => put(v, index, x),
            (ArrayStorage::Float(v), Value::Float(x)) => put(v, index, x),
            (ArrayStorage::Double(v), Value::Double(x)) => put(v, index, x),
            (ArrayStorage::Reference(v), Value::Reference(id)) => put(v, index, Some(id)),
            (ArrayStorage::Reference(v), Value::Null) => put(v, index, None),
            _ => false,
        }
    }

    /// Objects referenced by a reference array.
    pub fn references(&self) -> impl Iterator<Item = ObjectId> + '_ {
        let slice: &[Option<ObjectId>] = match self {
            ArrayStorage::Reference(v) => v,
            _ => &[],
        };
        slice.iter().flatten().copied()
    }
}

fn put<T>(storage: &mut [T], index: usize, value: T) -> bool {
    match storage.get_mut(index) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => false,
    }
}
