//! Field and method descriptor parsing.

use std::fmt;
use thiserror::Error;

/// A malformed descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed descriptor `{descriptor}` at byte {position}")]
pub struct DescriptorError {
    /// The descriptor text
    pub descriptor: String,
    /// Offset of the offending byte
    pub position: usize,
}

/// The type named by a field descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `D`
    Double,
    /// `F`
    Float,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `S`
    Short,
    /// `Z`
    Boolean,
    /// `L<name>;`
    Object(String),
    /// `[<component>`
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parses a complete field descriptor.
    pub fn parse(descriptor: &str) -> Result<FieldType, DescriptorError> {
        let mut position = 0;
        let field = parse_field(descriptor, &mut position)?;
        if position != descriptor.len() {
            return Err(error(descriptor, position));
        }
        Ok(field)
    }

    /// Operand-stack slots taken by a value of this type.
    pub fn slot_count(&self) -> usize {
        match self {
            FieldType::Long | FieldType::Double => 2,
            _ => 1,
        }
    }

    /// Returns true for object and array types.
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Byte => f.write_str("B"),
            FieldType::Char => f.write_str("C"),
            FieldType::Double => f.write_str("D"),
            FieldType::Float => f.write_str("F"),
            FieldType::Int => f.write_str("I"),
            FieldType::Long => f.write_str("J"),
            FieldType::Short => f.write_str("S"),
            FieldType::Boolean => f.write_str("Z"),
            FieldType::Object(name) => write!(f, "L{};", name),
            FieldType::Array(component) => write!(f, "[{}", component),
        }
    }
}

/// A parsed method descriptor.
///
/// # Examples
///
/// ```
/// use bytecode_system::MethodDescriptor;
///
/// let descriptor = MethodDescriptor::parse("(IJLjava/lang/String;[D)V").unwrap();
/// assert_eq!(descriptor.params.len(), 4);
/// assert_eq!(descriptor.arg_slots(), 5);
/// assert!(descriptor.ret.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Parameter types in order
    pub params: Vec<FieldType>,
    /// Return type, `None` for void
    pub ret: Option<FieldType>,
}

impl MethodDescriptor {
    /// Parses a complete method descriptor.
    pub fn parse(descriptor: &str) -> Result<MethodDescriptor, DescriptorError> {
        let bytes = descriptor.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(error(descriptor, 0));
        }
        let mut position = 1;
        let mut params = Vec::new();
        loop {
            match bytes.get(position) {
                Some(b')') => {
                    position += 1;
                    break;
                }
                Some(_) => params.push(parse_field(descriptor, &mut position)?),
                None => return Err(error(descriptor, position)),
            }
        }
        let ret = if bytes.get(position) == Some(&b'V') {
            position += 1;
            None
        } else {
            Some(parse_field(descriptor, &mut position)?)
        };
        if position != descriptor.len() {
            return Err(error(descriptor, position));
        }
        Ok(MethodDescriptor { params, ret })
    }

    /// Argument slots, not counting a receiver. Long and double count twice.
    pub fn arg_slots(&self) -> usize {
        self.params.iter().map(FieldType::slot_count).sum()
    }

    /// Slots the return value occupies on the caller's stack.
    pub fn return_slots(&self) -> usize {
        self.ret.as_ref().map_or(0, FieldType::slot_count)
    }
}

fn error(descriptor: &str, position: usize) -> DescriptorError {
    DescriptorError {
        descriptor: descriptor.to_string(),
        position,
    }
}

fn parse_field(descriptor: &str, position: &mut usize) -> Result<FieldType, DescriptorError> {
    let bytes = descriptor.as_bytes();
    let start = *position;
    let byte = *bytes.get(start).ok_or_else(|| error(descriptor, start))?;
    *position += 1;
    let field = match byte {
        b'B' => FieldType::Byte,
        b'C' => FieldType::Char,
        b'D' => FieldType::Double,
        b'F' => FieldType::Float,
        b'I' => FieldType::Int,
        b'J' => FieldType::Long,
        b'S' => FieldType::Short,
        b'Z' => FieldType::Boolean,
        b'L' => {
            let end = descriptor[*position..]
                .find(';')
                .map(|offset| *position + offset)
                .ok_or_else(|| error(descriptor, start))?;
            if end == *position {
                return Err(error(descriptor, *position));
            }
            let name = descriptor[*position..end].to_string();
            *position = end + 1;
            FieldType::Object(name)
        }
        b'[' => FieldType::Array(Box::new(parse_field(descriptor, position)?)),
        _ => return Err(error(descriptor, start)),
    };
    Ok(field)
}
