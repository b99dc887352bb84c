//! Symbolic constant-pool entries as produced by the class-file parser.
//!
//! Index 0 is never valid. A long or double occupies two indices; the
//! second holds [`Constant::Unusable`].

use std::sync::Arc;

/// Constant-pool tags as they appear in class files.
pub mod tag {
    /// Modified UTF-8 text
    pub const UTF8: u8 = 1;
    /// 32-bit integer
    pub const INTEGER: u8 = 3;
    /// 32-bit float
    pub const FLOAT: u8 = 4;
    /// 64-bit integer
    pub const LONG: u8 = 5;
    /// 64-bit float
    pub const DOUBLE: u8 = 6;
    /// Class reference
    pub const CLASS: u8 = 7;
    /// String literal
    pub const STRING: u8 = 8;
    /// Field reference
    pub const FIELDREF: u8 = 9;
    /// Class method reference
    pub const METHODREF: u8 = 10;
    /// Interface method reference
    pub const INTERFACE_METHODREF: u8 = 11;
    /// Name and descriptor pair
    pub const NAME_AND_TYPE: u8 = 12;
}

/// One symbolic constant-pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Slot 0, or the upper half of a long/double
    Unusable,
    /// Text
    Utf8(Arc<str>),
    /// Integer literal
    Integer(i32),
    /// Float literal
    Float(f32),
    /// Long literal
    Long(i64),
    /// Double literal
    Double(f64),
    /// Class reference by name index
    Class {
        /// Index of the internal class name
        name_index: u16,
    },
    /// String literal by text index
    String {
        /// Index of the literal's text
        string_index: u16,
    },
    /// Field reference
    Fieldref {
        /// Index of the owning class reference
        class_index: u16,
        /// Index of the name-and-type pair
        name_and_type_index: u16,
    },
    /// Class method reference
    Methodref {
        /// Index of the owning class reference
        class_index: u16,
        /// Index of the name-and-type pair
        name_and_type_index: u16,
    },
    /// Interface method reference
    InterfaceMethodref {
        /// Index of the owning interface reference
        class_index: u16,
        /// Index of the name-and-type pair
        name_and_type_index: u16,
    },
    /// Member name and descriptor
    NameAndType {
        /// Index of the member name
        name_index: u16,
        /// Index of the member descriptor
        descriptor_index: u16,
    },
}

impl Constant {
    /// The class-file tag of this entry, or 0 for [`Constant::Unusable`].
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Unusable => 0,
            Constant::Utf8(_) => tag::UTF8,
            Constant::Integer(_) => tag::INTEGER,
            Constant::Float(_) => tag::FLOAT,
            Constant::Long(_) => tag::LONG,
            Constant::Double(_) => tag::DOUBLE,
            Constant::Class { .. } => tag::CLASS,
            Constant::String { .. } => tag::STRING,
            Constant::Fieldref { .. } => tag::FIELDREF,
            Constant::Methodref { .. } => tag::METHODREF,
            Constant::InterfaceMethodref { .. } => tag::INTERFACE_METHODREF,
            Constant::NameAndType { .. } => tag::NAME_AND_TYPE,
        }
    }

    /// Returns true for entries that occupy two indices.
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// A symbolic member reference decoded from a field or method ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef<'a> {
    /// Index of the class reference entry
    pub class_index: u16,
    /// Member name
    pub name: &'a str,
    /// Member descriptor
    pub descriptor: &'a str,
}

/// The symbolic constant pool of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Creates a pool holding only the reserved slot 0.
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }

    /// Creates a pool from parsed entries, slot 0 included.
    pub fn from_entries(entries: Vec<Constant>) -> Self {
        Self { entries }
    }

    /// Appends an entry and returns its index. Wide entries reserve the
    /// following index.
    pub fn push(&mut self, constant: Constant) -> u16 {
        let index = self.entries.len() as u16;
        let wide = constant.is_wide();
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        index
    }

    /// Number of slots, including slot 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the pool holds nothing but slot 0.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Returns the entry at `index`.
    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize)
    }

    /// All entries, slot 0 included.
    pub fn entries(&self) -> &[Constant] {
        &self.entries
    }

    /// Text of a Utf8 entry.
    pub fn utf8(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Utf8(text) => Some(text.as_ref()),
            _ => None,
        }
    }

    /// Internal name referenced by a Class entry.
    pub fn class_name(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => None,
        }
    }

    /// Text referenced by a String entry.
    pub fn string(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::String { string_index } => self.utf8(*string_index),
            _ => None,
        }
    }

    /// Name and descriptor of a NameAndType entry.
    pub fn name_and_type(&self, index: u16) -> Option<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Some((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => None,
        }
    }

    /// Decodes a Fieldref, Methodref or InterfaceMethodref entry.
    pub fn member_ref(&self, index: u16) -> Option<MemberRef<'_>> {
        let (class_index, name_and_type_index) = match self.get(index)? {
            Constant::Fieldref {
                class_index,
                name_and_type_index,
            }
            | Constant::Methodref {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => (*class_index, *name_and_type_index),
            _ => return None,
        };
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        Some(MemberRef {
            class_index,
            name,
            descriptor,
        })
    }
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}
