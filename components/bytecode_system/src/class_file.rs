//! The decoded class descriptor handed over by the class-file parser.
//!
//! Names are internal (slash-separated) forms. The engine never re-parses
//! anything: all symbolic references stay in the [`ConstantPool`].

use crate::access::{has_flag, ACC_ABSTRACT, ACC_INTERFACE, ACC_NATIVE, ACC_STATIC};
use crate::constant_pool::ConstantPool;

/// One row of a method's exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    /// First covered pc (inclusive)
    pub start_pc: u16,
    /// End of the covered range (exclusive)
    pub end_pc: u16,
    /// Handler entry point
    pub handler_pc: u16,
    /// Class constant of the caught type, 0 for any
    pub catch_type: u16,
}

impl ExceptionTableEntry {
    /// Returns true if `pc` lies in `[start_pc, end_pc)`.
    pub fn covers(&self, pc: usize) -> bool {
        (self.start_pc as usize) <= pc && pc < self.end_pc as usize
    }
}

/// One row of a method's line-number table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumberEntry {
    /// First pc of the line
    pub start_pc: u16,
    /// Source line
    pub line_number: u16,
}

/// The `Code` attribute of a non-abstract, non-native method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    /// Maximum operand-stack depth in slots
    pub max_stack: u16,
    /// Local-variable slots, parameters included
    pub max_locals: u16,
    /// Raw instruction bytes
    pub code: Vec<u8>,
    /// Handlers in priority order
    pub exception_table: Vec<ExceptionTableEntry>,
    /// Line mapping, ordered by `start_pc`
    pub line_numbers: Vec<LineNumberEntry>,
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Field descriptor
    pub descriptor: String,
    /// Access flags
    pub access_flags: u16,
}

impl FieldInfo {
    /// Returns true for static fields.
    pub fn is_static(&self) -> bool {
        has_flag(self.access_flags, ACC_STATIC)
    }
}

/// A declared method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Access flags
    pub access_flags: u16,
    /// Bytecode, absent for abstract and native methods
    pub code: Option<CodeAttribute>,
}

impl MethodInfo {
    /// Returns true for static methods.
    pub fn is_static(&self) -> bool {
        has_flag(self.access_flags, ACC_STATIC)
    }

    /// Returns true for native methods.
    pub fn is_native(&self) -> bool {
        has_flag(self.access_flags, ACC_NATIVE)
    }

    /// Returns true for abstract methods.
    pub fn is_abstract(&self) -> bool {
        has_flag(self.access_flags, ACC_ABSTRACT)
    }
}

/// A decoded class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    /// Internal class name
    pub name: String,
    /// Superclass name; `None` only for the root object class
    pub super_name: Option<String>,
    /// Directly implemented interfaces
    pub interfaces: Vec<String>,
    /// Class access flags
    pub access_flags: u16,
    /// Symbolic constant pool
    pub constant_pool: ConstantPool,
    /// Declared fields in declaration order
    pub fields: Vec<FieldInfo>,
    /// Declared methods in declaration order
    pub methods: Vec<MethodInfo>,
    /// `SourceFile` attribute
    pub source_file: Option<String>,
}

impl ClassFile {
    /// Returns true for interfaces.
    pub fn is_interface(&self) -> bool {
        has_flag(self.access_flags, ACC_INTERFACE)
    }

    /// Finds a declared method by name and descriptor.
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }
}
