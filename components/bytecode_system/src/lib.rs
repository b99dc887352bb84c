//! Class-file data model and instruction set
//!
//! This crate describes what the class-file parser hands to the execution
//! engine: decoded classes with their symbolic constant pools, method
//! bytecode, exception and line-number tables. It also defines the opcode
//! set, including the quickened forms the interpreter rewrites itself into,
//! and an assembler for building classes in code.
//!
//! # Features
//!
//! - Standard and quickened opcodes with encoded lengths
//! - Symbolic constant pool with member-reference decoding
//! - Field and method descriptor parsing with slot counting
//! - Operand decoding over any [`ByteSource`], including switch tables
//! - Label-based assembler for method bodies
//!
//! # Example
//!
//! ```
//! use bytecode_system::{access, ClassBuilder, CodeBuilder, MethodDescriptor, Opcode};
//!
//! let mut class = ClassBuilder::new("demo/Math");
//! let mut code = CodeBuilder::new();
//! code.op(Opcode::Iload0)
//!     .op(Opcode::Iload1)
//!     .op(Opcode::Iadd)
//!     .op(Opcode::Ireturn);
//! class.method("add", "(II)I", access::ACC_STATIC, code.build(2, 2).unwrap());
//!
//! let file = class.build();
//! let add = file.method("add", "(II)I").unwrap();
//! assert_eq!(MethodDescriptor::parse(&add.descriptor).unwrap().arg_slots(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod builder;
pub mod class_file;
pub mod constant_pool;
pub mod descriptor;
pub mod instruction;
pub mod opcode;

// Re-export main types at crate root
pub use builder::{BuildError, ClassBuilder, CodeBuilder, Label};
pub use class_file::{
    ClassFile, CodeAttribute, ExceptionTableEntry, FieldInfo, LineNumberEntry, MethodInfo,
};
pub use constant_pool::{Constant, ConstantPool, MemberRef};
pub use descriptor::{DescriptorError, FieldType, MethodDescriptor};
pub use instruction::ByteSource;
pub use opcode::Opcode;
