//! Class-file execution engine
//!
//! This crate provides a virtual machine for class-file bytecode with:
//! - Lazy, memoized and thread-safe constant-pool resolution
//! - A linker computing instance layouts and virtual dispatch tables
//! - A class initialization state machine safe under concurrent first use
//! - A stack-based interpreter that rewrites resolved instructions into
//!   quick forms
//! - Monitors, attached threads, native methods and garbage collection
//!
//! # Example
//!
//! ```
//! use bytecode_system::access::{ACC_PUBLIC, ACC_STATIC};
//! use bytecode_system::{ClassBuilder, CodeBuilder, Opcode};
//! use core_types::{LoaderId, Value};
//! use interpreter::{InMemorySource, Vm, VmConfig};
//! use std::sync::Arc;
//!
//! let mut class = ClassBuilder::new("demo/Adder");
//! let mut code = CodeBuilder::new();
//! code.op(Opcode::Iload0).op(Opcode::Iload1).op(Opcode::Iadd).op(Opcode::Ireturn);
//! class.method("add", "(II)I", ACC_PUBLIC | ACC_STATIC, code.build(2, 2).unwrap());
//!
//! let source = Arc::new(InMemorySource::with_classes([class.build()]));
//! let vm = Vm::new(VmConfig::default(), source).unwrap();
//! let mut thread = vm.attach_thread("main");
//!
//! let adder = vm.load_class("demo/Adder", LoaderId::BOOTSTRAP).unwrap();
//! let sum = vm
//!     .invoke_static(&mut thread, &adder, "add", "(II)I", &[Value::Int(40), Value::Int(2)])
//!     .unwrap();
//! assert_eq!(sum, Some(Value::Int(42)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod call_frame;
pub mod class;
pub mod config;
pub mod constant_pool;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod exception;
pub mod gc_integration;
pub mod initializer;
pub mod inline_cache;
pub mod linker;
pub mod loader;
pub mod native;
pub mod quicken;
pub mod registry;
pub mod thread;
pub mod vm;

// Re-export main types at crate root
pub use bootstrap::BootstrapLibrary;
pub use call_frame::CallFrame;
pub use class::{ArrayInfo, Class, ClassState, Code, Field, Linkage, Method};
pub use config::{parse_mem_value, ConfigError, VmConfig};
pub use constant_pool::{Resolved, RuntimePool};
pub use context::ThreadContext;
pub use error::{ExecResult, Exception, StartupError, UncaughtException};
pub use exception::Backtrace;
pub use inline_cache::InterfaceCache;
pub use linker::link;
pub use loader::{ClassSource, InMemorySource, SourceChain};
pub use native::{long_name, mangle, short_name, NativeContext, NativeFn, NativeLibrary, NativeResolver};
pub use quicken::CodeStream;
pub use registry::Registry;
pub use thread::JavaThread;
pub use vm::Vm;
