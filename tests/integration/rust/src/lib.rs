//! Integration test suite for the class-file execution engine
//!
//! This crate verifies that the components work together across their
//! boundaries: classes assembled by `bytecode_system`, executed by
//! `interpreter`, on objects owned by `memory_manager`.

use bytecode_system::ClassFile;
use interpreter::{InMemorySource, Vm, VmConfig};
use std::sync::Arc;

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use memory_manager;
}

/// Starts an engine whose bootstrap path also serves `classes`.
pub fn engine(classes: Vec<ClassFile>) -> Arc<Vm> {
    engine_with(VmConfig::default(), classes)
}

/// Like [`engine`] with explicit settings.
pub fn engine_with(config: VmConfig, classes: Vec<ClassFile>) -> Arc<Vm> {
    match Vm::new(config, Arc::new(InMemorySource::with_classes(classes))) {
        Ok(vm) => vm,
        Err(error) => panic!("engine failed to start: {}", error),
    }
}
