//! Class sources.
//!
//! A class loader is a [`ClassSource`] registered with the engine. The
//! source only hands out decoded class files; definition, delegation and
//! caching happen in the registry.

use bytecode_system::ClassFile;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Supplies decoded classes by internal name.
pub trait ClassSource: Send + Sync {
    /// Returns the class named `name`, if this source has it.
    fn find_class(&self, name: &str) -> Option<ClassFile>;
}

/// A source backed by a map of already decoded classes.
///
/// # Examples
///
/// ```
/// use bytecode_system::ClassBuilder;
/// use interpreter::{ClassSource, InMemorySource};
///
/// let source = InMemorySource::new();
/// source.add(ClassBuilder::new("demo/Point").build());
/// assert!(source.find_class("demo/Point").is_some());
/// assert!(source.find_class("demo/Line").is_none());
/// ```
#[derive(Debug, Default)]
pub struct InMemorySource {
    classes: RwLock<HashMap<String, ClassFile>>,
}

impl InMemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source holding `classes`.
    pub fn with_classes(classes: impl IntoIterator<Item = ClassFile>) -> Self {
        let source = Self::new();
        for class in classes {
            source.add(class);
        }
        source
    }

    /// Adds or replaces a class. Classes already defined from this source
    /// are unaffected.
    pub fn add(&self, class: ClassFile) {
        self.classes.write().insert(class.name.clone(), class);
    }

    /// Number of classes held.
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    /// Returns true if the source holds no classes.
    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

impl ClassSource for InMemorySource {
    fn find_class(&self, name: &str) -> Option<ClassFile> {
        self.classes.read().get(name).cloned()
    }
}

/// Searches several sources in order.
#[derive(Clone, Default)]
pub struct SourceChain {
    sources: Vec<Arc<dyn ClassSource>>,
}

impl SourceChain {
    /// Creates a chain searching `sources` front to back.
    pub fn new(sources: Vec<Arc<dyn ClassSource>>) -> Self {
        Self { sources }
    }
}

impl ClassSource for SourceChain {
    fn find_class(&self, name: &str) -> Option<ClassFile> {
        self.sources.iter().find_map(|source| source.find_class(name))
    }
}

impl std::fmt::Debug for SourceChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceChain")
            .field("sources", &self.sources.len())
            .finish()
    }
}
