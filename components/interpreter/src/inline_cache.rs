//! Call-site cache for interface dispatch
//!
//! `invokeinterface` cannot use a fixed table index, since implementers lay
//! out their dispatch tables independently. Each quickened call site keeps
//! the receiver classes it has seen and the methods they selected.

use crate::class::Method;
use arrayvec::ArrayVec;
use core_types::ClassId;
use std::sync::Arc;

/// Receiver classes cached per call site before going megamorphic.
pub const POLYMORPHIC_LIMIT: usize = 4;

/// Inline cache of one `invokeinterface` site.
#[derive(Debug, Clone, Default)]
pub enum InterfaceCache {
    /// Nothing cached yet
    #[default]
    Uninitialized,
    /// One receiver class seen
    Monomorphic {
        /// Receiver class
        class: ClassId,
        /// Selected method
        method: Arc<Method>,
    },
    /// Several receiver classes seen
    Polymorphic {
        /// (receiver class, selected method) pairs
        entries: ArrayVec<(ClassId, Arc<Method>), POLYMORPHIC_LIMIT>,
    },
    /// Too many receiver classes; always look up
    Megamorphic,
}

impl InterfaceCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Method cached for `class`.
    pub fn lookup(&self, class: ClassId) -> Option<Arc<Method>> {
        match self {
            InterfaceCache::Uninitialized | InterfaceCache::Megamorphic => None,
            InterfaceCache::Monomorphic {
                class: cached,
                method,
            } => (*cached == class).then(|| Arc::clone(method)),
            InterfaceCache::Polymorphic { entries } => entries
                .iter()
                .find(|(cached, _)| *cached == class)
                .map(|(_, method)| Arc::clone(method)),
        }
    }

    /// Records that `class` selected `method`.
    pub fn update(&mut self, class: ClassId, method: Arc<Method>) {
        match self {
            InterfaceCache::Uninitialized => {
                *self = InterfaceCache::Monomorphic { class, method };
            }
            InterfaceCache::Monomorphic {
                class: cached,
                method: cached_method,
            } => {
                if *cached == class {
                    *cached_method = method;
                } else {
                    let mut entries = ArrayVec::new();
                    entries.push((*cached, Arc::clone(cached_method)));
                    entries.push((class, method));
                    *self = InterfaceCache::Polymorphic { entries };
                }
            }
            InterfaceCache::Polymorphic { entries } => {
                if let Some(entry) = entries.iter_mut().find(|(cached, _)| *cached == class) {
                    entry.1 = method;
                } else if entries.try_push((class, method)).is_err() {
                    *self = InterfaceCache::Megamorphic;
                }
            }
            InterfaceCache::Megamorphic => {}
        }
    }

    /// Returns true once the site has seen too many receiver classes.
    pub fn is_megamorphic(&self) -> bool {
        matches!(self, InterfaceCache::Megamorphic)
    }
}
