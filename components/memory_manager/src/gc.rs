//! Mark-sweep collection support: the gray-object work list, the collector
//! phase and per-cycle statistics.

use core_types::ObjectId;
use crossbeam_deque::{Injector, Steal, Worker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// State of the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GcPhase {
    /// No collection in progress
    #[default]
    Idle,
    /// Tracing from the roots
    Marking,
    /// Reclaiming unmarked objects
    Sweeping,
}

/// Work list of objects whose references have not been traced yet.
///
/// Roots are injected through the shared injector; the marking thread
/// drains its local deque first, then steals.
pub struct MarkStack {
    local: Worker<ObjectId>,
    injector: Injector<ObjectId>,
    size: AtomicUsize,
}

impl MarkStack {
    /// Creates an empty mark stack.
    pub fn new() -> Self {
        MarkStack {
            local: Worker::new_lifo(),
            injector: Injector::new(),
            size: AtomicUsize::new(0),
        }
    }

    /// Pushes an object discovered while tracing.
    pub fn push(&self, object: ObjectId) {
        self.local.push(object);
        self.size.fetch_add(1, Ordering::Relaxed);
    }

    /// Pushes a root.
    pub fn push_root(&self, object: ObjectId) {
        self.injector.push(object);
        self.size.fetch_add(1, Ordering::Relaxed);
    }

    /// Pops the next object to trace.
    pub fn pop(&self) -> Option<ObjectId> {
        if let Some(object) = self.local.pop() {
            self.size.fetch_sub(1, Ordering::Relaxed);
            return Some(object);
        }
        loop {
            match self.injector.steal() {
                Steal::Success(object) => {
                    self.size.fetch_sub(1, Ordering::Relaxed);
                    return Some(object);
                }
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    /// Returns true if no work is left.
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.injector.is_empty()
    }

    /// Approximate number of pending objects.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }
}

impl Default for MarkStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GcStats {
    /// Objects found reachable from the roots
    pub marked: usize,
    /// Objects reclaimed
    pub freed: usize,
    /// Bytes reclaimed
    pub bytes_freed: usize,
    /// Bytes in use after the collection
    pub bytes_in_use: usize,
    /// Unreachable objects kept alive because their finalizer must run
    pub finalizable: Vec<ObjectId>,
    /// Wall time of the collection
    pub duration: Duration,
}
