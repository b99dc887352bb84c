//! Handle-based object heap.
//!
//! Objects live behind stable [`ObjectId`] handles. Freed handles are
//! recycled. The heap only reclaims memory inside [`Heap::collect`], which
//! the engine calls with every mutator stopped.

use crate::array::{ArrayKind, ArrayStorage};
use crate::gc::{GcPhase, GcStats, MarkStack};
use crate::object::{instance_size, Object, HEADER_SIZE};
use core_types::{ClassId, ObjectId, Value};
use crossbeam::atomic::AtomicCell;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Allocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
    /// The request does not fit under the heap limit
    #[error("out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory {
        /// Bytes requested
        requested: usize,
        /// Bytes left under the limit
        available: usize,
    },
}

#[derive(Default)]
struct Slots {
    objects: Vec<Option<Arc<Object>>>,
    free: Vec<u32>,
}

/// The object heap.
pub struct Heap {
    slots: RwLock<Slots>,
    used: AtomicUsize,
    min_heap: usize,
    max_heap: usize,
    phase: AtomicCell<GcPhase>,
    collections: AtomicUsize,
}

impl Heap {
    /// Creates a heap that grows up to `max_heap` bytes. `min_heap` is the
    /// occupancy below which [`Heap::should_collect`] never asks for a cycle.
    pub fn new(min_heap: usize, max_heap: usize) -> Self {
        Heap {
            slots: RwLock::new(Slots::default()),
            used: AtomicUsize::new(0),
            min_heap: min_heap.min(max_heap),
            max_heap,
            phase: AtomicCell::new(GcPhase::Idle),
            collections: AtomicUsize::new(0),
        }
    }

    /// Allocates an instance whose fields start as `template`.
    pub fn allocate(&self, class: ClassId, template: &[Value]) -> Result<ObjectId, HeapError> {
        self.reserve(instance_size(template.len()))?;
        Ok(self.insert(Object::instance(class, template)))
    }

    /// Allocates a zeroed array of `length` elements.
    pub fn allocate_array(
        &self,
        class: ClassId,
        kind: ArrayKind,
        length: usize,
    ) -> Result<ObjectId, HeapError> {
        let bytes = length
            .checked_mul(kind.element_size())
            .and_then(|b| b.checked_add(HEADER_SIZE))
            .unwrap_or(usize::MAX);
        self.reserve(bytes)?;
        Ok(self.insert(Object::array(class, ArrayStorage::new(kind, length))))
    }

    fn reserve(&self, bytes: usize) -> Result<(), HeapError> {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let available = self.max_heap.saturating_sub(current);
            if bytes > available {
                return Err(HeapError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
            match self.used.compare_exchange_weak(
                current,
                current + bytes,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    fn insert(&self, object: Object) -> ObjectId {
        let object = Some(Arc::new(object));
        let mut slots = self.slots.write();
        match slots.free.pop() {
            Some(index) => {
                slots.objects[index as usize] = object;
                ObjectId(index)
            }
            None => {
                slots.objects.push(object);
                ObjectId((slots.objects.len() - 1) as u32)
            }
        }
    }

    /// Looks up a live object.
    pub fn get(&self, id: ObjectId) -> Option<Arc<Object>> {
        self.slots.read().objects.get(id.index())?.clone()
    }

    /// Bytes currently allocated.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    /// The heap limit.
    pub fn max_heap(&self) -> usize {
        self.max_heap
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        let slots = self.slots.read();
        slots.objects.len() - slots.free.len()
    }

    /// Current collector phase.
    pub fn phase(&self) -> GcPhase {
        self.phase.load()
    }

    /// Number of completed collections.
    pub fn collections(&self) -> usize {
        self.collections.load(Ordering::Relaxed)
    }

    /// True once occupancy passes both `min_heap` and three quarters of the
    /// limit.
    pub fn should_collect(&self) -> bool {
        let used = self.used();
        used > self.min_heap && used > self.max_heap / 4 * 3
    }

    /// Marks everything reachable from `roots` and frees the rest.
    ///
    /// An unreachable object whose class `has_finalizer` and that has not
    /// been finalized yet survives this cycle, together with everything it
    /// references, and is reported in [`GcStats::finalizable`].
    pub fn collect(
        &self,
        roots: impl IntoIterator<Item = ObjectId>,
        has_finalizer: impl Fn(ClassId) -> bool,
    ) -> GcStats {
        let started = Instant::now();
        let mut slots = self.slots.write();
        let mut marked = vec![false; slots.objects.len()];
        let stack = MarkStack::new();

        self.phase.store(GcPhase::Marking);
        for root in roots {
            stack.push_root(root);
        }
        let mut count = trace(&slots, &mut marked, &stack);

        let mut finalizable = Vec::new();
        for (index, slot) in slots.objects.iter().enumerate() {
            if let Some(object) = slot {
                if !marked[index] && !object.is_finalized() && has_finalizer(object.class()) {
                    object.mark_finalized();
                    finalizable.push(ObjectId(index as u32));
                    stack.push_root(ObjectId(index as u32));
                }
            }
        }
        count += trace(&slots, &mut marked, &stack);

        self.phase.store(GcPhase::Sweeping);
        let mut freed = 0;
        let mut bytes_freed = 0;
        for index in 0..slots.objects.len() {
            if marked[index] {
                continue;
            }
            if let Some(object) = slots.objects[index].take() {
                bytes_freed += object.size();
                freed += 1;
                slots.free.push(index as u32);
            }
        }
        drop(slots);
        self.used.fetch_sub(bytes_freed, Ordering::AcqRel);
        self.collections.fetch_add(1, Ordering::Relaxed);
        self.phase.store(GcPhase::Idle);

        GcStats {
            marked: count,
            freed,
            bytes_freed,
            bytes_in_use: self.used(),
            finalizable,
            duration: started.elapsed(),
        }
    }
}

fn trace(slots: &Slots, marked: &mut [bool], stack: &MarkStack) -> usize {
    let mut count = 0;
    while let Some(id) = stack.pop() {
        let Some(Some(object)) = slots.objects.get(id.index()) else {
            continue;
        };
        if marked[id.index()] {
            continue;
        }
        marked[id.index()] = true;
        count += 1;
        for child in object.references() {
            stack.push(child);
        }
    }
    count
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("used", &self.used())
            .field("max_heap", &self.max_heap)
            .field("objects", &self.object_count())
            .finish()
    }
}
