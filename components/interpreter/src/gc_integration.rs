//! Garbage collection integration
//!
//! Collections are stop-the-world. The requesting thread publishes its own
//! roots; every other attached thread is either parked at a safe point or
//! in a blocking region, both of which publish a snapshot of its frames.
//! The engine adds its global roots: the preallocated `OutOfMemoryError`,
//! static fields, class mirrors, resolved string constants, the intern
//! table, global references and objects awaiting finalization.

use crate::error::Exception;
use crate::thread::ThreadContext;
use crate::vm::Vm;
use core_types::{ClassId, ObjectId, Value};
use log::Level;
use memory_manager::GcStats;
use std::collections::HashSet;

impl Vm {
    /// Stops the world and collects. Unreachable objects with a finalizer
    /// survive and are queued for [`Vm::run_finalizers`].
    pub(crate) fn gc_pause(&self, thread: Option<&ThreadContext>) -> GcStats {
        let finalizable: HashSet<ClassId> = self
            .registry
            .classes()
            .iter()
            .filter(|class| class.linkage().is_some_and(|l| l.finalizer.is_some()))
            .map(|class| class.id())
            .collect();
        let (requester, own_roots) = match thread {
            Some(thread) => (Some(thread.id), thread.roots()),
            None => (None, Vec::new()),
        };

        let stats = self.safepoint.stop_the_world(requester, own_roots, |mut roots| {
            roots.extend(self.global_roots());
            self.heap
                .collect(roots, |class| finalizable.contains(&class))
        });

        if !stats.finalizable.is_empty() {
            self.finalize_queue
                .lock()
                .extend(stats.finalizable.iter().copied());
        }
        let level = if self.config.verbose_gc {
            Level::Info
        } else {
            Level::Debug
        };
        log::log!(
            level,
            "[GC {} objects freed, {} bytes freed, {} bytes in use, {} queued for finalization, {:?}]",
            stats.freed,
            stats.bytes_freed,
            stats.bytes_in_use,
            stats.finalizable.len(),
            stats.duration
        );
        stats
    }

    fn global_roots(&self) -> Vec<ObjectId> {
        let mut roots = vec![self.oom];
        for class in self.registry.classes() {
            roots.extend(class.mirror());
            roots.extend(class.pool().resolved_strings());
            roots.extend(
                class
                    .fields()
                    .iter()
                    .filter(|field| field.is_static() && field.is_reference())
                    .filter_map(|field| field.get_static().object()),
            );
        }
        roots.extend(self.strings.lock().values().copied());
        roots.extend(self.global_refs.lock().keys().copied());
        roots.extend(self.finalize_queue.lock().iter().copied());
        roots
    }

    /// Runs a full collection. Pass the calling thread if it is attached so
    /// its frames are treated as roots.
    pub fn collect_garbage(&self, thread: Option<&mut ThreadContext>) -> GcStats {
        match thread {
            Some(thread) => {
                self.enter_java(thread);
                let stats = self.gc_pause(Some(&*thread));
                self.exit_java(thread);
                stats
            }
            None => self.gc_pause(None),
        }
    }

    /// Keeps `object` alive until a matching [`Vm::delete_global_ref`].
    /// References are counted.
    pub fn new_global_ref(&self, object: ObjectId) {
        *self.global_refs.lock().entry(object).or_insert(0) += 1;
    }

    /// Drops one global reference. Returns false if `object` had none.
    pub fn delete_global_ref(&self, object: ObjectId) -> bool {
        let mut refs = self.global_refs.lock();
        match refs.get_mut(&object) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                refs.remove(&object);
                true
            }
            None => false,
        }
    }

    /// Objects waiting for their finalizer.
    pub fn pending_finalizers(&self) -> usize {
        self.finalize_queue.lock().len()
    }

    /// Runs the finalizers of every queued object on `thread`. A throwable
    /// escaping a finalizer is ignored. Returns the number run.
    pub fn run_finalizers(&self, thread: &mut ThreadContext) -> usize {
        let mut count = 0;
        self.enter_java(thread);
        loop {
            let next = self.finalize_queue.lock().first().copied();
            let Some(object) = next else { break };
            thread.handles.push(object);
            self.finalize_queue.lock().retain(|queued| *queued != object);

            let finalizer = self
                .class_of(object)
                .ok()
                .and_then(|class| class.linkage().and_then(|l| l.finalizer.clone()));
            if let Some(finalizer) = finalizer {
                if let Err(exception) = self.call(thread, &finalizer, vec![Value::Reference(object)]) {
                    let throwable = match exception {
                        Exception::Thrown(id) => Some(id),
                        Exception::Pending(_) => None,
                    };
                    log::debug!(
                        "finalizer {} of object {} threw {:?}",
                        finalizer.qualified_name(),
                        object,
                        throwable.map(|id| self.describe_throwable(id).class_name)
                    );
                }
                count += 1;
            }
            thread.handles.pop();
        }
        self.exit_java(thread);
        count
    }
}
