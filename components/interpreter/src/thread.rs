//! Attached threads and safe-point cooperation.
//!
//! A thread that is not executing inside the engine counts as blocked: the
//! collector may run without waiting for it, using the roots it published
//! when it last left the engine.

pub use crate::context::ThreadContext;

use crate::vm::Vm;
use core_types::ThreadId;
use memory_manager::InterruptFlag;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct ThreadRecord {
    pub(crate) name: String,
    pub(crate) interrupt: Arc<InterruptFlag>,
}

/// A native thread attached to a [`Vm`]. Detaches on drop.
#[derive(Debug)]
pub struct JavaThread {
    vm: Arc<Vm>,
    context: ThreadContext,
}

impl JavaThread {
    /// The engine this thread is attached to.
    pub fn vm(&self) -> &Arc<Vm> {
        &self.vm
    }
}

impl Deref for JavaThread {
    type Target = ThreadContext;

    fn deref(&self) -> &ThreadContext {
        &self.context
    }
}

impl DerefMut for JavaThread {
    fn deref_mut(&mut self) -> &mut ThreadContext {
        &mut self.context
    }
}

impl Drop for JavaThread {
    fn drop(&mut self) {
        self.vm.detach(&self.context);
    }
}

impl Vm {
    /// Attaches the calling thread.
    pub fn attach_thread(self: &Arc<Self>, name: &str) -> JavaThread {
        let id = ThreadId(self.next_thread.fetch_add(1, Ordering::Relaxed));
        let interrupt = Arc::new(InterruptFlag::new());
        self.threads.lock().insert(
            id,
            ThreadRecord {
                name: name.to_string(),
                interrupt: Arc::clone(&interrupt),
            },
        );
        self.safepoint.register(id);
        self.safepoint.enter_blocking(id, Vec::new());
        log::debug!("attached thread {} ({})", id, name);
        JavaThread {
            vm: Arc::clone(self),
            context: ThreadContext::new(id, name, self.config.slot_budget(), interrupt),
        }
    }

    fn detach(&self, thread: &ThreadContext) {
        self.safepoint.unregister(thread.id);
        self.threads.lock().remove(&thread.id);
        log::debug!("detached thread {} ({})", thread.id, thread.name());
    }

    /// Sets the interrupt flag of a thread, waking it if it waits on a
    /// monitor. Returns false if no such thread is attached.
    pub fn interrupt(&self, thread: ThreadId) -> bool {
        let flag = self
            .threads
            .lock()
            .get(&thread)
            .map(|record| Arc::clone(&record.interrupt));
        match flag {
            Some(flag) => {
                flag.interrupt();
                true
            }
            None => false,
        }
    }

    /// Number of attached threads.
    pub fn thread_count(&self) -> usize {
        self.threads.lock().len()
    }

    /// Names of the attached threads.
    pub fn thread_names(&self) -> Vec<String> {
        self.threads
            .lock()
            .values()
            .map(|record| record.name.clone())
            .collect()
    }

    /// Parks at a safe point if a collection is pending.
    #[inline]
    pub(crate) fn poll_safepoint(&self, thread: &ThreadContext) {
        if self.safepoint.is_requested() {
            self.safepoint.park(thread.id, thread.roots());
        }
    }

    /// Starts a region in which the thread may block indefinitely.
    pub(crate) fn enter_blocking(&self, thread: &ThreadContext) {
        self.safepoint.enter_blocking(thread.id, thread.roots());
    }

    pub(crate) fn leave_blocking(&self, thread: &ThreadContext) {
        self.safepoint.leave_blocking(thread.id);
    }

    pub(crate) fn enter_java(&self, thread: &mut ThreadContext) {
        if thread.java_depth == 0 {
            self.safepoint.leave_blocking(thread.id);
        }
        thread.java_depth += 1;
    }

    pub(crate) fn exit_java(&self, thread: &mut ThreadContext) {
        thread.java_depth = thread.java_depth.saturating_sub(1);
        if thread.java_depth == 0 {
            self.enter_blocking(thread);
        }
    }
}
