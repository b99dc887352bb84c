//! Stop-the-world coordination between mutator threads and the collector.
//!
//! Every mutator thread registers itself. A collection raises the request
//! flag and waits until each registered thread other than the requester has
//! published its root snapshot, either by parking at a safe point or by
//! being inside a blocking region (monitor enter, wait, class-init wait).
//! While a thread is parked or blocked its heap references cannot change,
//! so the snapshot stays valid for the whole pause.

use core_types::{ObjectId, ThreadId};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct SafePointState {
    registered: HashSet<ThreadId>,
    parked: HashMap<ThreadId, Vec<ObjectId>>,
    stopping: bool,
}

/// Safe-point coordinator.
#[derive(Debug, Default)]
pub struct SafePoint {
    requested: AtomicBool,
    state: Mutex<SafePointState>,
    changed: Condvar,
}

impl SafePoint {
    /// Creates a coordinator with no registered threads.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mutator thread. Waits out a pause already in progress.
    pub fn register(&self, thread: ThreadId) {
        let mut state = self.state.lock();
        while state.stopping {
            self.changed.wait(&mut state);
        }
        state.registered.insert(thread);
    }

    /// Removes a mutator thread.
    pub fn unregister(&self, thread: ThreadId) {
        let mut state = self.state.lock();
        state.registered.remove(&thread);
        state.parked.remove(&thread);
        self.changed.notify_all();
    }

    /// Number of registered threads.
    pub fn registered(&self) -> usize {
        self.state.lock().registered.len()
    }

    /// Returns true while `thread` is parked or inside a blocking region.
    pub fn is_parked(&self, thread: ThreadId) -> bool {
        self.state.lock().parked.contains_key(&thread)
    }

    /// Fast-path poll: true when a pause has been requested.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Parks the calling thread until the current pause ends, publishing
    /// `roots` for the collector. Returns immediately if no pause is active.
    pub fn park(&self, thread: ThreadId, roots: Vec<ObjectId>) {
        let mut state = self.state.lock();
        if !state.stopping {
            return;
        }
        state.parked.insert(thread, roots);
        self.changed.notify_all();
        while state.stopping {
            self.changed.wait(&mut state);
        }
        state.parked.remove(&thread);
    }

    /// Marks the thread as blocked: a pause may proceed without it, using
    /// `roots` as its root set.
    pub fn enter_blocking(&self, thread: ThreadId, roots: Vec<ObjectId>) {
        let mut state = self.state.lock();
        state.parked.insert(thread, roots);
        self.changed.notify_all();
    }

    /// Leaves a blocking region, waiting out any pause in progress.
    pub fn leave_blocking(&self, thread: ThreadId) {
        let mut state = self.state.lock();
        while state.stopping {
            self.changed.wait(&mut state);
        }
        state.parked.remove(&thread);
    }

    /// Stops every registered thread except `requester`, then runs `f` with
    /// the union of `own_roots` and every published snapshot.
    ///
    /// A requester that finds another pause already running parks with
    /// `own_roots` until it ends, then starts its own.
    pub fn stop_the_world<R>(
        &self,
        requester: Option<ThreadId>,
        own_roots: Vec<ObjectId>,
        f: impl FnOnce(Vec<ObjectId>) -> R,
    ) -> R {
        let mut state = self.state.lock();
        while state.stopping {
            if let Some(thread) = requester {
                state.parked.insert(thread, own_roots.clone());
                self.changed.notify_all();
            }
            self.changed.wait(&mut state);
        }
        if let Some(thread) = requester {
            state.parked.remove(&thread);
        }

        state.stopping = true;
        self.requested.store(true, Ordering::Release);
        while !Self::all_parked(&state, requester) {
            self.changed.wait(&mut state);
        }

        let mut roots = own_roots;
        for snapshot in state.parked.values() {
            roots.extend_from_slice(snapshot);
        }
        log::trace!(
            "safepoint reached: {} thread(s) stopped",
            state.parked.len()
        );

        let result = MutexGuard::unlocked(&mut state, || f(roots));

        state.stopping = false;
        self.requested.store(false, Ordering::Release);
        self.changed.notify_all();
        result
    }

    fn all_parked(state: &SafePointState, requester: Option<ThreadId>) -> bool {
        state
            .registered
            .iter()
            .all(|t| Some(*t) == requester || state.parked.contains_key(t))
    }
}
