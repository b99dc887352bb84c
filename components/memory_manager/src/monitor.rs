//! Reentrant object monitors with wait/notify.
//!
//! Waits are interruptible. Interrupt delivery always takes the waited-on
//! monitor's internal lock before notifying, so an interrupt set while a
//! thread is between its flag check and its condition wait is never lost.

use core_types::ThreadId;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Misuse of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// The calling thread does not own the monitor
    #[error("current thread is not owner")]
    NotOwner,
    /// The wait was interrupted; the interrupt flag has been cleared
    #[error("wait interrupted")]
    Interrupted,
}

#[derive(Debug, Default)]
struct MonitorState {
    owner: Option<ThreadId>,
    count: u32,
    waiting: usize,
    notified: usize,
}

/// A reentrant lock with an associated wait set.
#[derive(Debug, Default)]
pub struct Monitor {
    state: Mutex<MonitorState>,
    entry: Condvar,
    wait_set: Condvar,
}

impl Monitor {
    /// Creates an unowned monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the monitor if it is free or already held by `thread`.
    pub fn try_enter(&self, thread: ThreadId) -> bool {
        let mut state = self.state.lock();
        Self::acquire(&mut state, thread)
    }

    fn acquire(state: &mut MonitorState, thread: ThreadId) -> bool {
        match state.owner {
            None => {
                state.owner = Some(thread);
                state.count = 1;
                true
            }
            Some(owner) if owner == thread => {
                state.count += 1;
                true
            }
            Some(_) => false,
        }
    }

    /// Acquires the monitor, blocking while another thread owns it.
    pub fn enter(&self, thread: ThreadId) {
        let mut state = self.state.lock();
        while !Self::acquire(&mut state, thread) {
            self.entry.wait(&mut state);
        }
    }

    /// Releases one level of ownership.
    pub fn exit(&self, thread: ThreadId) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        if state.owner != Some(thread) {
            return Err(MonitorError::NotOwner);
        }
        state.count -= 1;
        if state.count == 0 {
            state.owner = None;
            self.entry.notify_one();
        }
        Ok(())
    }

    /// Current owner, if any.
    pub fn owner(&self) -> Option<ThreadId> {
        self.state.lock().owner
    }

    /// Recursion depth held by `thread`, 0 if it does not own the monitor.
    pub fn hold_count(&self, thread: ThreadId) -> u32 {
        let state = self.state.lock();
        if state.owner == Some(thread) {
            state.count
        } else {
            0
        }
    }

    /// Releases the monitor completely, waits for a notification, an
    /// interrupt or the timeout, then reacquires it at the same depth.
    pub fn wait(
        self: &Arc<Self>,
        thread: ThreadId,
        interrupt: &InterruptFlag,
        timeout: Option<Duration>,
    ) -> Result<(), MonitorError> {
        interrupt.block_on(Arc::clone(self));
        let result = self.wait_inner(thread, interrupt, timeout);
        interrupt.unblock();
        result
    }

    fn wait_inner(
        &self,
        thread: ThreadId,
        interrupt: &InterruptFlag,
        timeout: Option<Duration>,
    ) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        if state.owner != Some(thread) {
            return Err(MonitorError::NotOwner);
        }
        if interrupt.take() {
            return Err(MonitorError::Interrupted);
        }

        let depth = state.count;
        state.owner = None;
        state.count = 0;
        state.waiting += 1;
        self.entry.notify_one();

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut interrupted = false;
        loop {
            if state.notified > 0 {
                state.notified -= 1;
                break;
            }
            if interrupt.take() {
                interrupted = true;
                break;
            }
            match deadline {
                Some(deadline) => {
                    if self.wait_set.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => self.wait_set.wait(&mut state),
            }
        }
        state.waiting -= 1;
        state.notified = state.notified.min(state.waiting);

        while !Self::acquire(&mut state, thread) {
            self.entry.wait(&mut state);
        }
        state.count = depth;

        if interrupted {
            Err(MonitorError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Wakes one waiting thread.
    pub fn notify(&self, thread: ThreadId) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        if state.owner != Some(thread) {
            return Err(MonitorError::NotOwner);
        }
        if state.notified < state.waiting {
            state.notified += 1;
            self.wait_set.notify_all();
        }
        Ok(())
    }

    /// Wakes every waiting thread.
    pub fn notify_all(&self, thread: ThreadId) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        if state.owner != Some(thread) {
            return Err(MonitorError::NotOwner);
        }
        state.notified = state.waiting;
        self.wait_set.notify_all();
        Ok(())
    }

    fn wake_for_interrupt(&self) {
        let _state = self.state.lock();
        self.wait_set.notify_all();
    }
}

/// A thread's interrupt status and the monitor it is currently waiting on.
#[derive(Debug, Default)]
pub struct InterruptFlag {
    interrupted: AtomicBool,
    blocked_on: Mutex<Option<Arc<Monitor>>>,
}

impl InterruptFlag {
    /// Creates a cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes the thread if it is waiting on a monitor.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        let monitor = self.blocked_on.lock().clone();
        if let Some(monitor) = monitor {
            monitor.wake_for_interrupt();
        }
    }

    /// Returns the flag without clearing it.
    pub fn is_set(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Returns and clears the flag.
    pub fn take(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    fn block_on(&self, monitor: Arc<Monitor>) {
        *self.blocked_on.lock() = Some(monitor);
    }

    fn unblock(&self) {
        *self.blocked_on.lock() = None;
    }
}
