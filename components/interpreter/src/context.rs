//! Per-thread execution state.

use crate::call_frame::CallFrame;
use core_types::{ObjectId, StackFrame, ThreadId, VmError};
use memory_manager::InterruptFlag;
use std::sync::Arc;

/// Frame stack and bookkeeping of one attached thread.
#[derive(Debug)]
pub struct ThreadContext {
    pub(crate) id: ThreadId,
    name: String,
    pub(crate) frames: Vec<CallFrame>,
    slots_used: usize,
    slot_budget: usize,
    pub(crate) interrupt: Arc<InterruptFlag>,
    /// Objects held by the engine on behalf of this thread outside any frame
    pub(crate) handles: Vec<ObjectId>,
    /// Nesting of engine entry points; zero while the thread runs its own code
    pub(crate) java_depth: usize,
}

impl ThreadContext {
    pub(crate) fn new(
        id: ThreadId,
        name: &str,
        slot_budget: usize,
        interrupt: Arc<InterruptFlag>,
    ) -> Self {
        ThreadContext {
            id,
            name: name.to_string(),
            frames: Vec::new(),
            slots_used: 0,
            slot_budget,
            interrupt,
            handles: Vec::new(),
            java_depth: 0,
        }
    }

    /// Thread handle.
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Active frames, outermost first.
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Stack slots in use.
    pub fn slots_used(&self) -> usize {
        self.slots_used
    }

    /// Stack slots available to this thread.
    pub fn slot_budget(&self) -> usize {
        self.slot_budget
    }

    /// Returns true if a frame of `size` slots still fits.
    pub(crate) fn fits(&self, size: usize) -> bool {
        self.slots_used + size <= self.slot_budget
    }

    /// Returns true while the interrupt flag is set.
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_set()
    }

    pub(crate) fn push_frame(&mut self, frame: CallFrame) {
        self.slots_used += frame.size();
        self.frames.push(frame);
    }

    pub(crate) fn pop_frame(&mut self) -> Option<CallFrame> {
        let frame = self.frames.pop()?;
        self.slots_used -= frame.size();
        Some(frame)
    }

    /// The innermost frame.
    pub(crate) fn frame(&mut self) -> Result<&mut CallFrame, VmError> {
        self.frames
            .last_mut()
            .ok_or_else(|| VmError::internal("no active frame"))
    }

    /// Root set of the thread: every frame slot holding a reference plus
    /// the engine handles.
    pub fn roots(&self) -> Vec<ObjectId> {
        self.frames
            .iter()
            .flat_map(|frame| frame.references())
            .chain(self.handles.iter().copied())
            .collect()
    }

    /// Backtrace of the active frames, innermost first.
    pub fn stack_trace(&self) -> Vec<StackFrame> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let method = frame.method();
                let class = method.class();
                StackFrame {
                    class_name: class
                        .as_ref()
                        .map_or_else(String::new, |c| c.name().to_string()),
                    method_name: method.name().to_string(),
                    source_file: class
                        .as_ref()
                        .and_then(|c| c.source_file().map(str::to_string)),
                    line: method.line_number(frame.pc()),
                    is_native: method.is_native(),
                }
            })
            .collect()
    }
}
