//! Activation records.
//!
//! Every frame owns its locals and operand stack. Arguments are moved off
//! the caller's operand stack into the callee's locals on invocation. A
//! `long` or `double` occupies two slots everywhere: the value followed by
//! [`Value::Top`].

use crate::class::Method;
use core_types::{ObjectId, Value, VmError};
use std::sync::Arc;

/// One active invocation.
#[derive(Debug)]
pub struct CallFrame {
    pub(crate) method: Arc<Method>,
    /// Pc of the instruction being executed
    pub(crate) pc: usize,
    /// Where to continue once the pending invocation returns
    pub(crate) resume_pc: usize,
    pub(crate) locals: Vec<Value>,
    pub(crate) stack: Vec<Value>,
    /// Monitor held by a synchronized method
    pub(crate) lock: Option<ObjectId>,
    size: usize,
}

fn underflow() -> VmError {
    VmError::internal("operand stack underflow")
}

fn mismatch(expected: &str, place: &str, found: Value) -> VmError {
    VmError::internal(format!("expected {} {}, found {:?}", expected, place, found))
}

impl CallFrame {
    /// Creates a frame whose locals start with `args`.
    pub(crate) fn new(method: Arc<Method>, mut args: Vec<Value>, lock: Option<ObjectId>) -> Self {
        let locals = method.max_locals().max(args.len());
        args.resize(locals, Value::Top);
        let size = method.frame_size();
        CallFrame {
            stack: Vec::with_capacity(method.max_stack()),
            method,
            pc: 0,
            resume_pc: 0,
            locals: args,
            lock,
            size,
        }
    }

    /// The executing method.
    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    /// Current pc.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Stack slots charged against the thread's budget.
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Operand stack depth in slots.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Operand stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Local variable slots.
    pub fn locals(&self) -> &[Value] {
        &self.locals
    }

    #[inline]
    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pushes a value, followed by `Top` if it is wide.
    #[inline]
    pub(crate) fn push_value(&mut self, value: Value) {
        self.stack.push(value);
        if value.is_wide() {
            self.stack.push(Value::Top);
        }
    }

    #[inline]
    pub(crate) fn push_int(&mut self, value: i32) {
        self.stack.push(Value::Int(value));
    }

    #[inline]
    pub(crate) fn push_long(&mut self, value: i64) {
        self.push_value(Value::Long(value));
    }

    #[inline]
    pub(crate) fn push_float(&mut self, value: f32) {
        self.stack.push(Value::Float(value));
    }

    #[inline]
    pub(crate) fn push_double(&mut self, value: f64) {
        self.push_value(Value::Double(value));
    }

    #[inline]
    pub(crate) fn push_ref(&mut self, value: Option<ObjectId>) {
        self.stack.push(Value::from_reference(value));
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Result<Value, VmError> {
        self.stack.pop().ok_or_else(underflow)
    }

    /// Pops one logical value: a single slot, or both slots of a wide value.
    pub(crate) fn pop_value(&mut self) -> Result<Value, VmError> {
        match self.pop()? {
            Value::Top => self.pop(),
            value => Ok(value),
        }
    }

    pub(crate) fn pop_int(&mut self) -> Result<i32, VmError> {
        let value = self.pop()?;
        value.as_int().ok_or_else(|| mismatch("int", "on operand stack", value))
    }

    pub(crate) fn pop_long(&mut self) -> Result<i64, VmError> {
        let value = self.pop_value()?;
        value.as_long().ok_or_else(|| mismatch("long", "on operand stack", value))
    }

    pub(crate) fn pop_float(&mut self) -> Result<f32, VmError> {
        let value = self.pop()?;
        value.as_float().ok_or_else(|| mismatch("float", "on operand stack", value))
    }

    pub(crate) fn pop_double(&mut self) -> Result<f64, VmError> {
        let value = self.pop_value()?;
        value.as_double().ok_or_else(|| mismatch("double", "on operand stack", value))
    }

    pub(crate) fn pop_ref(&mut self) -> Result<Option<ObjectId>, VmError> {
        let value = self.pop()?;
        value.as_reference().ok_or_else(|| mismatch("reference", "on operand stack", value))
    }

    /// Slot `depth` positions below the top, 0 being the top.
    pub(crate) fn peek(&self, depth: usize) -> Result<Value, VmError> {
        let len = self.stack.len();
        if depth >= len {
            return Err(underflow());
        }
        Ok(self.stack[len - 1 - depth])
    }

    /// Receiver of an invocation taking `args` slots, receiver included.
    pub(crate) fn receiver(&self, args: usize) -> Result<Option<ObjectId>, VmError> {
        let value = self.peek(args.checked_sub(1).ok_or_else(underflow)?)?;
        value.as_reference().ok_or_else(|| mismatch("reference", "on operand stack", value))
    }

    /// Removes the top `count` slots.
    pub(crate) fn take(&mut self, count: usize) -> Result<Vec<Value>, VmError> {
        let len = self.stack.len();
        if count > len {
            return Err(underflow());
        }
        Ok(self.stack.split_off(len - count))
    }

    /// Duplicates the top `count` slots, inserting the copies below the
    /// `depth` slots beneath them.
    pub(crate) fn dup_x(&mut self, count: usize, depth: usize) -> Result<(), VmError> {
        let len = self.stack.len();
        if count + depth > len {
            return Err(underflow());
        }
        let copies: arrayvec::ArrayVec<Value, 2> =
            self.stack[len - count..].iter().copied().take(2).collect();
        let at = len - count - depth;
        self.stack.splice(at..at, copies);
        Ok(())
    }

    pub(crate) fn local(&self, index: usize) -> Result<Value, VmError> {
        self.locals
            .get(index)
            .copied()
            .ok_or_else(|| VmError::internal(format!("local {} out of range", index)))
    }

    /// Reads an `int` local.
    pub(crate) fn local_int(&self, index: usize) -> Result<i32, VmError> {
        let value = self.local(index)?;
        value
            .as_int()
            .ok_or_else(|| mismatch("int", &format!("in local {}", index), value))
    }

    /// Stores a local; a wide value also claims the next slot.
    pub(crate) fn set_local(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        let needed = index + value.slot_count();
        if needed > self.locals.len() {
            return Err(VmError::internal(format!("local {} out of range", index)));
        }
        self.locals[index] = value;
        if value.is_wide() {
            self.locals[index + 1] = Value::Top;
        }
        Ok(())
    }

    /// Every object referenced from this frame.
    pub(crate) fn references(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.locals
            .iter()
            .chain(self.stack.iter())
            .filter_map(Value::object)
            .chain(self.lock)
    }
}
