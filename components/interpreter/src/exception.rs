//! Throwable objects and backtraces.

use crate::error::{ExecResult, Exception, UncaughtException};
use crate::linker::link;
use crate::thread::ThreadContext;
use crate::vm::Vm;
use core_types::{LoaderId, ObjectId, StackFrame, Value, VmError};
use std::sync::Arc;

/// Backtrace attached to a throwable when it is created or first thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backtrace(pub Vec<StackFrame>);

impl Vm {
    /// Turns a pending engine error into a heap throwable.
    ///
    /// Falls back to the preallocated `OutOfMemoryError` when the throwable
    /// itself cannot be created.
    pub(crate) fn materialize(&self, thread: &mut ThreadContext, exception: Exception) -> ObjectId {
        match exception {
            Exception::Thrown(id) => id,
            Exception::Pending(error) => match self.create_throwable(thread, &error) {
                Ok(id) => id,
                Err(failure) => {
                    log::debug!("cannot create {}: {:?}", error, failure);
                    self.oom
                }
            },
        }
    }

    fn create_throwable(&self, thread: &mut ThreadContext, error: &VmError) -> ExecResult<ObjectId> {
        let class = self.registry.load(error.kind.class_name(), LoaderId::BOOTSTRAP)?;
        link(&class)?;
        let id = self.allocate_instance(thread, &class)?;
        thread.handles.push(id);
        let message = match &error.message {
            Some(text) => self.create_string(thread, text).map(Some),
            None => Ok(None),
        };
        thread.handles.pop();

        let object = self.deref(id)?;
        if let Some(message) = message? {
            object.set_field(self.well_known.message_offset, Value::Reference(message));
        }
        if let Some(cause) = error.cause {
            object.set_field(self.well_known.cause_offset, Value::Reference(cause));
        }
        object.attach(Arc::new(Backtrace(thread.stack_trace())));
        Ok(id)
    }

    /// Records the current backtrace on a throwable that has none yet.
    pub(crate) fn fill_in_stack_trace(&self, thread: &ThreadContext, throwable: ObjectId) {
        if let Some(object) = self.heap.get(throwable) {
            if object.attachment::<Backtrace>().is_none() {
                object.attach(Arc::new(Backtrace(thread.stack_trace())));
            }
        }
    }

    /// Returns true if `throwable` is an instance of `java/lang/Error`.
    pub(crate) fn is_error_object(&self, throwable: ObjectId) -> bool {
        self.class_of(throwable)
            .map(|class| class.is_subclass_of(&self.well_known.error))
            .unwrap_or(false)
    }

    /// Detail message of a throwable.
    pub fn throwable_message(&self, throwable: ObjectId) -> Option<String> {
        let object = self.heap.get(throwable)?;
        let message = object.field(self.well_known.message_offset)?.object()?;
        self.string_value(message)
    }

    /// Cause of a throwable.
    pub fn throwable_cause(&self, throwable: ObjectId) -> Option<ObjectId> {
        self.heap
            .get(throwable)?
            .field(self.well_known.cause_offset)?
            .object()
    }

    /// Summarizes a throwable for reporting outside the engine.
    pub fn describe_throwable(&self, throwable: ObjectId) -> UncaughtException {
        let object = self.heap.get(throwable);
        UncaughtException {
            throwable,
            class_name: self
                .class_of(throwable)
                .map(|class| class.name().to_string())
                .unwrap_or_default(),
            message: self.throwable_message(throwable),
            stack_trace: object
                .as_ref()
                .and_then(|o| o.attachment::<Backtrace>())
                .map(|trace| trace.0.clone())
                .unwrap_or_default(),
        }
    }
}
