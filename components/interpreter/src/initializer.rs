//! Class initialization state machine.

use crate::class::{Class, InitState};
use crate::error::{ExecResult, Exception};
use crate::linker::link;
use crate::thread::ThreadContext;
use crate::vm::Vm;
use core_types::{ErrorKind, VmError};
use std::sync::Arc;

const CLINIT: &str = "<clinit>";

impl Vm {
    /// Runs the static initializers of `class` and its superclasses exactly
    /// once.
    ///
    /// The initializing thread may re-enter freely. Other threads block until
    /// the class leaves `Initializing`. A class whose initializer failed is
    /// permanently unusable.
    pub(crate) fn initialize(&self, thread: &mut ThreadContext, class: &Arc<Class>) -> ExecResult<()> {
        if class.is_initialized() {
            return Ok(());
        }
        link(class)?;

        let mut state = class.init.lock();
        loop {
            match *state {
                InitState::Initialized => return Ok(()),
                InitState::Bad => {
                    return Err(VmError::with_message(
                        ErrorKind::NoClassDefFoundError,
                        format!("Could not initialize class {}", class.name().replace('/', ".")),
                    )
                    .into())
                }
                InitState::Initializing(owner) if owner == thread.id => return Ok(()),
                InitState::Initializing(_) => {
                    self.enter_blocking(thread);
                    class.init_changed.wait(&mut state);
                    drop(state);
                    self.leave_blocking(thread);
                    state = class.init.lock();
                }
                InitState::Uninitialized => {
                    *state = InitState::Initializing(thread.id);
                    break;
                }
            }
        }
        drop(state);

        log::debug!("initializing {} on thread {}", class.name(), thread.id);
        let outcome = self
            .run_initializers(thread, class)
            .map_err(|exception| self.wrap_initializer_error(thread, exception));

        let mut state = class.init.lock();
        match &outcome {
            Ok(()) => {
                *state = InitState::Initialized;
                class.set_initialized();
                log::debug!("initialized {}", class.name());
            }
            Err(_) => {
                *state = InitState::Bad;
                log::debug!("initialization of {} failed", class.name());
            }
        }
        class.init_changed.notify_all();
        outcome
    }

    fn run_initializers(&self, thread: &mut ThreadContext, class: &Arc<Class>) -> ExecResult<()> {
        if !class.is_interface() {
            if let Some(super_class) = class.super_class() {
                self.initialize(thread, super_class)?;
            }
        }
        if let Some(clinit) = class.find_declared_method(CLINIT, "()V") {
            self.call(thread, &clinit, Vec::new())?;
        }
        Ok(())
    }

    /// Wraps anything that is not an `Error` in an
    /// `ExceptionInInitializerError`.
    fn wrap_initializer_error(&self, thread: &mut ThreadContext, exception: Exception) -> Exception {
        let cause = match exception {
            Exception::Pending(error) if error.kind.is_error() => return Exception::Pending(error),
            Exception::Pending(error) => self.materialize(thread, Exception::Pending(error)),
            Exception::Thrown(id) if self.is_error_object(id) => return Exception::Thrown(id),
            Exception::Thrown(id) => id,
        };
        thread.handles.push(cause);
        let wrapped = self.materialize(
            thread,
            VmError::new(ErrorKind::ExceptionInInitializerError)
                .caused_by(cause)
                .into(),
        );
        thread.handles.pop();
        Exception::Thrown(wrapped)
    }
}
