//! Native method bridge.
//!
//! A native method is bound on its first invocation by asking every
//! registered [`NativeResolver`] for its JNI symbol: first the short form
//! `Java_<class>_<method>`, then the long form with the mangled argument
//! descriptor appended after `__`.

use crate::call_frame::CallFrame;
use crate::class::{Class, Method};
use crate::error::ExecResult;
use crate::thread::ThreadContext;
use crate::vm::Vm;
use core_types::{ErrorKind, ObjectId, Value, VmError};
use memory_manager::MonitorError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Implementation of a native method. Receives the argument slots, receiver
/// first for instance methods, with wide values followed by `Top`.
pub type NativeFn =
    Arc<dyn Fn(&mut NativeContext<'_>, &[Value]) -> ExecResult<Option<Value>> + Send + Sync>;

/// What a native method can reach while it runs.
pub struct NativeContext<'a> {
    /// The engine
    pub vm: &'a Vm,
    /// The calling thread
    pub thread: &'a mut ThreadContext,
    /// Declaring class of the method
    pub class: &'a Arc<Class>,
    /// The method being executed
    pub method: &'a Arc<Method>,
}

impl NativeContext<'_> {
    /// Allocates a string.
    pub fn new_string(&mut self, text: &str) -> ExecResult<ObjectId> {
        self.vm.create_string(self.thread, text)
    }

    /// Contents of a string object.
    pub fn string_value(&self, string: ObjectId) -> Option<String> {
        self.vm.string_value(string)
    }

    /// Calls back into bytecode.
    pub fn call(&mut self, method: &Arc<Method>, args: Vec<Value>) -> ExecResult<Option<Value>> {
        self.vm.call(self.thread, method, args)
    }
}

impl fmt::Debug for NativeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeContext")
            .field("thread", &self.thread.id())
            .field("method", &self.method.qualified_name())
            .finish()
    }
}

/// Looks up native implementations by symbol.
pub trait NativeResolver: Send + Sync {
    /// Implementation registered under `symbol`, if any.
    fn resolve(&self, symbol: &str) -> Option<NativeFn>;
}

/// A table of native implementations keyed by JNI symbol.
///
/// # Examples
///
/// ```
/// use core_types::Value;
/// use interpreter::{NativeLibrary, NativeResolver};
///
/// let library = NativeLibrary::new();
/// library.register_method("demo/Math", "twice", None, |_, args| {
///     Ok(Some(Value::Int(args[0].as_int().unwrap_or(0) * 2)))
/// });
/// assert!(library.resolve("Java_demo_Math_twice").is_some());
/// ```
#[derive(Default)]
pub struct NativeLibrary {
    functions: RwLock<HashMap<String, NativeFn>>,
}

impl NativeLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `function` under a raw symbol name.
    pub fn register<F>(&self, symbol: impl Into<String>, function: F)
    where
        F: Fn(&mut NativeContext<'_>, &[Value]) -> ExecResult<Option<Value>> + Send + Sync + 'static,
    {
        self.functions.write().insert(symbol.into(), Arc::new(function));
    }

    /// Registers `function` for a method. Without a descriptor the short
    /// symbol is used and every overload shares the implementation.
    pub fn register_method<F>(&self, class: &str, method: &str, descriptor: Option<&str>, function: F)
    where
        F: Fn(&mut NativeContext<'_>, &[Value]) -> ExecResult<Option<Value>> + Send + Sync + 'static,
    {
        let symbol = match descriptor {
            Some(descriptor) => long_name(class, method, descriptor),
            None => short_name(class, method),
        };
        self.register(symbol, function);
    }

    /// Number of registered symbols.
    pub fn len(&self) -> usize {
        self.functions.read().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.functions.read().is_empty()
    }
}

impl NativeResolver for NativeLibrary {
    fn resolve(&self, symbol: &str) -> Option<NativeFn> {
        self.functions.read().get(symbol).cloned()
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("symbols", &self.len())
            .finish()
    }
}

/// Escapes a name for use in a JNI symbol.
pub fn mangle(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '/' => out.push('_'),
            '_' => out.push_str("_1"),
            ';' => out.push_str("_2"),
            '[' => out.push_str("_3"),
            c if c.is_ascii_alphanumeric() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("_0{:04x}", unit));
                }
            }
        }
    }
    out
}

/// `Java_<class>_<method>`
pub fn short_name(class: &str, method: &str) -> String {
    format!("Java_{}_{}", mangle(class), mangle(method))
}

/// `Java_<class>_<method>__<args>`
pub fn long_name(class: &str, method: &str, descriptor: &str) -> String {
    let args = descriptor
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
        .unwrap_or("");
    format!("{}__{}", short_name(class, method), mangle(args))
}

impl Vm {
    fn bind(&self, method: &Arc<Method>, class: &Class) -> ExecResult<NativeFn> {
        if let Some(function) = method.native.get() {
            return Ok(Arc::clone(function));
        }
        let short = short_name(class.name(), method.name());
        let long = long_name(class.name(), method.name(), method.descriptor());
        let resolvers = self.natives.read().clone();
        let found = resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(&short).or_else(|| resolver.resolve(&long)));
        match found {
            Some(function) => {
                log::debug!("bound native {}{}", method.qualified_name(), method.descriptor());
                Ok(Arc::clone(method.native.get_or_init(|| function)))
            }
            None => Err(VmError::with_message(
                ErrorKind::UnsatisfiedLinkError,
                format!("{}{}", method.qualified_name().replace('/', "."), method.descriptor()),
            )
            .into()),
        }
    }

    /// Invokes a native method with its argument slots.
    pub(crate) fn call_native(
        &self,
        thread: &mut ThreadContext,
        method: &Arc<Method>,
        args: Vec<Value>,
    ) -> ExecResult<Option<Value>> {
        let class = method
            .class()
            .ok_or_else(|| VmError::internal("native method without class"))?;
        let function = self.bind(method, &class)?;
        let lock = if method.is_synchronized() {
            Some(self.method_lock(thread, method, &class, &args)?)
        } else {
            None
        };

        thread.push_frame(CallFrame::new(Arc::clone(method), args.clone(), lock));
        let result = match lock {
            Some(object) => self.monitor_enter(thread, object),
            None => Ok(()),
        }
        .and_then(|()| {
            let mut context = NativeContext {
                vm: self,
                thread: &mut *thread,
                class: &class,
                method,
            };
            function(&mut context, &args)
        });
        let released = match thread.pop_frame() {
            Some(frame) => self.release_frame(thread, &frame),
            None => Ok(()),
        };
        match (result, released) {
            (Ok(_), Err(error)) => Err(error.into()),
            (result, _) => result,
        }
    }

    pub(crate) fn register_builtin_natives(library: &NativeLibrary) {
        const OBJECT: &str = "java/lang/Object";

        library.register_method(OBJECT, "hashCode", None, |_, args| {
            let this = receiver(args)?;
            Ok(Some(Value::Int(this.0 as i32)))
        });
        library.register_method(OBJECT, "getClass", None, |ctx, args| {
            let this = receiver(args)?;
            let class = ctx.vm.class_of(this)?;
            let mirror = ctx.vm.mirror(ctx.thread, &class)?;
            Ok(Some(Value::Reference(mirror)))
        });
        library.register_method(OBJECT, "wait", None, |ctx, args| {
            let this = receiver(args)?;
            let timeout = match args.get(1).and_then(Value::as_long) {
                None | Some(0) => None,
                Some(millis) if millis < 0 => {
                    return Err(VmError::with_message(
                        ErrorKind::IllegalArgumentException,
                        "timeout value is negative",
                    )
                    .into())
                }
                Some(millis) => Some(Duration::from_millis(millis as u64)),
            };
            let object = ctx.vm.deref(this)?;
            ctx.vm.enter_blocking(ctx.thread);
            let result = object
                .monitor()
                .wait(ctx.thread.id, &ctx.thread.interrupt, timeout);
            ctx.vm.leave_blocking(ctx.thread);
            result.map_err(monitor_error)?;
            Ok(None)
        });
        library.register_method(OBJECT, "notify", None, |ctx, args| {
            let object = ctx.vm.deref(receiver(args)?)?;
            object.monitor().notify(ctx.thread.id).map_err(monitor_error)?;
            Ok(None)
        });
        library.register_method(OBJECT, "notifyAll", None, |ctx, args| {
            let object = ctx.vm.deref(receiver(args)?)?;
            object
                .monitor()
                .notify_all(ctx.thread.id)
                .map_err(monitor_error)?;
            Ok(None)
        });
    }
}

fn receiver(args: &[Value]) -> Result<ObjectId, VmError> {
    args.first()
        .and_then(Value::object)
        .ok_or_else(VmError::null_pointer)
}

pub(crate) fn monitor_error(error: MonitorError) -> VmError {
    match error {
        MonitorError::NotOwner => VmError::with_message(
            ErrorKind::IllegalMonitorStateException,
            "current thread is not owner",
        ),
        MonitorError::Interrupted => VmError::new(ErrorKind::InterruptedException),
    }
}
