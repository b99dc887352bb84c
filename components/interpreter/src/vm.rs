//! The engine facade.
//!
//! A [`Vm`] owns the process-wide state: class registry, heap, string
//! intern table, native resolvers, global references and the safe-point
//! coordinator. Threads attach with [`Vm::attach_thread`] and drive the
//! engine through the entry points below. Every entry point reports a
//! throwable that escapes it as an [`UncaughtException`].

use crate::bootstrap::{BootstrapLibrary, CHAR_ARRAY, CLASS, ERROR, STRING, THROWABLE};
use crate::class::Class;
use crate::config::VmConfig;
use crate::error::{ExecResult, Exception, StartupError, UncaughtException};
use crate::linker::link;
use crate::loader::{ClassSource, SourceChain};
use crate::native::{NativeLibrary, NativeResolver};
use crate::registry::{Registry, OBJECT};
use crate::thread::{ThreadContext, ThreadRecord};
use core_types::{ClassId, ErrorKind, LoaderId, ObjectId, ThreadId, Value, VmError};
use memory_manager::{ArrayStorage, Heap, HeapError, Object, SafePoint};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

/// Bootstrap classes and field offsets the engine uses directly.
pub(crate) struct WellKnown {
    pub object: Arc<Class>,
    pub string: Arc<Class>,
    pub class: Arc<Class>,
    pub error: Arc<Class>,
    pub char_array: Arc<Class>,
    pub message_offset: usize,
    pub cause_offset: usize,
    pub value_offset: usize,
}

/// Marks a `java/lang/Class` object with the class it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClassMirror(pub ClassId);

/// A running engine.
pub struct Vm {
    pub(crate) config: VmConfig,
    pub(crate) heap: Heap,
    pub(crate) registry: Registry,
    pub(crate) strings: Mutex<HashMap<String, ObjectId>>,
    pub(crate) safepoint: SafePoint,
    pub(crate) well_known: WellKnown,
    /// Thrown when even the throwable for a failure cannot be allocated
    pub(crate) oom: ObjectId,
    pub(crate) natives: RwLock<Vec<Arc<dyn NativeResolver>>>,
    library: Arc<NativeLibrary>,
    pub(crate) global_refs: Mutex<HashMap<ObjectId, usize>>,
    pub(crate) finalize_queue: Mutex<Vec<ObjectId>>,
    pub(crate) threads: Mutex<HashMap<ThreadId, ThreadRecord>>,
    pub(crate) next_thread: AtomicU32,
}

impl Vm {
    /// Starts an engine whose bootstrap loader reads the bootstrap library
    /// and then `source`.
    pub fn new(config: VmConfig, source: Arc<dyn ClassSource>) -> Result<Arc<Vm>, StartupError> {
        config.validate()?;
        let library = BootstrapLibrary::new().map_err(|error| StartupError::Bootstrap {
            class: OBJECT.to_string(),
            source: VmError::internal(error.to_string()),
        })?;
        let bootstrap_names = library.class_names();
        let bootstrap: Arc<dyn ClassSource> = Arc::new(library);
        let registry = Registry::new(
            Arc::new(SourceChain::new(vec![bootstrap, source])),
            config.verbose_class,
        );

        let preload = |name: &str| -> Result<Arc<Class>, StartupError> {
            registry
                .load(name, LoaderId::BOOTSTRAP)
                .and_then(|class| {
                    link(&class)?;
                    Ok(class)
                })
                .map_err(|source| StartupError::Bootstrap {
                    class: name.to_string(),
                    source,
                })
        };
        for name in &bootstrap_names {
            preload(name)?;
        }
        let throwable = preload(THROWABLE)?;
        let string = preload(STRING)?;
        let offset = |class: &Arc<Class>, name: &str| -> Result<usize, StartupError> {
            class
                .find_field_named(name)
                .map(|field| field.offset())
                .ok_or_else(|| StartupError::Bootstrap {
                    class: class.name().to_string(),
                    source: VmError::with_message(ErrorKind::NoSuchFieldError, name),
                })
        };
        let well_known = WellKnown {
            object: preload(OBJECT)?,
            class: preload(CLASS)?,
            error: preload(ERROR)?,
            char_array: preload(CHAR_ARRAY)?,
            message_offset: offset(&throwable, "message")?,
            cause_offset: offset(&throwable, "cause")?,
            value_offset: offset(&string, "value")?,
            string,
        };

        let heap = Heap::new(config.min_heap, config.max_heap);
        let oom_class = preload(ErrorKind::OutOfMemoryError.class_name())?;
        let oom = match oom_class.linkage() {
            Some(linkage) => heap.allocate(oom_class.id(), &linkage.template)?,
            None => {
                return Err(StartupError::Bootstrap {
                    class: oom_class.name().to_string(),
                    source: VmError::internal("not linked"),
                })
            }
        };

        let library = Arc::new(NativeLibrary::new());
        let builtins = NativeLibrary::new();
        Vm::register_builtin_natives(&builtins);
        let natives: Vec<Arc<dyn NativeResolver>> =
            vec![Arc::new(builtins), Arc::clone(&library) as Arc<dyn NativeResolver>];

        log::debug!(
            "engine started: {} bootstrap classes, heap limit {} bytes",
            registry.len(),
            config.max_heap
        );
        Ok(Arc::new(Vm {
            heap,
            registry,
            strings: Mutex::new(HashMap::new()),
            safepoint: SafePoint::new(),
            well_known,
            oom,
            natives: RwLock::new(natives),
            library,
            global_refs: Mutex::new(HashMap::new()),
            finalize_queue: Mutex::new(Vec::new()),
            threads: Mutex::new(HashMap::new()),
            next_thread: AtomicU32::new(1),
            config,
        }))
    }

    /// Engine settings.
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// The heap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Native implementations registered by the embedder.
    pub fn native_library(&self) -> &Arc<NativeLibrary> {
        &self.library
    }

    /// Adds a resolver consulted after the built-in natives and the
    /// embedder's library.
    pub fn register_natives(&self, resolver: Arc<dyn NativeResolver>) {
        self.natives.write().push(resolver);
    }

    /// Registers a class loader reading from `source`.
    pub fn add_loader(&self, source: Arc<dyn ClassSource>) -> LoaderId {
        self.registry.add_loader(source)
    }

    /// Number of defined classes, array classes included.
    pub fn class_count(&self) -> usize {
        self.registry.len()
    }

    /// Class already defined for `loader`, without loading anything.
    pub fn find_class(&self, name: &str, loader: LoaderId) -> Option<Arc<Class>> {
        self.registry.find_loaded(name, loader)
    }

    /// Class of a heap object.
    pub fn class_of(&self, object: ObjectId) -> ExecResult<Arc<Class>> {
        let class = self.deref(object)?.class();
        self.registry
            .get(class)
            .ok_or_else(|| VmError::internal(format!("object {} has unknown class", object)).into())
    }

    pub(crate) fn deref(&self, object: ObjectId) -> ExecResult<Arc<Object>> {
        self.heap
            .get(object)
            .ok_or_else(|| VmError::internal(format!("dangling reference {}", object)).into())
    }

    /// Allocates, collecting once and retrying before giving up with the
    /// preallocated `OutOfMemoryError`.
    fn allocate_with(
        &self,
        thread: &mut ThreadContext,
        attempt: impl Fn(&Heap) -> Result<ObjectId, HeapError>,
    ) -> ExecResult<ObjectId> {
        if self.heap.should_collect() {
            self.gc_pause(Some(&*thread));
        }
        match attempt(&self.heap) {
            Ok(id) => Ok(id),
            Err(error) => {
                log::debug!("{}; collecting before retry", error);
                self.gc_pause(Some(&*thread));
                attempt(&self.heap).map_err(|error| {
                    log::debug!("{} after collection", error);
                    Exception::Thrown(self.oom)
                })
            }
        }
    }

    pub(crate) fn allocate_instance(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
    ) -> ExecResult<ObjectId> {
        let linkage = link(class)?;
        self.allocate_with(thread, |heap| heap.allocate(class.id(), &linkage.template))
    }

    pub(crate) fn allocate_array(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        length: i32,
    ) -> ExecResult<ObjectId> {
        let info = class
            .array_info()
            .ok_or_else(|| VmError::internal(format!("{} is not an array class", class.name())))?;
        let length = usize::try_from(length).map_err(|_| {
            VmError::with_message(ErrorKind::NegativeArraySizeException, length.to_string())
        })?;
        self.allocate_with(thread, |heap| heap.allocate_array(class.id(), info.kind, length))
    }

    /// Array class whose elements are `component`.
    pub(crate) fn array_class_of(&self, component: &Class) -> ExecResult<Arc<Class>> {
        let name = format!("[{}", component.descriptor());
        Ok(self.registry.load(&name, component.loader())?)
    }

    pub(crate) fn create_string(&self, thread: &mut ThreadContext, text: &str) -> ExecResult<ObjectId> {
        let units: Vec<u16> = text.encode_utf16().collect();
        let chars = self.allocate_array(thread, &self.well_known.char_array, units.len() as i32)?;
        let array = self.deref(chars)?;
        for (index, unit) in units.iter().enumerate() {
            array
                .array_store(index as i32, Value::Int(*unit as i32))
                .map_err(|error| VmError::internal(error.to_string()))?;
        }
        thread.handles.push(chars);
        let string = self.allocate_instance(thread, &self.well_known.string);
        thread.handles.pop();
        let string = string?;
        self.deref(string)?
            .set_field(self.well_known.value_offset, Value::Reference(chars));
        Ok(string)
    }

    /// The interned string equal to `text`.
    pub(crate) fn intern(&self, thread: &mut ThreadContext, text: &str) -> ExecResult<ObjectId> {
        if let Some(id) = self.strings.lock().get(text) {
            return Ok(*id);
        }
        let created = self.create_string(thread, text)?;
        Ok(*self
            .strings
            .lock()
            .entry(text.to_string())
            .or_insert(created))
    }

    /// Number of interned strings.
    pub fn interned_count(&self) -> usize {
        self.strings.lock().len()
    }

    /// The `java/lang/Class` object of `class`, created on first use.
    pub(crate) fn mirror(&self, thread: &mut ThreadContext, class: &Arc<Class>) -> ExecResult<ObjectId> {
        if let Some(id) = class.mirror.get() {
            return Ok(*id);
        }
        let created = self.allocate_instance(thread, &self.well_known.class)?;
        let id = *class.mirror.get_or_init(|| created);
        if id == created {
            self.deref(id)?.attach(Arc::new(ClassMirror(class.id())));
        }
        Ok(id)
    }

    /// Class a `java/lang/Class` object stands for.
    pub fn class_for_mirror(&self, mirror: ObjectId) -> Option<Arc<Class>> {
        let object = self.heap.get(mirror)?;
        let ClassMirror(id) = *object.attachment::<ClassMirror>()?;
        self.registry.get(id)
    }

    /// Contents of a `java/lang/String`.
    pub fn string_value(&self, string: ObjectId) -> Option<String> {
        let object = self.heap.get(string)?;
        let chars = object.field(self.well_known.value_offset)?.object()?;
        self.heap.get(chars)?.with_array(|storage| match storage {
            ArrayStorage::Char(units) => Some(String::from_utf16_lossy(units)),
            _ => None,
        })?
    }

    /// Runs `body` as engine code on behalf of `thread`, reporting an
    /// escaping throwable.
    fn enter<T>(
        &self,
        thread: &mut ThreadContext,
        body: impl FnOnce(&Self, &mut ThreadContext) -> ExecResult<T>,
    ) -> Result<T, UncaughtException> {
        self.enter_java(thread);
        let result = body(self, thread).map_err(|exception| {
            let throwable = self.materialize(thread, exception);
            self.describe_throwable(throwable)
        });
        self.exit_java(thread);
        result
    }

    /// Loads and links a class without initializing it.
    pub fn load_class(&self, name: &str, loader: LoaderId) -> Result<Arc<Class>, VmError> {
        let class = self.registry.load(name, loader)?;
        link(&class)?;
        Ok(class)
    }

    /// Loads, links and initializes a class.
    pub fn initialize_class(
        &self,
        thread: &mut ThreadContext,
        name: &str,
        loader: LoaderId,
    ) -> Result<Arc<Class>, UncaughtException> {
        self.enter(thread, |vm, thread| {
            let class = vm.load_class(name, loader)?;
            vm.initialize(thread, &class)?;
            Ok(class)
        })
    }

    /// Invokes a static method. `args` holds one entry per declared
    /// parameter; wide values are expanded to two slots here.
    pub fn invoke_static(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        name: &str,
        descriptor: &str,
        args: &[Value],
    ) -> Result<Option<Value>, UncaughtException> {
        self.enter(thread, |vm, thread| {
            vm.initialize(thread, class)?;
            let method = class
                .find_method(name, descriptor)
                .filter(|m| m.is_static())
                .ok_or_else(|| no_such_method(class, name, descriptor))?;
            vm.call(thread, &method, expand(args))
        })
    }

    /// Invokes an instance method on `receiver` with virtual dispatch.
    pub fn invoke_virtual(
        &self,
        thread: &mut ThreadContext,
        receiver: ObjectId,
        name: &str,
        descriptor: &str,
        args: &[Value],
    ) -> Result<Option<Value>, UncaughtException> {
        self.enter(thread, |vm, thread| {
            let class = vm.class_of(receiver)?;
            let method = class
                .find_method(name, descriptor)
                .filter(|m| !m.is_static())
                .ok_or_else(|| no_such_method(&class, name, descriptor))?;
            let mut slots = vec![Value::Reference(receiver)];
            slots.extend(expand(args));
            vm.call(thread, &method, slots)
        })
    }

    /// Allocates an instance of `class` and runs the constructor with
    /// `descriptor`.
    pub fn new_instance(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        descriptor: &str,
        args: &[Value],
    ) -> Result<ObjectId, UncaughtException> {
        self.enter(thread, |vm, thread| {
            if class.is_abstract() || class.is_interface() || class.is_array() {
                return Err(VmError::with_message(
                    ErrorKind::IncompatibleClassChangeError,
                    format!("cannot instantiate {}", class.name()),
                )
                .into());
            }
            vm.initialize(thread, class)?;
            let constructor = class
                .find_declared_method("<init>", descriptor)
                .ok_or_else(|| no_such_method(class, "<init>", descriptor))?;
            let object = vm.allocate_instance(thread, class)?;
            let mut slots = vec![Value::Reference(object)];
            slots.extend(expand(args));
            thread.handles.push(object);
            let result = vm.call(thread, &constructor, slots);
            thread.handles.pop();
            result.map(|_| object)
        })
    }

    /// Runs `main([Ljava/lang/String;)V` of `class_name` with `args`.
    pub fn run_main(
        &self,
        thread: &mut ThreadContext,
        class_name: &str,
        args: &[&str],
    ) -> Result<(), UncaughtException> {
        let result = self.enter(thread, |vm, thread| {
            let class = vm.load_class(class_name, LoaderId::BOOTSTRAP)?;
            vm.initialize(thread, &class)?;
            let main = class
                .find_declared_method("main", "([Ljava/lang/String;)V")
                .filter(|m| m.is_static())
                .ok_or_else(|| no_such_method(&class, "main", "([Ljava/lang/String;)V"))?;

            let array_class = vm.array_class_of(&vm.well_known.string)?;
            let array = vm.allocate_array(thread, &array_class, args.len() as i32)?;
            thread.handles.push(array);
            let filled: ExecResult<()> = args.iter().enumerate().try_for_each(|(index, arg)| {
                let string = vm.create_string(thread, arg)?;
                vm.deref(array)?
                    .array_store(index as i32, Value::Reference(string))
                    .map_err(|error| VmError::internal(error.to_string()).into())
            });
            thread.handles.pop();
            filled?;
            vm.call(thread, &main, vec![Value::Reference(array)])
                .map(|_| ())
        });
        if let Err(uncaught) = &result {
            log::warn!("Exception in thread \"{}\" {}", thread.name(), uncaught);
        }
        result
    }

    /// Allocates a string. The result is not rooted; hold it in a frame or
    /// a global reference before the next allocation.
    pub fn new_string(
        &self,
        thread: &mut ThreadContext,
        text: &str,
    ) -> Result<ObjectId, UncaughtException> {
        self.enter(thread, |vm, thread| vm.create_string(thread, text))
    }

    /// Reads a static field, initializing its class first.
    pub fn get_static(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        name: &str,
    ) -> Result<Value, UncaughtException> {
        self.enter(thread, |vm, thread| {
            vm.initialize(thread, class)?;
            let field = static_field(class, name)?;
            Ok(field.get_static())
        })
    }

    /// Stores a static field, initializing its class first.
    pub fn set_static(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        name: &str,
        value: Value,
    ) -> Result<(), UncaughtException> {
        self.enter(thread, |vm, thread| {
            vm.initialize(thread, class)?;
            static_field(class, name)?.set_static(value);
            Ok(())
        })
    }

    /// Reads an instance field by name.
    pub fn get_field(&self, object: ObjectId, name: &str) -> Result<Value, VmError> {
        let class = self.class_of(object).map_err(pending)?;
        let field = class
            .find_field_named(name)
            .filter(|f| !f.is_static())
            .ok_or_else(|| VmError::with_message(ErrorKind::NoSuchFieldError, name))?;
        self.heap
            .get(object)
            .and_then(|o| o.field(field.offset()))
            .ok_or_else(|| VmError::internal(format!("field {} out of range", name)))
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("classes", &self.registry.len())
            .field("objects", &self.heap.object_count())
            .field("threads", &self.thread_count())
            .field("config", &self.config)
            .finish()
    }
}

/// Expands logical arguments into slots.
fn expand(args: &[Value]) -> Vec<Value> {
    let mut slots = Vec::with_capacity(args.len() * 2);
    for arg in args {
        slots.push(*arg);
        if arg.is_wide() {
            slots.push(Value::Top);
        }
    }
    slots
}

fn no_such_method(class: &Class, name: &str, descriptor: &str) -> Exception {
    VmError::with_message(
        ErrorKind::NoSuchMethodError,
        format!("{}.{}{}", class.name().replace('/', "."), name, descriptor),
    )
    .into()
}

fn static_field(class: &Class, name: &str) -> Result<Arc<crate::class::Field>, VmError> {
    class
        .find_field_named(name)
        .filter(|f| f.is_static())
        .ok_or_else(|| VmError::with_message(ErrorKind::NoSuchFieldError, name))
}

fn pending(exception: Exception) -> VmError {
    match exception {
        Exception::Pending(error) => error,
        Exception::Thrown(id) => VmError::internal(format!("unexpected throwable {}", id)),
    }
}
