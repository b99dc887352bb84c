//! Runtime classes, methods and fields.
//!
//! A [`Class`] is created by the registry from a decoded class file and is
//! never destroyed. Members hold a weak back-reference to their class. The
//! linker fills in [`Linkage`] exactly once; the initializer drives
//! [`InitState`].

use crate::constant_pool::RuntimePool;
use crate::inline_cache::InterfaceCache;
use crate::native::NativeFn;
use crate::quicken::CodeStream;
use bytecode_system::access::{
    has_flag, ACC_ABSTRACT, ACC_FINAL, ACC_INTERFACE, ACC_NATIVE, ACC_PRIVATE, ACC_STATIC,
    ACC_SUPER, ACC_SYNCHRONIZED,
};
use bytecode_system::{
    ConstantPool, ExceptionTableEntry, FieldInfo, LineNumberEntry, MethodDescriptor, MethodInfo,
};
use core_types::{ClassId, LoaderId, ObjectId, ThreadId, Value};
use memory_manager::ArrayKind;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Layout and dispatch data computed by the linker.
#[derive(Debug)]
pub struct Linkage {
    /// Instance slots, inherited ones included
    pub instance_size: usize,
    /// Zeroed instance slots copied into every new object
    pub template: Vec<Value>,
    /// Virtual dispatch table
    pub vtable: Vec<Arc<Method>>,
    /// `finalize()V` override, if any
    pub finalizer: Option<Arc<Method>>,
}

/// Initialization state guarded by the class's init lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    /// `<clinit>` has not started
    Uninitialized,
    /// `<clinit>` is running on the given thread
    Initializing(ThreadId),
    /// Ready for use
    Initialized,
    /// Initialization failed; the class is unusable
    Bad,
}

/// Observable lifecycle state of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassState {
    /// Defined but not linked
    Loaded,
    /// Layout and dispatch table computed
    Linked,
    /// Static initializer running on the given thread
    Initializing(ThreadId),
    /// Ready for use
    Initialized,
    /// Initialization failed
    Bad,
}

/// Element information of an array class.
#[derive(Debug)]
pub struct ArrayInfo {
    /// Storage kind of the elements
    pub kind: ArrayKind,
    /// Component class; `None` when the component is primitive
    pub component: Option<Arc<Class>>,
    /// Number of dimensions
    pub dimensions: usize,
}

pub(crate) struct ClassParts {
    pub id: ClassId,
    pub name: String,
    pub loader: LoaderId,
    pub access_flags: u16,
    pub super_class: Option<Arc<Class>>,
    pub interfaces: Vec<Arc<Class>>,
    pub array: Option<ArrayInfo>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<(MethodInfo, MethodDescriptor)>,
    pub pool: ConstantPool,
    pub source_file: Option<String>,
}

/// A loaded class.
pub struct Class {
    id: ClassId,
    name: String,
    loader: LoaderId,
    access_flags: u16,
    super_class: Option<Arc<Class>>,
    interfaces: Vec<Arc<Class>>,
    array: Option<ArrayInfo>,
    fields: Vec<Arc<Field>>,
    methods: Vec<Arc<Method>>,
    pool: RuntimePool,
    source_file: Option<String>,
    pub(crate) linkage: OnceLock<Linkage>,
    pub(crate) link_lock: Mutex<()>,
    pub(crate) init: Mutex<InitState>,
    pub(crate) init_changed: Condvar,
    initialized: AtomicBool,
    pub(crate) mirror: OnceLock<ObjectId>,
}

impl Class {
    pub(crate) fn new(parts: ClassParts) -> Arc<Class> {
        Arc::new_cyclic(|this: &Weak<Class>| Class {
            id: parts.id,
            fields: parts
                .fields
                .iter()
                .map(|info| Arc::new(Field::new(this.clone(), info)))
                .collect(),
            methods: parts
                .methods
                .into_iter()
                .map(|(info, signature)| Arc::new(Method::new(this.clone(), info, signature)))
                .collect(),
            name: parts.name,
            loader: parts.loader,
            access_flags: parts.access_flags,
            super_class: parts.super_class,
            interfaces: parts.interfaces,
            array: parts.array,
            pool: RuntimePool::new(parts.pool),
            source_file: parts.source_file,
            linkage: OnceLock::new(),
            link_lock: Mutex::new(()),
            init: Mutex::new(InitState::Uninitialized),
            init_changed: Condvar::new(),
            initialized: AtomicBool::new(false),
            mirror: OnceLock::new(),
        })
    }

    /// Registry handle of the class.
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Internal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Defining loader.
    pub fn loader(&self) -> LoaderId {
        self.loader
    }

    /// Access flags.
    pub fn access_flags(&self) -> u16 {
        self.access_flags
    }

    /// Returns true for interfaces.
    pub fn is_interface(&self) -> bool {
        has_flag(self.access_flags, ACC_INTERFACE)
    }

    /// Returns true for abstract classes and interfaces.
    pub fn is_abstract(&self) -> bool {
        has_flag(self.access_flags, ACC_ABSTRACT)
    }

    /// Returns true if `invokespecial` uses superclass semantics.
    pub fn has_super_semantics(&self) -> bool {
        has_flag(self.access_flags, ACC_SUPER)
    }

    /// Returns true for array classes.
    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    /// Element information of an array class.
    pub fn array_info(&self) -> Option<&ArrayInfo> {
        self.array.as_ref()
    }

    /// Direct superclass; `None` only for the root class.
    pub fn super_class(&self) -> Option<&Arc<Class>> {
        self.super_class.as_ref()
    }

    /// Directly implemented interfaces.
    pub fn interfaces(&self) -> &[Arc<Class>] {
        &self.interfaces
    }

    /// Declared fields.
    pub fn fields(&self) -> &[Arc<Field>] {
        &self.fields
    }

    /// Declared methods.
    pub fn methods(&self) -> &[Arc<Method>] {
        &self.methods
    }

    /// The runtime constant pool.
    pub fn pool(&self) -> &RuntimePool {
        &self.pool
    }

    /// `SourceFile` attribute.
    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    /// Field descriptor naming this class, as used for array components.
    pub fn descriptor(&self) -> String {
        if self.is_array() {
            self.name.clone()
        } else {
            format!("L{};", self.name)
        }
    }

    /// Link results, once linked.
    pub fn linkage(&self) -> Option<&Linkage> {
        self.linkage.get()
    }

    /// Returns true once linked.
    pub fn is_linked(&self) -> bool {
        self.linkage.get().is_some()
    }

    /// Returns true once the static initializer has completed.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn set_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClassState {
        match *self.init.lock() {
            InitState::Initializing(thread) => ClassState::Initializing(thread),
            InitState::Initialized => ClassState::Initialized,
            InitState::Bad => ClassState::Bad,
            InitState::Uninitialized if self.is_linked() => ClassState::Linked,
            InitState::Uninitialized => ClassState::Loaded,
        }
    }

    /// The `java/lang/Class` object standing for this class, if created.
    pub fn mirror(&self) -> Option<ObjectId> {
        self.mirror.get().copied()
    }

    /// Finds a method declared by this class itself.
    pub fn find_declared_method(&self, name: &str, descriptor: &str) -> Option<Arc<Method>> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
            .cloned()
    }

    /// Finds a method in this class, its superclasses, then its
    /// superinterfaces.
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<Arc<Method>> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(method) = class.find_declared_method(name, descriptor) {
                return Some(method);
            }
            current = class.super_class.as_deref();
        }
        let mut current = Some(self);
        while let Some(class) = current {
            for interface in &class.interfaces {
                if let Some(method) = interface.find_interface_method_only(name, descriptor) {
                    return Some(method);
                }
            }
            current = class.super_class.as_deref();
        }
        None
    }

    /// Finds a method of an interface: the interface, its superinterfaces,
    /// then the root class.
    pub fn find_interface_method(&self, name: &str, descriptor: &str) -> Option<Arc<Method>> {
        self.find_interface_method_only(name, descriptor).or_else(|| {
            self.super_class
                .as_ref()
                .and_then(|object| object.find_declared_method(name, descriptor))
        })
    }

    fn find_interface_method_only(&self, name: &str, descriptor: &str) -> Option<Arc<Method>> {
        self.find_declared_method(name, descriptor).or_else(|| {
            self.interfaces
                .iter()
                .find_map(|i| i.find_interface_method_only(name, descriptor))
        })
    }

    /// Finds a field in this class, its superinterfaces, then its
    /// superclass chain.
    pub fn find_field(&self, name: &str, descriptor: &str) -> Option<Arc<Field>> {
        if let Some(field) = self
            .fields
            .iter()
            .find(|f| f.name == name && f.descriptor == descriptor)
        {
            return Some(Arc::clone(field));
        }
        if let Some(field) = self
            .interfaces
            .iter()
            .find_map(|i| i.find_field(name, descriptor))
        {
            return Some(field);
        }
        self.super_class
            .as_ref()
            .and_then(|s| s.find_field(name, descriptor))
    }

    /// Finds a field by name alone, searching the same order as
    /// [`Class::find_field`].
    pub fn find_field_named(&self, name: &str) -> Option<Arc<Field>> {
        if let Some(field) = self.fields.iter().find(|f| f.name == name) {
            return Some(Arc::clone(field));
        }
        if let Some(field) = self.interfaces.iter().find_map(|i| i.find_field_named(name)) {
            return Some(field);
        }
        self.super_class.as_ref().and_then(|s| s.find_field_named(name))
    }

    /// Returns true if `ancestor` is this class or one of its superclasses.
    pub fn is_subclass_of(&self, ancestor: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.id == ancestor.id {
                return true;
            }
            current = class.super_class.as_deref();
        }
        false
    }

    /// Returns true if this class or an ancestor implements `interface`,
    /// directly or through superinterfaces.
    pub fn implements(&self, interface: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            for direct in &class.interfaces {
                if direct.id == interface.id || direct.implements(interface) {
                    return true;
                }
            }
            current = class.super_class.as_deref();
        }
        false
    }

    /// Returns true if a value of this class may be stored where `target`
    /// is expected.
    pub fn is_assignable_to(&self, target: &Class) -> bool {
        if self.id == target.id {
            return true;
        }
        let is_root = |class: &Class| class.super_class.is_none() && !class.is_interface();
        if let Some(info) = &self.array {
            return match &target.array {
                Some(target_info) => match (&info.component, &target_info.component) {
                    (Some(from), Some(to)) => from.is_assignable_to(to),
                    (None, None) => info.kind == target_info.kind,
                    _ => false,
                },
                None => is_root(target) || (target.is_interface() && self.implements(target)),
            };
        }
        if target.is_array() {
            return false;
        }
        if target.is_interface() {
            return self.implements(target);
        }
        if self.is_interface() {
            return is_root(target);
        }
        self.is_subclass_of(target)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("loader", &self.loader)
            .field("state", &self.state())
            .finish()
    }
}

/// Slots charged per frame for the method, pc and return bookkeeping.
pub const FRAME_OVERHEAD: usize = 4;

/// Bytecode and tables of a method.
pub struct Code {
    pub(crate) stream: CodeStream,
    max_stack: usize,
    exception_table: Vec<ExceptionTableEntry>,
    line_numbers: Vec<LineNumberEntry>,
    pub(crate) call_sites: Mutex<HashMap<usize, InterfaceCache>>,
}

impl Code {
    /// Current bytes of the code stream, rewrites included.
    pub fn snapshot(&self) -> Vec<u8> {
        self.stream.snapshot()
    }

    /// Maximum operand-stack depth.
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    /// Exception handlers in priority order.
    pub fn exception_table(&self) -> &[ExceptionTableEntry] {
        &self.exception_table
    }

    /// Line-number table.
    pub fn line_numbers(&self) -> &[LineNumberEntry] {
        &self.line_numbers
    }

    /// Target cached by the interface call site at `pc` for `receiver`.
    pub fn cached_interface_target(&self, pc: usize, receiver: ClassId) -> Option<Arc<Method>> {
        self.call_sites
            .lock()
            .get(&pc)
            .and_then(|cache| cache.lookup(receiver))
    }
}

/// A declared method.
pub struct Method {
    class: Weak<Class>,
    name: String,
    descriptor: String,
    signature: MethodDescriptor,
    access_flags: u16,
    code: Option<Code>,
    args_count: AtomicUsize,
    max_locals: AtomicUsize,
    vtable_index: AtomicIsize,
    pub(crate) native: OnceLock<NativeFn>,
}

impl Method {
    fn new(class: Weak<Class>, info: MethodInfo, signature: MethodDescriptor) -> Self {
        let max_locals = info.code.as_ref().map_or(0, |c| c.max_locals as usize);
        let code = info.code.map(|attribute| Code {
            stream: CodeStream::new(&attribute.code),
            max_stack: attribute.max_stack as usize,
            exception_table: attribute.exception_table,
            line_numbers: attribute.line_numbers,
            call_sites: Mutex::new(HashMap::new()),
        });
        Method {
            class,
            name: info.name,
            descriptor: info.descriptor,
            signature,
            access_flags: info.access_flags,
            code,
            args_count: AtomicUsize::new(0),
            max_locals: AtomicUsize::new(max_locals),
            vtable_index: AtomicIsize::new(-1),
            native: OnceLock::new(),
        }
    }

    /// Declaring class.
    pub fn class(&self) -> Option<Arc<Class>> {
        self.class.upgrade()
    }

    /// Method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method descriptor.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Parsed descriptor.
    pub fn signature(&self) -> &MethodDescriptor {
        &self.signature
    }

    /// Access flags.
    pub fn access_flags(&self) -> u16 {
        self.access_flags
    }

    /// Returns true for static methods.
    pub fn is_static(&self) -> bool {
        has_flag(self.access_flags, ACC_STATIC)
    }

    /// Returns true for private methods.
    pub fn is_private(&self) -> bool {
        has_flag(self.access_flags, ACC_PRIVATE)
    }

    /// Returns true for native methods.
    pub fn is_native(&self) -> bool {
        has_flag(self.access_flags, ACC_NATIVE)
    }

    /// Returns true for abstract methods.
    pub fn is_abstract(&self) -> bool {
        has_flag(self.access_flags, ACC_ABSTRACT)
    }

    /// Returns true for synchronized methods.
    pub fn is_synchronized(&self) -> bool {
        has_flag(self.access_flags, ACC_SYNCHRONIZED)
    }

    /// Returns true for final methods.
    pub fn is_final(&self) -> bool {
        has_flag(self.access_flags, ACC_FINAL)
    }

    /// Returns true for `<init>` and `<clinit>`.
    pub fn is_initializer(&self) -> bool {
        self.name.starts_with('<')
    }

    /// Bytecode, absent for native and abstract methods.
    pub fn code(&self) -> Option<&Code> {
        self.code.as_ref()
    }

    /// Argument slots including the receiver. Valid once linked.
    pub fn args_count(&self) -> usize {
        self.args_count.load(Ordering::Acquire)
    }

    pub(crate) fn set_args_count(&self, count: usize) {
        self.args_count.store(count, Ordering::Release);
    }

    /// Local-variable slots.
    pub fn max_locals(&self) -> usize {
        self.max_locals.load(Ordering::Acquire)
    }

    pub(crate) fn set_max_locals(&self, count: usize) {
        self.max_locals.store(count, Ordering::Release);
    }

    /// Maximum operand-stack depth.
    pub fn max_stack(&self) -> usize {
        self.code.as_ref().map_or(0, |c| c.max_stack)
    }

    /// Stack slots a frame of this method takes, bookkeeping included.
    pub fn frame_size(&self) -> usize {
        FRAME_OVERHEAD + self.max_locals().max(self.args_count()) + self.max_stack()
    }

    /// Dispatch table slot, for virtually invokable methods.
    pub fn vtable_index(&self) -> Option<usize> {
        usize::try_from(self.vtable_index.load(Ordering::Acquire)).ok()
    }

    pub(crate) fn set_vtable_index(&self, index: usize) {
        self.vtable_index.store(index as isize, Ordering::Release);
    }

    /// Returns true once the native implementation has been bound.
    pub fn is_bound(&self) -> bool {
        self.native.get().is_some()
    }

    /// Source line of the instruction at `pc`.
    pub fn line_number(&self, pc: usize) -> Option<u32> {
        self.code
            .as_ref()?
            .line_numbers
            .iter()
            .filter(|entry| entry.start_pc as usize <= pc)
            .last()
            .map(|entry| entry.line_number as u32)
    }

    /// `class.name` for diagnostics.
    pub fn qualified_name(&self) -> String {
        match self.class() {
            Some(class) => format!("{}.{}", class.name(), self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.qualified_name())
            .field("descriptor", &self.descriptor)
            .field("vtable_index", &self.vtable_index())
            .finish()
    }
}

/// A declared field.
pub struct Field {
    class: Weak<Class>,
    name: String,
    descriptor: String,
    access_flags: u16,
    offset: AtomicUsize,
    static_value: Mutex<Value>,
}

impl Field {
    fn new(class: Weak<Class>, info: &FieldInfo) -> Self {
        Field {
            class,
            name: info.name.clone(),
            descriptor: info.descriptor.clone(),
            access_flags: info.access_flags,
            offset: AtomicUsize::new(0),
            static_value: Mutex::new(Value::zero_for(&info.descriptor)),
        }
    }

    /// Declaring class.
    pub fn class(&self) -> Option<Arc<Class>> {
        self.class.upgrade()
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field descriptor.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Access flags.
    pub fn access_flags(&self) -> u16 {
        self.access_flags
    }

    /// Returns true for static fields.
    pub fn is_static(&self) -> bool {
        has_flag(self.access_flags, ACC_STATIC)
    }

    /// Returns true for `long` and `double` fields.
    pub fn is_wide(&self) -> bool {
        matches!(self.descriptor.as_bytes().first(), Some(b'J') | Some(b'D'))
    }

    /// Returns true for reference-typed fields.
    pub fn is_reference(&self) -> bool {
        matches!(self.descriptor.as_bytes().first(), Some(b'L') | Some(b'['))
    }

    /// Instance slot offset. Valid once the declaring class is linked.
    pub fn offset(&self) -> usize {
        self.offset.load(Ordering::Acquire)
    }

    pub(crate) fn set_offset(&self, offset: usize) {
        self.offset.store(offset, Ordering::Release);
    }

    /// Value of a static field.
    pub fn get_static(&self) -> Value {
        *self.static_value.lock()
    }

    /// Stores a static field.
    pub fn set_static(&self, value: Value) {
        *self.static_value.lock() = value;
    }

    pub(crate) fn reset_static(&self) {
        self.set_static(Value::zero_for(&self.descriptor));
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("offset", &self.offset())
            .finish()
    }
}
