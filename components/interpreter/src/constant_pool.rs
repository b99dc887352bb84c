//! Runtime constant pool and symbol resolution.
//!
//! Every pool slot moves through `UNRESOLVED -> LOCKED -> RESOLVED`. The
//! thread that wins the transition to `LOCKED` performs the lookup; others
//! spin until the slot is resolved or released. A failed lookup puts the
//! slot back to `UNRESOLVED`, so a later attempt runs the lookup again.
//!
//! The lookup itself never runs bytecode. Initialization of the resolved
//! class happens after the slot is published.

use crate::class::{Class, Field, Method};
use crate::error::{ExecResult, Exception};
use crate::linker::link;
use crate::thread::ThreadContext;
use crate::vm::Vm;
use bytecode_system::{Constant, ConstantPool};
use core_types::{ErrorKind, ObjectId, VmError};
use crossbeam::utils::Backoff;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

const UNRESOLVED: u8 = 0;
const LOCKED: u8 = 1;
const RESOLVED: u8 = 2;

/// What a pool slot resolved to.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// A class reference
    Class(Arc<Class>),
    /// A field reference
    Field(Arc<Field>),
    /// A method or interface method reference
    Method(Arc<Method>),
    /// An interned string literal
    String(ObjectId),
}

#[derive(Debug, Default)]
struct Slot {
    state: AtomicU8,
    value: OnceLock<Resolved>,
}

/// Symbolic pool of a class plus its resolution cache.
#[derive(Debug)]
pub struct RuntimePool {
    symbols: ConstantPool,
    slots: Box<[Slot]>,
    lookups: AtomicUsize,
}

impl RuntimePool {
    /// Wraps a symbolic pool; every slot starts unresolved.
    pub fn new(symbols: ConstantPool) -> Self {
        let slots = (0..symbols.len()).map(|_| Slot::default()).collect();
        RuntimePool {
            symbols,
            slots,
            lookups: AtomicUsize::new(0),
        }
    }

    /// The symbolic entries.
    pub fn symbols(&self) -> &ConstantPool {
        &self.symbols
    }

    /// Number of slots, slot 0 included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the pool holds nothing but slot 0.
    pub fn is_empty(&self) -> bool {
        self.slots.len() <= 1
    }

    /// Returns true once slot `index` is resolved.
    pub fn is_resolved(&self, index: u16) -> bool {
        self.slots
            .get(index as usize)
            .is_some_and(|slot| slot.state.load(Ordering::Acquire) == RESOLVED)
    }

    /// The resolved value of slot `index`, if resolved.
    pub fn resolved(&self, index: u16) -> Option<&Resolved> {
        let slot = self.slots.get(index as usize)?;
        if slot.state.load(Ordering::Acquire) != RESOLVED {
            return None;
        }
        slot.value.get()
    }

    /// Number of lookups performed, successful or not.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Resolves slot `index`, running `lookup` only if no other thread has
    /// resolved it. `wait` is called on every spin while another thread
    /// holds the slot.
    pub fn resolve_with<T: ?Sized>(
        &self,
        index: u16,
        context: &mut T,
        lookup: impl FnOnce(&mut T) -> ExecResult<Resolved>,
        mut wait: impl FnMut(&mut T),
    ) -> ExecResult<Resolved> {
        let slot = self.slots.get(index as usize).ok_or_else(|| {
            VmError::internal(format!("constant pool index {} out of range", index))
        })?;
        let backoff = Backoff::new();
        loop {
            match slot.state.load(Ordering::Acquire) {
                RESOLVED => {
                    return slot.value.get().cloned().ok_or_else(|| {
                        VmError::internal("resolved slot without a value").into()
                    });
                }
                LOCKED => {
                    backoff.snooze();
                    wait(context);
                }
                _ => {
                    if slot
                        .state
                        .compare_exchange(UNRESOLVED, LOCKED, Ordering::AcqRel, Ordering::Acquire)
                        .is_err()
                    {
                        continue;
                    }
                    self.lookups.fetch_add(1, Ordering::Relaxed);
                    return match lookup(context) {
                        Ok(resolved) => {
                            let value = slot.value.get_or_init(|| resolved);
                            let value = value.clone();
                            slot.state.store(RESOLVED, Ordering::Release);
                            Ok(value)
                        }
                        Err(error) => {
                            slot.state.store(UNRESOLVED, Ordering::Release);
                            Err(error)
                        }
                    };
                }
            }
        }
    }

    /// Every string literal resolved so far.
    pub(crate) fn resolved_strings(&self) -> Vec<ObjectId> {
        (0..self.slots.len())
            .filter_map(|i| match self.resolved(i as u16) {
                Some(Resolved::String(id)) => Some(*id),
                _ => None,
            })
            .collect()
    }
}

impl Vm {
    /// Resolves slot `index` of `class`'s pool.
    ///
    /// A resolved class is initialized when `trigger_init` is set; a
    /// resolved member always initializes its declaring class.
    pub(crate) fn resolve(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        index: u16,
        trigger_init: bool,
    ) -> ExecResult<Resolved> {
        let resolved = class.pool().resolve_with(
            index,
            thread,
            |thread| self.lookup_symbol(thread, class, index),
            |thread| self.poll_safepoint(thread),
        )?;
        match &resolved {
            Resolved::Class(target) if trigger_init => self.initialize(thread, target)?,
            Resolved::Field(field) => {
                if let Some(owner) = field.class() {
                    self.initialize(thread, &owner)?;
                }
            }
            Resolved::Method(method) => {
                if let Some(owner) = method.class() {
                    self.initialize(thread, &owner)?;
                }
            }
            _ => {}
        }
        Ok(resolved)
    }

    pub(crate) fn resolve_class(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        index: u16,
        trigger_init: bool,
    ) -> ExecResult<Arc<Class>> {
        match self.resolve(thread, class, index, trigger_init)? {
            Resolved::Class(target) => Ok(target),
            other => Err(unexpected(index, &other)),
        }
    }

    pub(crate) fn resolve_field(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        index: u16,
    ) -> ExecResult<Arc<Field>> {
        match self.resolve(thread, class, index, true)? {
            Resolved::Field(field) => Ok(field),
            other => Err(unexpected(index, &other)),
        }
    }

    pub(crate) fn resolve_method(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        index: u16,
    ) -> ExecResult<Arc<Method>> {
        match self.resolve(thread, class, index, true)? {
            Resolved::Method(method) => Ok(method),
            other => Err(unexpected(index, &other)),
        }
    }

    fn lookup_symbol(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        index: u16,
    ) -> ExecResult<Resolved> {
        let symbols = class.pool().symbols();
        let result = match symbols.get(index) {
            Some(Constant::Class { .. }) => {
                let name = symbols
                    .class_name(index)
                    .ok_or_else(|| malformed(class, index))?;
                self.registry
                    .load(name, class.loader())
                    .map(Resolved::Class)
                    .map_err(Exception::from)
            }
            Some(Constant::String { .. }) => {
                let text = symbols.string(index).ok_or_else(|| malformed(class, index))?;
                self.intern(thread, text).map(Resolved::String)
            }
            Some(Constant::Fieldref { .. }) => self.lookup_field(thread, class, index),
            Some(Constant::Methodref { .. }) => self.lookup_method(thread, class, index, false),
            Some(Constant::InterfaceMethodref { .. }) => {
                self.lookup_method(thread, class, index, true)
            }
            _ => Err(malformed(class, index).into()),
        };
        if let Err(Exception::Pending(error)) = &result {
            log::debug!(
                "resolution of {}#{} failed: {}",
                class.name(),
                index,
                error
            );
        }
        result
    }

    fn lookup_field(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        index: u16,
    ) -> ExecResult<Resolved> {
        let symbols = class.pool().symbols();
        let member = symbols
            .member_ref(index)
            .ok_or_else(|| malformed(class, index))?;
        let target = self.resolve_class(thread, class, member.class_index, false)?;
        link(&target)?;
        target
            .find_field(member.name, member.descriptor)
            .map(Resolved::Field)
            .ok_or_else(|| {
                VmError::with_message(ErrorKind::NoSuchFieldError, member.name).into()
            })
    }

    fn lookup_method(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        index: u16,
        interface: bool,
    ) -> ExecResult<Resolved> {
        let symbols = class.pool().symbols();
        let member = symbols
            .member_ref(index)
            .ok_or_else(|| malformed(class, index))?;
        let target = self.resolve_class(thread, class, member.class_index, false)?;
        if target.is_interface() != interface {
            return Err(VmError::with_message(
                ErrorKind::IncompatibleClassChangeError,
                target.name(),
            )
            .into());
        }
        link(&target)?;
        let method = if interface {
            target.find_interface_method(member.name, member.descriptor)
        } else {
            target.find_method(member.name, member.descriptor)
        };
        method
            .map(Resolved::Method)
            .ok_or_else(|| VmError::with_message(ErrorKind::NoSuchMethodError, member.name).into())
    }
}

fn malformed(class: &Class, index: u16) -> VmError {
    VmError::with_message(
        ErrorKind::ClassFormatError,
        format!("bad constant pool entry {} in {}", index, class.name()),
    )
}

fn unexpected(index: u16, resolved: &Resolved) -> Exception {
    VmError::internal(format!(
        "constant pool entry {} resolved to {:?}",
        index, resolved
    ))
    .into()
}
