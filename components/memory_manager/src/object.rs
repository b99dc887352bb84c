//! Heap objects: class instances and arrays.
//!
//! An object never moves and is addressed by its [`ObjectId`]. The body is
//! guarded by its own lock so field and element accesses from different
//! threads never tear a wide value.

use crate::array::ArrayStorage;
use crate::monitor::Monitor;
use core_types::{ClassId, ObjectId, Value};
use parking_lot::RwLock;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Failure of an array element access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArrayAccessError {
    /// The object is a class instance
    #[error("object is not an array")]
    NotArray,
    /// Index outside `[0, length)`
    #[error("index {0} out of bounds")]
    OutOfBounds(i32),
}

/// Payload of an object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBody {
    /// Instance field slots, laid out by the linker
    Instance(Vec<Value>),
    /// Array elements
    Array(ArrayStorage),
}

/// A heap-resident object.
pub struct Object {
    class: ClassId,
    body: RwLock<ObjectBody>,
    monitor: Arc<Monitor>,
    attachment: OnceLock<Arc<dyn Any + Send + Sync>>,
    finalized: AtomicBool,
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class)
            .field("body", &*self.body.read())
            .finish()
    }
}

impl Object {
    /// Creates an instance whose slots start as a copy of `template`.
    pub fn instance(class: ClassId, template: &[Value]) -> Self {
        Self::with_body(class, ObjectBody::Instance(template.to_vec()))
    }

    /// Creates an array object.
    pub fn array(class: ClassId, storage: ArrayStorage) -> Self {
        Self::with_body(class, ObjectBody::Array(storage))
    }

    fn with_body(class: ClassId, body: ObjectBody) -> Self {
        Object {
            class,
            body: RwLock::new(body),
            monitor: Arc::new(Monitor::new()),
            attachment: OnceLock::new(),
            finalized: AtomicBool::new(false),
        }
    }

    /// Runtime class of the object.
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// The object's monitor.
    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// Returns true for arrays.
    pub fn is_array(&self) -> bool {
        matches!(&*self.body.read(), ObjectBody::Array(_))
    }

    /// Reads the instance slot at `offset`.
    pub fn field(&self, offset: usize) -> Option<Value> {
        match &*self.body.read() {
            ObjectBody::Instance(slots) => slots.get(offset).copied(),
            ObjectBody::Array(_) => None,
        }
    }

    /// Writes the instance slot at `offset`. A wide value also claims the
    /// following slot.
    pub fn set_field(&self, offset: usize, value: Value) -> bool {
        let mut body = self.body.write();
        let ObjectBody::Instance(slots) = &mut *body else {
            return false;
        };
        if offset + value.slot_count() > slots.len() {
            return false;
        }
        slots[offset] = value;
        if value.is_wide() {
            slots[offset + 1] = Value::Top;
        }
        true
    }

    /// Element count of an array object.
    pub fn array_length(&self) -> Option<usize> {
        match &*self.body.read() {
            ObjectBody::Array(storage) => Some(storage.len()),
            ObjectBody::Instance(_) => None,
        }
    }

    /// Loads element `index` of an array.
    pub fn array_load(&self, index: i32) -> Result<Value, ArrayAccessError> {
        match &*self.body.read() {
            ObjectBody::Array(storage) => usize::try_from(index)
                .ok()
                .and_then(|i| storage.load(i))
                .ok_or(ArrayAccessError::OutOfBounds(index)),
            ObjectBody::Instance(_) => Err(ArrayAccessError::NotArray),
        }
    }

    /// Stores element `index` of an array.
    pub fn array_store(&self, index: i32, value: Value) -> Result<(), ArrayAccessError> {
        match &mut *self.body.write() {
            ObjectBody::Array(storage) => {
                let stored = usize::try_from(index)
                    .map(|i| storage.store(i, value))
                    .unwrap_or(false);
                if stored {
                    Ok(())
                } else {
                    Err(ArrayAccessError::OutOfBounds(index))
                }
            }
            ObjectBody::Instance(_) => Err(ArrayAccessError::NotArray),
        }
    }

    /// Runs `f` over the array storage.
    pub fn with_array<R>(&self, f: impl FnOnce(&ArrayStorage) -> R) -> Option<R> {
        match &*self.body.read() {
            ObjectBody::Array(storage) => Some(f(storage)),
            ObjectBody::Instance(_) => None,
        }
    }

    /// Copies `length` elements between arrays of the same storage kind.
    pub fn copy_elements(
        &self,
        src_pos: usize,
        dest: &Object,
        dest_pos: usize,
        length: usize,
    ) -> Result<(), ArrayAccessError> {
        let elements: Vec<Value> = {
            let body = self.body.read();
            let ObjectBody::Array(storage) = &*body else {
                return Err(ArrayAccessError::NotArray);
            };
            (src_pos..src_pos + length)
                .map(|i| storage.load(i).ok_or(ArrayAccessError::OutOfBounds(i as i32)))
                .collect::<Result<_, _>>()?
        };
        for (i, value) in elements.into_iter().enumerate() {
            dest.array_store((dest_pos + i) as i32, value)?;
        }
        Ok(())
    }

    /// Every object this one references.
    pub fn references(&self) -> Vec<ObjectId> {
        match &*self.body.read() {
            ObjectBody::Instance(slots) => slots.iter().filter_map(Value::object).collect(),
            ObjectBody::Array(storage) => storage.references().collect(),
        }
    }

    /// Approximate size in bytes, used for heap accounting.
    pub fn size(&self) -> usize {
        match &*self.body.read() {
            ObjectBody::Instance(slots) => instance_size(slots.len()),
            ObjectBody::Array(storage) => HEADER_SIZE + storage.len() * storage_element_size(storage),
        }
    }

    /// Attaches engine-private data, such as a captured backtrace. Only
    /// the first attachment sticks.
    pub fn attach(&self, data: Arc<dyn Any + Send + Sync>) -> bool {
        self.attachment.set(data).is_ok()
    }

    /// Engine-private data attached to the object.
    pub fn attachment<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.attachment.get()?.downcast_ref::<T>()
    }

    /// Marks the object's finalizer as run. Returns false if it already was.
    pub fn mark_finalized(&self) -> bool {
        !self.finalized.swap(true, Ordering::AcqRel)
    }

    /// Returns true once the finalizer has been scheduled.
    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }
}

pub(crate) const HEADER_SIZE: usize = 16;

pub(crate) fn instance_size(slots: usize) -> usize {
    HEADER_SIZE + slots * 8
}

fn storage_element_size(storage: &ArrayStorage) -> usize {
    match storage {
        ArrayStorage::Byte(_) => 1,
        ArrayStorage::Char(_) | ArrayStorage::Short(_) => 2,
        ArrayStorage::Int(_) | ArrayStorage::Float(_) => 4,
        ArrayStorage::Long(_) | ArrayStorage::Double(_) | ArrayStorage::Reference(_) => 8,
    }
}
