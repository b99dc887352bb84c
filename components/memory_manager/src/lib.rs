//! Memory Manager - object heap, monitors and collector coordination
//!
//! This component provides:
//! - A handle-based object heap with typed array storage
//! - Mark-sweep collection driven by roots supplied by the engine
//! - Reentrant object monitors with interruptible wait/notify
//! - Stop-the-world safe-point coordination between mutator threads
//!
//! # Examples
//!
//! ```
//! use core_types::{ClassId, Value};
//! use memory_manager::{ArrayKind, Heap};
//!
//! let heap = Heap::new(0, 1 << 20);
//! let array = heap.allocate_array(ClassId(1), ArrayKind::Int, 4).unwrap();
//! let object = heap.get(array).unwrap();
//! object.array_store(2, Value::Int(9)).unwrap();
//! assert_eq!(object.array_load(2), Ok(Value::Int(9)));
//!
//! let stats = heap.collect([], |_| false);
//! assert_eq!(stats.freed, 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod array;
pub mod gc;
pub mod heap;
pub mod monitor;
pub mod object;
pub mod safepoint;

pub use array::{ArrayKind, ArrayStorage};
pub use gc::{GcPhase, GcStats, MarkStack};
pub use heap::{Heap, HeapError};
pub use monitor::{InterruptFlag, Monitor, MonitorError};
pub use object::{ArrayAccessError, Object, ObjectBody};
pub use safepoint::SafePoint;
