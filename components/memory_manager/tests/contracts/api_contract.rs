//! Contract tests verifying the heap and object API.

use core_types::{ClassId, ObjectId, Value};
use memory_manager::{ArrayAccessError, ArrayKind, GcPhase, Heap, HeapError};

/// Heap contract: allocate(class, template) -> Result<ObjectId, HeapError>
#[test]
fn contract_heap_allocate_instance() {
    let heap = Heap::new(0, 1 << 16);
    let id = heap.allocate(ClassId(3), &[Value::Int(0), Value::Null]).unwrap();
    let object = heap.get(id).unwrap();
    assert_eq!(object.class(), ClassId(3));
    assert!(!object.is_array());
    assert_eq!(object.field(1), Some(Value::Null));
}

/// Heap contract: allocate_array(class, kind, length) zero-fills
#[test]
fn contract_heap_allocate_array_zeroed() {
    let heap = Heap::new(0, 1 << 16);
    let id = heap.allocate_array(ClassId(4), ArrayKind::Double, 3).unwrap();
    let object = heap.get(id).unwrap();
    assert_eq!(object.array_length(), Some(3));
    assert_eq!(object.array_load(2), Ok(Value::Double(0.0)));
}

/// Heap contract: allocation beyond max_heap fails without side effects
#[test]
fn contract_heap_out_of_memory() {
    let heap = Heap::new(0, 100);
    let before = heap.used();
    let err = heap.allocate_array(ClassId(1), ArrayKind::Int, 1000).unwrap_err();
    assert!(matches!(err, HeapError::OutOfMemory { .. }));
    assert_eq!(heap.used(), before);
    assert_eq!(heap.object_count(), 0);
}

/// Object contract: reference arrays reject non-reference stores
#[test]
fn contract_reference_array_store() {
    let heap = Heap::new(0, 1 << 16);
    let target = heap.allocate(ClassId(1), &[]).unwrap();
    let id = heap.allocate_array(ClassId(2), ArrayKind::Reference, 2).unwrap();
    let array = heap.get(id).unwrap();
    assert_eq!(array.array_store(0, Value::Reference(target)), Ok(()));
    assert_eq!(
        array.array_store(1, Value::Int(1)),
        Err(ArrayAccessError::OutOfBounds(1))
    );
    assert_eq!(array.references(), vec![target]);
}

/// Object contract: copy_elements handles overlapping ranges in one array
#[test]
fn contract_copy_elements_overlapping() {
    let heap = Heap::new(0, 1 << 16);
    let id = heap.allocate_array(ClassId(2), ArrayKind::Int, 4).unwrap();
    let array = heap.get(id).unwrap();
    for i in 0..4 {
        array.array_store(i, Value::Int(i + 1)).unwrap();
    }
    array.copy_elements(0, &array, 1, 3).unwrap();
    let values: Vec<_> = (0..4).map(|i| array.array_load(i).unwrap()).collect();
    assert_eq!(
        values,
        vec![Value::Int(1), Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

/// Heap contract: collect traces through arrays and reports statistics
#[test]
fn contract_collect_traces_arrays() {
    let heap = Heap::new(0, 1 << 16);
    let leaf = heap.allocate(ClassId(1), &[]).unwrap();
    let array_id = heap.allocate_array(ClassId(2), ArrayKind::Reference, 1).unwrap();
    heap.get(array_id)
        .unwrap()
        .array_store(0, Value::Reference(leaf))
        .unwrap();
    heap.allocate(ClassId(1), &[]).unwrap();

    let stats = heap.collect([array_id, ObjectId(999)], |_| false);
    assert_eq!(stats.marked, 2);
    assert_eq!(stats.freed, 1);
    assert_eq!(stats.bytes_in_use, heap.used());
    assert_eq!(heap.collections(), 1);
    assert_eq!(heap.phase(), GcPhase::Idle);
}
