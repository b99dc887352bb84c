//! Memory Manager and Interpreter Integration Tests
//!
//! Tests the integration between memory_manager and interpreter components.
//! Verifies that objects created by interpreted code live on the heap, are
//! reclaimed by collections and carry working monitors.

use bytecode_system::access::{ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC, ACC_SYNCHRONIZED};
use bytecode_system::{ClassBuilder, ClassFile, CodeBuilder, Opcode};
use core_types::{LoaderId, Value};
use integration_tests::{engine, engine_with};
use interpreter::VmConfig;
use std::thread;

const PUBLIC_STATIC: u16 = ACC_PUBLIC | ACC_STATIC;
const T_INT: u8 = 10;

/// `demo/Churn`: allocation-heavy routines.
fn churn() -> ClassFile {
    let mut class = ClassBuilder::new("demo/Churn");

    // static void spin(int rounds, int size) { while (rounds-- > 0) { int[] a = new int[size]; } }
    let mut spin = CodeBuilder::new();
    let head = spin.new_label();
    let done = spin.new_label();
    spin.bind(head)
        .op(Opcode::Iload0)
        .branch(Opcode::Ifle, done)
        .op(Opcode::Iload1)
        .op_u8(Opcode::Newarray, T_INT)
        .op(Opcode::Astore2)
        .iinc(0, -1)
        .branch(Opcode::Goto, head)
        .bind(done)
        .op(Opcode::Return);
    class.method("spin", "(II)V", PUBLIC_STATIC, spin.build(1, 3).unwrap());

    // static int[] triple() { return new int[] { 7, 8, 9 }; }
    let mut triple = CodeBuilder::new();
    triple
        .op(Opcode::Iconst3)
        .op_u8(Opcode::Newarray, T_INT);
    for (index, value) in [7i8, 8, 9].into_iter().enumerate() {
        triple
            .op(Opcode::Dup)
            .push_int(index as i16)
            .bipush(value)
            .op(Opcode::Iastore);
    }
    triple.op(Opcode::Areturn);
    class.method("triple", "()[I", PUBLIC_STATIC, triple.build(4, 0).unwrap());
    class.build()
}

/// `demo/Account`: a balance guarded by a synchronized method.
fn account() -> ClassFile {
    let mut class = ClassBuilder::new("demo/Account");
    class.field("balance", "I", ACC_PRIVATE);
    let balance = class.field_ref("demo/Account", "balance", "I");
    let super_init = class.method_ref("java/lang/Object", "<init>", "()V");

    let mut init = CodeBuilder::new();
    init.op(Opcode::Aload0)
        .op_u16(Opcode::Invokespecial, super_init)
        .op(Opcode::Return);
    class.method("<init>", "()V", ACC_PUBLIC, init.build(1, 1).unwrap());

    let mut deposit = CodeBuilder::new();
    deposit
        .op(Opcode::Aload0)
        .op(Opcode::Dup)
        .op_u16(Opcode::Getfield, balance)
        .op(Opcode::Iconst1)
        .op(Opcode::Iadd)
        .op_u16(Opcode::Putfield, balance)
        .op(Opcode::Return);
    class.method(
        "deposit",
        "()V",
        ACC_PUBLIC | ACC_SYNCHRONIZED,
        deposit.build(3, 1).unwrap(),
    );
    class.build()
}

/// Test: Arrays built by interpreted code are typed heap objects
#[test]
fn test_interpreted_array_on_heap() {
    let vm = engine(vec![churn()]);
    let mut thread = vm.attach_thread("main");
    let class = vm.load_class("demo/Churn", LoaderId::BOOTSTRAP).unwrap();

    let array = vm
        .invoke_static(&mut thread, &class, "triple", "()[I", &[])
        .unwrap()
        .and_then(|value| value.object())
        .unwrap();
    let object = vm.heap().get(array).unwrap();
    assert!(object.is_array());
    assert_eq!(object.array_length(), Some(3));
    assert_eq!(object.array_load(2), Ok(Value::Int(9)));
    assert_eq!(vm.class_of(array).unwrap().name(), "[I");
}

/// Test: Garbage left by a finished call is reclaimed
#[test]
fn test_collection_reclaims_program_garbage() {
    let vm = engine(vec![churn()]);
    let mut thread = vm.attach_thread("main");
    let class = vm.load_class("demo/Churn", LoaderId::BOOTSTRAP).unwrap();

    // Initialize the class before taking the baseline.
    vm.invoke_static(&mut thread, &class, "spin", "(II)V", &[Value::Int(0), Value::Int(0)])
        .unwrap();
    vm.collect_garbage(Some(&mut *thread));
    let baseline = vm.heap().object_count();
    vm.invoke_static(&mut thread, &class, "spin", "(II)V", &[Value::Int(50), Value::Int(16)])
        .unwrap();
    assert_eq!(vm.heap().object_count(), baseline + 50);

    let stats = vm.collect_garbage(Some(&mut *thread));
    assert_eq!(stats.freed, 50);
    assert_eq!(vm.heap().object_count(), baseline);

    let again = vm.collect_garbage(None);
    assert_eq!(again.freed, 0);
}

/// Test: A small heap keeps running by collecting on demand
#[test]
fn test_small_heap_collects_on_demand() {
    let config = VmConfig::default()
        .with_min_heap(64 * 1024)
        .with_max_heap(1024 * 1024);
    let vm = engine_with(config, vec![churn()]);
    let mut thread = vm.attach_thread("main");
    let class = vm.load_class("demo/Churn", LoaderId::BOOTSTRAP).unwrap();

    // 1000 arrays of 4 KiB each: several times the heap limit.
    vm.invoke_static(&mut thread, &class, "spin", "(II)V", &[Value::Int(1000), Value::Int(1024)])
        .unwrap();
    assert!(vm.heap().collections() > 0);
    assert!(vm.heap().used() <= vm.heap().max_heap());
}

/// Test: Synchronized methods serialize updates from several threads
#[test]
fn test_synchronized_updates_from_threads() {
    let vm = engine(vec![account()]);
    let account = {
        let mut thread = vm.attach_thread("setup");
        let class = vm.load_class("demo/Account", LoaderId::BOOTSTRAP).unwrap();
        let account = vm.new_instance(&mut thread, &class, "()V", &[]).unwrap();
        vm.new_global_ref(account);
        account
    };

    let handles: Vec<_> = (0..4)
        .map(|index| {
            let vm = vm.clone();
            thread::spawn(move || {
                let mut thread = vm.attach_thread(&format!("worker-{}", index));
                for _ in 0..250 {
                    vm.invoke_virtual(&mut thread, account, "deposit", "()V", &[])
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(vm.get_field(account, "balance").unwrap(), Value::Int(1000));
    let object = vm.heap().get(account).unwrap();
    assert_eq!(object.monitor().owner(), None);
    assert_eq!(vm.thread_count(), 0);
}
