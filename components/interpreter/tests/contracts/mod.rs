//! Contract tests for interpreter API
//!
//! These tests pin the observable behavior of the public entry points.

use bytecode_system::access::{ACC_PUBLIC, ACC_STATIC};
use bytecode_system::{ClassBuilder, CodeBuilder, Opcode};
use core_types::{ErrorKind, LoaderId, Value};
use interpreter::{ClassState, InMemorySource, StartupError, Vm, VmConfig};
use std::sync::Arc;

fn empty_engine() -> Arc<Vm> {
    Vm::new(VmConfig::default(), Arc::new(InMemorySource::new())).unwrap()
}

/// Startup preloads the bootstrap library
#[test]
fn test_vm_new_contract() {
    let vm = empty_engine();
    assert!(vm.class_count() > 20);
    for name in ["java/lang/Object", "java/lang/String", "java/lang/Throwable"] {
        let class = vm.find_class(name, LoaderId::BOOTSTRAP).unwrap();
        assert!(class.is_linked(), "{} should be linked", name);
    }
    assert_eq!(vm.thread_count(), 0);
}

/// Invalid settings are refused before anything is allocated
#[test]
fn test_vm_new_rejects_config_contract() {
    let config = VmConfig::default().with_min_heap(10).with_max_heap(5);
    let result = Vm::new(config, Arc::new(InMemorySource::new()));
    assert!(matches!(result, Err(StartupError::Config(_))));
}

/// Attached threads are counted until dropped
#[test]
fn test_attach_thread_contract() {
    let vm = empty_engine();
    let first = vm.attach_thread("first");
    let second = vm.attach_thread("second");
    assert_ne!(first.id(), second.id());
    assert_eq!(vm.thread_count(), 2);
    let mut names = vm.thread_names();
    names.sort();
    assert_eq!(names, vec!["first".to_string(), "second".to_string()]);

    drop(first);
    assert_eq!(vm.thread_count(), 1);
    assert!(!vm.interrupt(core_types::ThreadId(999)));
}

/// load_class links; initialize_class initializes
#[test]
fn test_class_state_contract() {
    let mut class = ClassBuilder::new("demo/State");
    class.field("value", "J", ACC_PUBLIC | ACC_STATIC);
    let vm = Vm::new(
        VmConfig::default(),
        Arc::new(InMemorySource::with_classes([class.build()])),
    )
    .unwrap();
    let mut thread = vm.attach_thread("main");

    let class = vm.load_class("demo/State", LoaderId::BOOTSTRAP).unwrap();
    assert_eq!(class.state(), ClassState::Linked);
    vm.initialize_class(&mut thread, "demo/State", LoaderId::BOOTSTRAP)
        .unwrap();
    assert_eq!(class.state(), ClassState::Initialized);

    vm.set_static(&mut thread, &class, "value", Value::Long(-3)).unwrap();
    assert_eq!(vm.get_static(&mut thread, &class, "value").unwrap(), Value::Long(-3));
    let missing = vm.get_static(&mut thread, &class, "other").unwrap_err();
    assert_eq!(missing.class_name, "java/lang/NoSuchFieldError");
}

/// Unknown classes are reported as NoClassDefFoundError
#[test]
fn test_load_class_missing_contract() {
    let vm = empty_engine();
    let error = vm.load_class("demo/Nowhere", LoaderId::BOOTSTRAP).unwrap_err();
    assert_eq!(error.kind, ErrorKind::NoClassDefFoundError);
    assert_eq!(error.message.as_deref(), Some("demo/Nowhere"));
}

/// User loaders delegate to the bootstrap loader first
#[test]
fn test_user_loader_contract() {
    let vm = empty_engine();
    let plugin = ClassBuilder::new("demo/Plugin").build();
    let shadow = ClassBuilder::new("java/lang/String").build();
    let loader = vm.add_loader(Arc::new(InMemorySource::with_classes([plugin, shadow])));
    assert!(!loader.is_bootstrap());

    let class = vm.load_class("demo/Plugin", loader).unwrap();
    assert_eq!(class.loader(), loader);
    assert_eq!(class.super_class().unwrap().loader(), LoaderId::BOOTSTRAP);

    let string = vm.load_class("java/lang/String", loader).unwrap();
    assert_eq!(string.loader(), LoaderId::BOOTSTRAP);
    assert!(vm.load_class("demo/Plugin", LoaderId::BOOTSTRAP).is_err());
}

/// Array classes are created on demand and share the bootstrap interfaces
#[test]
fn test_array_class_contract() {
    let vm = empty_engine();
    let ints = vm.load_class("[I", LoaderId::BOOTSTRAP).unwrap();
    assert!(ints.is_array());
    assert!(ints.array_info().unwrap().component.is_none());

    let strings = vm.load_class("[[Ljava/lang/String;", LoaderId::BOOTSTRAP).unwrap();
    let info = strings.array_info().unwrap();
    assert_eq!(info.dimensions, 2);
    assert_eq!(info.component.as_ref().unwrap().name(), "[Ljava/lang/String;");

    let object = vm.find_class("java/lang/Object", LoaderId::BOOTSTRAP).unwrap();
    let cloneable = vm.find_class("java/lang/Cloneable", LoaderId::BOOTSTRAP).unwrap();
    assert!(strings.is_assignable_to(&object));
    assert!(strings.is_assignable_to(&cloneable));
    assert!(!ints.is_assignable_to(&strings));
}

/// Strings cross the API boundary as UTF-16 character arrays
#[test]
fn test_string_contract() {
    let vm = empty_engine();
    let mut thread = vm.attach_thread("main");
    let text = "caf\u{e9} \u{1f600}";
    let string = vm.new_string(&mut thread, text).unwrap();
    vm.new_global_ref(string);
    assert_eq!(vm.string_value(string).as_deref(), Some(text));

    let length = vm
        .invoke_virtual(&mut thread, string, "length", "()I", &[])
        .unwrap();
    assert_eq!(length, Some(Value::Int(text.encode_utf16().count() as i32)));
    let first = vm
        .invoke_virtual(&mut thread, string, "charAt", "(I)C", &[Value::Int(0)])
        .unwrap();
    assert_eq!(first, Some(Value::Int('c' as i32)));

    let chars = vm.get_field(string, "value").unwrap();
    assert!(chars.object().is_some());
    assert_eq!(
        vm.get_field(string, "missing").unwrap_err().kind,
        ErrorKind::NoSuchFieldError
    );
}

/// Uncaught throwables carry class, message and backtrace
#[test]
fn test_uncaught_exception_contract() {
    let mut class = ClassBuilder::new("demo/Fail");
    class.source_file("Fail.java");
    let mut code = CodeBuilder::new();
    code.line(12)
        .op(Opcode::AconstNull)
        .op(Opcode::Arraylength)
        .op(Opcode::Ireturn);
    class.method("run", "()I", ACC_PUBLIC | ACC_STATIC, code.build(1, 0).unwrap());
    let vm = Vm::new(
        VmConfig::default(),
        Arc::new(InMemorySource::with_classes([class.build()])),
    )
    .unwrap();
    let mut thread = vm.attach_thread("main");
    let fail = vm.load_class("demo/Fail", LoaderId::BOOTSTRAP).unwrap();

    let uncaught = vm
        .invoke_static(&mut thread, &fail, "run", "()I", &[])
        .unwrap_err();
    assert_eq!(uncaught.class_name, "java/lang/NullPointerException");
    assert_eq!(uncaught.message, None);
    assert_eq!(
        uncaught.to_string(),
        "java.lang.NullPointerException\n\tat demo.Fail.run(Fail.java:12)"
    );
    assert_eq!(vm.describe_throwable(uncaught.throwable), uncaught);
}

/// Invoking an unknown method is a NoSuchMethodError
#[test]
fn test_invoke_missing_method_contract() {
    let vm = empty_engine();
    let mut thread = vm.attach_thread("main");
    let object = vm.find_class("java/lang/Object", LoaderId::BOOTSTRAP).unwrap();
    let uncaught = vm
        .invoke_static(&mut thread, &object, "nothing", "()V", &[])
        .unwrap_err();
    assert_eq!(uncaught.class_name, "java/lang/NoSuchMethodError");
    assert_eq!(thread.depth(), 0);
}
