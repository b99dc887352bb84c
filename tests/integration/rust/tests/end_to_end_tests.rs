//! End-to-End Tests
//!
//! Whole programs started through `run_main`: configuration, class loading
//! across loaders, native methods, concurrent execution and uncaught
//! exceptions.

use bytecode_system::access::{ACC_NATIVE, ACC_PUBLIC, ACC_STATIC};
use bytecode_system::{ClassBuilder, ClassFile, CodeBuilder, Opcode};
use core_types::{LoaderId, Value};
use integration_tests::{engine, engine_with};
use interpreter::{InMemorySource, VmConfig};
use std::sync::{Arc, Mutex};
use std::thread;

const PUBLIC_STATIC: u16 = ACC_PUBLIC | ACC_STATIC;
const MAIN: &str = "([Ljava/lang/String;)V";

/// `demo/Fib` with a recursive `fib(I)I`.
fn fib() -> ClassFile {
    let mut class = ClassBuilder::new("demo/Fib");
    let fib_ref = class.method_ref("demo/Fib", "fib", "(I)I");
    let mut code = CodeBuilder::new();
    let recurse = code.new_label();
    code.op(Opcode::Iload0)
        .op(Opcode::Iconst2)
        .branch(Opcode::IfIcmpge, recurse)
        .op(Opcode::Iload0)
        .op(Opcode::Ireturn)
        .bind(recurse)
        .op(Opcode::Iload0)
        .op(Opcode::Iconst1)
        .op(Opcode::Isub)
        .op_u16(Opcode::Invokestatic, fib_ref)
        .op(Opcode::Iload0)
        .op(Opcode::Iconst2)
        .op(Opcode::Isub)
        .op_u16(Opcode::Invokestatic, fib_ref)
        .op(Opcode::Iadd)
        .op(Opcode::Ireturn);
    class.method("fib", "(I)I", PUBLIC_STATIC, code.build(3, 1).unwrap());
    class.build()
}

/// `demo/Report`: main passes `fib(args.length * 5)` to a native sink.
fn report() -> ClassFile {
    let mut class = ClassBuilder::new("demo/Report");
    class.source_file("Report.java");
    class.bodiless_method("emit", "(I)V", PUBLIC_STATIC | ACC_NATIVE);
    let fib_ref = class.method_ref("demo/Fib", "fib", "(I)I");
    let emit = class.method_ref("demo/Report", "emit", "(I)V");

    let mut main = CodeBuilder::new();
    main.line(5)
        .op(Opcode::Aload0)
        .op(Opcode::Arraylength)
        .op(Opcode::Iconst5)
        .op(Opcode::Imul)
        .line(6)
        .op_u16(Opcode::Invokestatic, fib_ref)
        .op_u16(Opcode::Invokestatic, emit)
        .op(Opcode::Return);
    class.method("main", MAIN, PUBLIC_STATIC, main.build(2, 1).unwrap());
    class.build()
}

/// `demo/Crash`: main calls a helper that dereferences null.
fn crash() -> ClassFile {
    let mut class = ClassBuilder::new("demo/Crash");
    class.source_file("Crash.java");
    let helper = class.method_ref("demo/Crash", "helper", "()I");

    let mut code = CodeBuilder::new();
    code.line(10)
        .op(Opcode::AconstNull)
        .op(Opcode::Arraylength)
        .op(Opcode::Ireturn);
    class.method("helper", "()I", ACC_STATIC, code.build(1, 0).unwrap());

    let mut main = CodeBuilder::new();
    main.line(3)
        .op_u16(Opcode::Invokestatic, helper)
        .op(Opcode::Pop)
        .op(Opcode::Return);
    class.method("main", MAIN, PUBLIC_STATIC, main.build(1, 1).unwrap());
    class.build()
}

/// Test: A program configured from JSON runs to completion and reaches a
/// native method
#[test]
fn test_run_main_with_native_sink() {
    let config = VmConfig::from_json(r#"{ "stack_size": 131072, "verbose_class": true }"#).unwrap();
    let vm = engine_with(config, vec![fib(), report()]);
    let emitted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&emitted);
    vm.native_library()
        .register_method("demo/Report", "emit", None, move |_, args| {
            sink.lock().unwrap().push(args[0]);
            Ok(None)
        });

    let mut thread = vm.attach_thread("main");
    vm.run_main(&mut thread, "demo/Report", &["a", "b", "c"]).unwrap();
    vm.run_main(&mut thread, "demo/Report", &[]).unwrap();
    assert_eq!(*emitted.lock().unwrap(), vec![Value::Int(610), Value::Int(0)]);
    assert_eq!(thread.depth(), 0);
}

/// Test: An exception escaping main reports the full backtrace
#[test]
fn test_uncaught_exception_from_main() {
    let vm = engine(vec![crash()]);
    let mut thread = vm.attach_thread("main");

    let uncaught = vm.run_main(&mut thread, "demo/Crash", &[]).unwrap_err();
    assert_eq!(uncaught.class_name, "java/lang/NullPointerException");
    let frames: Vec<String> = uncaught.stack_trace.iter().map(|f| f.to_string()).collect();
    assert_eq!(
        frames,
        vec![
            "demo.Crash.helper(Crash.java:10)".to_string(),
            "demo.Crash.main(Crash.java:3)".to_string(),
        ]
    );

    let missing = vm.run_main(&mut thread, "demo/Absent", &[]).unwrap_err();
    assert_eq!(missing.class_name, "java/lang/NoClassDefFoundError");
}

/// Test: Threads racing through the same code observe the same results
/// while its instructions are being rewritten
#[test]
fn test_concurrent_execution_of_shared_code() {
    let vm = engine(vec![fib()]);
    let handles: Vec<_> = (0..4)
        .map(|index| {
            let vm = vm.clone();
            thread::spawn(move || {
                let mut thread = vm.attach_thread(&format!("fib-{}", index));
                let class = vm.load_class("demo/Fib", LoaderId::BOOTSTRAP).unwrap();
                (0..16)
                    .map(|n| {
                        vm.invoke_static(&mut thread, &class, "fib", "(I)I", &[Value::Int(n)])
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let expected: Vec<_> = [0, 1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233, 377, 610]
        .into_iter()
        .map(|n| Some(Value::Int(n)))
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

/// Test: A class defined by a user loader links against bootstrap classes
#[test]
fn test_user_loader_program() {
    let vm = engine(vec![fib()]);
    let mut plugin = ClassBuilder::new("plugin/Entry");
    let fib_ref = plugin.method_ref("demo/Fib", "fib", "(I)I");
    let mut code = CodeBuilder::new();
    code.bipush(12)
        .op_u16(Opcode::Invokestatic, fib_ref)
        .op(Opcode::Ireturn);
    plugin.method("run", "()I", PUBLIC_STATIC, code.build(1, 0).unwrap());

    let loader = vm.add_loader(Arc::new(InMemorySource::with_classes([plugin.build()])));
    let mut thread = vm.attach_thread("main");
    let entry = vm.load_class("plugin/Entry", loader).unwrap();
    let result = vm.invoke_static(&mut thread, &entry, "run", "()I", &[]).unwrap();
    assert_eq!(result, Some(Value::Int(144)));

    let fib = vm.find_class("demo/Fib", LoaderId::BOOTSTRAP).unwrap();
    assert!(fib.is_initialized());
    let seen_by_plugin = vm.find_class("demo/Fib", loader).unwrap();
    assert!(Arc::ptr_eq(&fib, &seen_by_plugin));
    assert_eq!(seen_by_plugin.loader(), LoaderId::BOOTSTRAP);
}
