//! Unit tests for interpreter components

use bytecode_system::{ByteSource, ClassBuilder, Constant, ConstantPool, Opcode};
use core_types::{ErrorKind, ObjectId, VmError};
use interpreter::{
    long_name, mangle, parse_mem_value, short_name, BootstrapLibrary, ClassSource, CodeStream,
    ConfigError, Exception, InMemorySource, NativeLibrary, NativeResolver, Resolved, RuntimePool,
    SourceChain, VmConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_defaults() {
    let config = VmConfig::default();
    assert_eq!(config.stack_size, 256 * 1024);
    assert_eq!(config.min_heap, 1024 * 1024);
    assert_eq!(config.max_heap, 64 * 1024 * 1024);
    assert!(config.quickening);
    assert!(!config.verbose_class);
    assert!(!config.verbose_gc);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_rejects_tiny_stack() {
    let config = VmConfig::default().with_stack_size(16);
    assert!(matches!(config.validate(), Err(ConfigError::Inconsistent(_))));
}

#[test]
fn test_config_rejects_malformed_json() {
    assert!(matches!(
        VmConfig::from_json("{ \"max_heap\": \"lots\" }"),
        Err(ConfigError::Json(_))
    ));
}

#[test]
fn test_memory_suffixes() {
    assert_eq!(parse_mem_value("16k").unwrap(), 16 * 1024);
    assert_eq!(parse_mem_value("64M").unwrap(), 64 * 1024 * 1024);
    let error = parse_mem_value("sixty").unwrap_err();
    assert_eq!(error.to_string(), "invalid memory size `sixty`");
}

// ============================================================================
// Class sources
// ============================================================================

#[test]
fn test_source_chain_prefers_first_source() {
    let first = InMemorySource::new();
    let mut shadow = ClassBuilder::new("demo/Shared");
    shadow.field("first", "I", 0);
    first.add(shadow.build());
    let second = InMemorySource::with_classes([
        ClassBuilder::new("demo/Shared").build(),
        ClassBuilder::new("demo/Other").build(),
    ]);

    let chain = SourceChain::new(vec![Arc::new(first), Arc::new(second)]);
    assert_eq!(chain.find_class("demo/Shared").unwrap().fields.len(), 1);
    assert!(chain.find_class("demo/Other").is_some());
    assert!(chain.find_class("demo/Missing").is_none());
}

#[test]
fn test_bootstrap_library_contents() {
    let library = BootstrapLibrary::new().unwrap();
    for name in [
        "java/lang/Object",
        "java/lang/Class",
        "java/lang/String",
        "java/lang/Throwable",
        "java/lang/Cloneable",
        "java/io/Serializable",
    ] {
        assert!(library.find_class(name).is_some(), "missing {}", name);
    }
    for kind in ErrorKind::ALL {
        assert!(library.find_class(kind.class_name()).is_some());
    }
}

// ============================================================================
// Native symbols
// ============================================================================

#[test]
fn test_jni_symbol_names() {
    assert_eq!(mangle("demo/my_pkg/Io"), "demo_my_1pkg_Io");
    assert_eq!(short_name("java/lang/Object", "hashCode"), "Java_java_lang_Object_hashCode");
    assert_eq!(
        long_name("demo/Io", "write", "(Ljava/lang/String;[I)V"),
        "Java_demo_Io_write__Ljava_lang_String_2_3I"
    );
}

#[test]
fn test_native_library_overloads() {
    let library = NativeLibrary::new();
    library.register_method("demo/Io", "write", Some("(I)V"), |_, _| Ok(None));
    library.register_method("demo/Io", "write", Some("(J)V"), |_, _| Ok(None));
    library.register("Java_demo_Io_flush", |_, _| Ok(None));
    assert_eq!(library.len(), 3);
    assert!(library.resolve("Java_demo_Io_write__I").is_some());
    assert!(library.resolve("Java_demo_Io_write__J").is_some());
    assert!(library.resolve("Java_demo_Io_write").is_none());
    assert!(library.resolve("Java_demo_Io_flush").is_some());
}

// ============================================================================
// Resolution cache
// ============================================================================

fn string_pool() -> RuntimePool {
    let mut symbols = ConstantPool::new();
    let text = symbols.push(Constant::Utf8("hello".into()));
    symbols.push(Constant::String { string_index: text });
    RuntimePool::new(symbols)
}

#[test]
fn test_resolution_is_memoized() {
    let pool = string_pool();
    let mut calls = 0;
    for _ in 0..3 {
        let resolved = pool
            .resolve_with(
                2,
                &mut calls,
                |calls| {
                    *calls += 1;
                    Ok(Resolved::String(ObjectId(5)))
                },
                |_| {},
            )
            .unwrap();
        assert!(matches!(resolved, Resolved::String(ObjectId(5))));
    }
    assert_eq!(calls, 1);
    assert!(pool.is_resolved(2));
    assert_eq!(pool.lookups(), 1);
}

#[test]
fn test_failed_resolution_is_retried() {
    let pool = string_pool();
    let failure = pool.resolve_with(
        2,
        &mut (),
        |_| Err(Exception::Pending(VmError::new(ErrorKind::NoClassDefFoundError))),
        |_| {},
    );
    assert!(failure.is_err());
    assert!(!pool.is_resolved(2));
    assert!(pool.resolved(2).is_none());

    let success = pool.resolve_with(2, &mut (), |_| Ok(Resolved::String(ObjectId(1))), |_| {});
    assert!(success.is_ok());
    assert_eq!(pool.lookups(), 2);
}

#[test]
fn test_racing_threads_share_one_lookup() {
    let pool = Arc::new(string_pool());
    let lookups = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let lookups = Arc::clone(&lookups);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let resolved = pool.resolve_with(
                    2,
                    &mut (),
                    |_| {
                        lookups.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(10));
                        Ok(Resolved::String(ObjectId(9)))
                    },
                    |_| {},
                );
                matches!(resolved, Ok(Resolved::String(ObjectId(9))))
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(lookups.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Code rewriting
// ============================================================================

#[test]
fn test_code_stream_rewrite_in_place() {
    let code = [Opcode::Invokestatic as u8, 0, 4, Opcode::Return as u8];
    let stream = CodeStream::new(&code);
    assert_eq!(stream.code_len(), 4);
    assert!(stream.still(0, Opcode::Invokestatic));

    stream.rewrite(0, Opcode::InvokestaticQuick, &[0, 4]);
    assert!(!stream.still(0, Opcode::Invokestatic));
    assert_eq!(stream.opcode_at(0), Some(Opcode::InvokestaticQuick));
    assert_eq!(stream.u16_at(1), Some(4));
    assert_eq!(stream.opcode_at(3), Some(Opcode::Return));
}
