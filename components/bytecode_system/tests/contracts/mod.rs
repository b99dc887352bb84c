//! Contract compliance tests for bytecode_system
//! Verifies the parser-facing data model the engine consumes

use bytecode_system::constant_pool::tag;
use bytecode_system::{
    access, ByteSource, ClassBuilder, ClassFile, CodeAttribute, Constant, ConstantPool,
    ExceptionTableEntry, FieldInfo, MethodInfo, Opcode,
};

/// Constant-pool tags keep their class-file values
#[test]
fn test_contract_constant_tags() {
    assert_eq!(tag::UTF8, 1);
    assert_eq!(tag::INTEGER, 3);
    assert_eq!(tag::FLOAT, 4);
    assert_eq!(tag::LONG, 5);
    assert_eq!(tag::DOUBLE, 6);
    assert_eq!(tag::CLASS, 7);
    assert_eq!(tag::STRING, 8);
    assert_eq!(tag::FIELDREF, 9);
    assert_eq!(tag::METHODREF, 10);
    assert_eq!(tag::INTERFACE_METHODREF, 11);
    assert_eq!(tag::NAME_AND_TYPE, 12);
}

/// Access flags keep their class-file values
#[test]
fn test_contract_access_flags() {
    assert_eq!(access::ACC_PUBLIC, 0x0001);
    assert_eq!(access::ACC_PRIVATE, 0x0002);
    assert_eq!(access::ACC_STATIC, 0x0008);
    assert_eq!(access::ACC_SYNCHRONIZED, 0x0020);
    assert_eq!(access::ACC_NATIVE, 0x0100);
    assert_eq!(access::ACC_INTERFACE, 0x0200);
    assert_eq!(access::ACC_ABSTRACT, 0x0400);
}

/// A class descriptor can be built by hand, as a parser would
#[test]
fn test_contract_class_file_fields() {
    let mut pool = ConstantPool::new();
    let name = pool.push(Constant::Utf8("demo/Empty".into()));
    pool.push(Constant::Class { name_index: name });

    let file = ClassFile {
        name: "demo/Empty".to_string(),
        super_name: Some("java/lang/Object".to_string()),
        interfaces: vec![],
        access_flags: access::ACC_PUBLIC,
        constant_pool: pool,
        fields: vec![FieldInfo {
            name: "x".to_string(),
            descriptor: "I".to_string(),
            access_flags: 0,
        }],
        methods: vec![MethodInfo {
            name: "<init>".to_string(),
            descriptor: "()V".to_string(),
            access_flags: access::ACC_PUBLIC,
            code: Some(CodeAttribute {
                max_stack: 0,
                max_locals: 1,
                code: vec![Opcode::Return as u8],
                exception_table: vec![ExceptionTableEntry {
                    start_pc: 0,
                    end_pc: 1,
                    handler_pc: 0,
                    catch_type: 0,
                }],
                line_numbers: vec![],
            }),
        }],
        source_file: None,
    };
    assert!(!file.is_interface());
    assert_eq!(file.constant_pool.class_name(2), Some("demo/Empty"));
}

/// Builders produce the same model
#[test]
fn test_contract_builder_output() {
    let file = ClassBuilder::new("demo/Empty").build();
    assert_eq!(file.name, "demo/Empty");
    assert_eq!(file.constant_pool.len(), 1);
}

/// Byte slices are code sources
#[test]
fn test_contract_byte_source() {
    let code: &[u8] = &[0x10, 0xff];
    assert_eq!(code.i8_at(1), Some(-1));
    assert_eq!(code.code_len(), 2);
}
