//! Tests for the class and code assemblers

use bytecode_system::access::{ACC_ABSTRACT, ACC_INTERFACE, ACC_NATIVE, ACC_PUBLIC};
use bytecode_system::instruction::{instruction_length, table_switch_offset};
use bytecode_system::{ClassBuilder, CodeBuilder, Constant, Opcode};

#[test]
fn test_tableswitch_layout() {
    let mut code = CodeBuilder::new();
    code.op(Opcode::Iload0);
    let labels: Vec<_> = (0..4).map(|_| code.new_label()).collect();
    code.tableswitch(0, 2, labels[3], &labels[..3]);
    for label in &labels {
        code.bind(*label).op(Opcode::Return);
    }
    let attribute = code.build(1, 1).unwrap();

    // opcode at pc 1, padding to pc 4, then default/low/high and three offsets
    let length = instruction_length(&attribute.code, 1).unwrap();
    assert_eq!(length, 3 + 12 + 12);
    assert_eq!(table_switch_offset(&attribute.code, 1, 0), Some(length as i32));
    assert_eq!(table_switch_offset(&attribute.code, 1, 2), Some(length as i32 + 2));
    assert_eq!(table_switch_offset(&attribute.code, 1, -1), Some(length as i32 + 3));
    assert_eq!(table_switch_offset(&attribute.code, 1, 5), Some(length as i32 + 3));
}

#[test]
fn test_exception_table_and_lines() {
    let mut class = ClassBuilder::new("demo/Guard");
    let catch_type = class.class_ref("java/lang/ArithmeticException");
    let mut code = CodeBuilder::new();
    let (start, end, handler) = (code.new_label(), code.new_label(), code.new_label());
    code.line(10).bind(start);
    code.op(Opcode::Iconst1).op(Opcode::Iconst0).op(Opcode::Idiv).op(Opcode::Ireturn);
    code.bind(end).line(11).bind(handler);
    code.op(Opcode::Pop).op(Opcode::IconstM1).op(Opcode::Ireturn);
    code.handler(start, end, handler, catch_type);
    let attribute = code.build(2, 0).unwrap();

    assert_eq!(attribute.exception_table.len(), 1);
    let entry = attribute.exception_table[0];
    assert_eq!((entry.start_pc, entry.end_pc, entry.handler_pc), (0, 4, 4));
    assert_eq!(entry.catch_type, catch_type);
    assert_eq!(attribute.line_numbers.len(), 2);
    assert_eq!(attribute.line_numbers[1].start_pc, 4);
}

#[test]
fn test_push_int_picks_shortest_form() {
    let mut code = CodeBuilder::new();
    code.push_int(-1).push_int(5).push_int(100).push_int(1000);
    let attribute = code.build(4, 0).unwrap();
    assert_eq!(
        attribute.code,
        vec![0x02, 0x08, 0x10, 100, 0x11, 0x03, 0xe8]
    );
}

#[test]
fn test_interface_and_bodiless_methods() {
    let mut class = ClassBuilder::new("demo/Shape");
    class
        .access(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT)
        .bodiless_method("area", "()D", ACC_PUBLIC | ACC_ABSTRACT)
        .bodiless_method("native0", "()V", ACC_NATIVE);
    let file = class.build();
    assert!(file.is_interface());
    assert!(file.method("area", "()D").unwrap().is_abstract());
    assert!(file.method("native0", "()V").unwrap().is_native());
}

#[test]
fn test_long_constant_takes_two_slots() {
    let mut class = ClassBuilder::new("demo/Big");
    let long = class.long(1 << 40);
    let after = class.integer(7);
    assert_eq!(after, long + 2);
    let file = class.build();
    assert_eq!(file.constant_pool.get(long), Some(&Constant::Long(1 << 40)));
}
