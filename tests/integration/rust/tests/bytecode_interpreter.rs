//! Bytecode System and Interpreter Integration Tests
//!
//! Programs are assembled with the bytecode builders and executed by the
//! interpreter, both with and without instruction rewriting.

use bytecode_system::access::{ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC};
use bytecode_system::{ClassBuilder, ClassFile, CodeBuilder, Opcode};
use core_types::{LoaderId, Value};
use integration_tests::engine_with;
use interpreter::VmConfig;

const PUBLIC_STATIC: u16 = ACC_PUBLIC | ACC_STATIC;
const T_INT: u8 = 10;

/// `demo/Programs`: small numeric routines.
fn programs() -> ClassFile {
    let mut class = ClassBuilder::new("demo/Programs");
    class.source_file("Programs.java");

    // static int sum(int n) { int s = 0; for (int i = 1; i <= n; i++) s += i; return s; }
    let mut sum = CodeBuilder::new();
    let head = sum.new_label();
    let done = sum.new_label();
    sum.op(Opcode::Iconst0)
        .op(Opcode::Istore1)
        .op(Opcode::Iconst1)
        .op(Opcode::Istore2)
        .bind(head)
        .op(Opcode::Iload2)
        .op(Opcode::Iload0)
        .branch(Opcode::IfIcmpgt, done)
        .op(Opcode::Iload1)
        .op(Opcode::Iload2)
        .op(Opcode::Iadd)
        .op(Opcode::Istore1)
        .iinc(2, 1)
        .branch(Opcode::Goto, head)
        .bind(done)
        .op(Opcode::Iload1)
        .op(Opcode::Ireturn);
    class.method("sum", "(I)I", PUBLIC_STATIC, sum.build(2, 3).unwrap());

    // static long fact(long n) { return n > 1 ? n * fact(n - 1) : 1; }
    let fact_ref = class.method_ref("demo/Programs", "fact", "(J)J");
    let mut fact = CodeBuilder::new();
    let recurse = fact.new_label();
    fact.op(Opcode::Lload0)
        .op(Opcode::Lconst1)
        .op(Opcode::Lcmp)
        .branch(Opcode::Ifgt, recurse)
        .op(Opcode::Lconst1)
        .op(Opcode::Lreturn)
        .bind(recurse)
        .op(Opcode::Lload0)
        .op(Opcode::Lload0)
        .op(Opcode::Lconst1)
        .op(Opcode::Lsub)
        .op_u16(Opcode::Invokestatic, fact_ref)
        .op(Opcode::Lmul)
        .op(Opcode::Lreturn);
    class.method("fact", "(J)J", PUBLIC_STATIC, fact.build(6, 2).unwrap());

    // static int grade(int code) { switch (code) { case 1: 10; case 5: 50; case 100: 1000; default: -1 } }
    let mut grade = CodeBuilder::new();
    let one = grade.new_label();
    let five = grade.new_label();
    let hundred = grade.new_label();
    let other = grade.new_label();
    grade
        .op(Opcode::Iload0)
        .lookupswitch(other, &[(1, one), (5, five), (100, hundred)])
        .bind(one)
        .bipush(10)
        .op(Opcode::Ireturn)
        .bind(five)
        .bipush(50)
        .op(Opcode::Ireturn)
        .bind(hundred)
        .sipush(1000)
        .op(Opcode::Ireturn)
        .bind(other)
        .op(Opcode::IconstM1)
        .op(Opcode::Ireturn);
    class.method("grade", "(I)I", PUBLIC_STATIC, grade.build(1, 1).unwrap());

    // static int squares(int n) { int[] a = new int[n]; fill with i*i; return sum of a; }
    let mut squares = CodeBuilder::new();
    let fill = squares.new_label();
    let filled = squares.new_label();
    let add = squares.new_label();
    let added = squares.new_label();
    squares
        .op(Opcode::Iload0)
        .op_u8(Opcode::Newarray, T_INT)
        .op(Opcode::Astore1)
        .op(Opcode::Iconst0)
        .op(Opcode::Istore2)
        .bind(fill)
        .op(Opcode::Iload2)
        .op(Opcode::Iload0)
        .branch(Opcode::IfIcmpge, filled)
        .op(Opcode::Aload1)
        .op(Opcode::Iload2)
        .op(Opcode::Iload2)
        .op(Opcode::Iload2)
        .op(Opcode::Imul)
        .op(Opcode::Iastore)
        .iinc(2, 1)
        .branch(Opcode::Goto, fill)
        .bind(filled)
        .op(Opcode::Iconst0)
        .op(Opcode::Istore3)
        .op(Opcode::Iconst0)
        .op(Opcode::Istore2)
        .bind(add)
        .op(Opcode::Iload2)
        .op(Opcode::Aload1)
        .op(Opcode::Arraylength)
        .branch(Opcode::IfIcmpge, added)
        .op(Opcode::Iload3)
        .op(Opcode::Aload1)
        .op(Opcode::Iload2)
        .op(Opcode::Iaload)
        .op(Opcode::Iadd)
        .op(Opcode::Istore3)
        .iinc(2, 1)
        .branch(Opcode::Goto, add)
        .bind(added)
        .op(Opcode::Iload3)
        .op(Opcode::Ireturn);
    class.method("squares", "(I)I", PUBLIC_STATIC, squares.build(4, 4).unwrap());

    // static double mean(int a, int b) { return (a + b) / 2.0; }
    let two = class.double(2.0);
    let mut mean = CodeBuilder::new();
    mean.op(Opcode::Iload0)
        .op(Opcode::Iload1)
        .op(Opcode::Iadd)
        .op(Opcode::I2d)
        .op_u16(Opcode::Ldc2W, two)
        .op(Opcode::Ddiv)
        .op(Opcode::Dreturn);
    class.method("mean", "(II)D", PUBLIC_STATIC, mean.build(4, 2).unwrap());

    class.build()
}

/// `demo/Sequence`: a static counter seeded by its initializer.
fn sequence() -> ClassFile {
    let mut class = ClassBuilder::new("demo/Sequence");
    class.field("next", "I", ACC_PRIVATE | ACC_STATIC);
    let next = class.field_ref("demo/Sequence", "next", "I");

    let mut clinit = CodeBuilder::new();
    clinit
        .bipush(100)
        .op_u16(Opcode::Putstatic, next)
        .op(Opcode::Return);
    class.method("<clinit>", "()V", ACC_STATIC, clinit.build(1, 0).unwrap());

    let mut take = CodeBuilder::new();
    take.op_u16(Opcode::Getstatic, next)
        .op(Opcode::Dup)
        .op(Opcode::Iconst1)
        .op(Opcode::Iadd)
        .op_u16(Opcode::Putstatic, next)
        .op(Opcode::Ireturn);
    class.method("take", "()I", PUBLIC_STATIC, take.build(3, 0).unwrap());

    let hello = class.string("hello");
    let mut greeting = CodeBuilder::new();
    greeting.op_u16(Opcode::LdcW, hello).op(Opcode::Areturn);
    class.method("greeting", "()Ljava/lang/String;", PUBLIC_STATIC, greeting.build(1, 0).unwrap());
    class.build()
}

/// `demo/Tally`: an instance counter.
fn tally() -> ClassFile {
    let mut class = ClassBuilder::new("demo/Tally");
    class.field("count", "I", ACC_PRIVATE);
    let count = class.field_ref("demo/Tally", "count", "I");
    let super_init = class.method_ref("java/lang/Object", "<init>", "()V");

    let mut init = CodeBuilder::new();
    init.op(Opcode::Aload0)
        .op_u16(Opcode::Invokespecial, super_init)
        .op(Opcode::Return);
    class.method("<init>", "()V", ACC_PUBLIC, init.build(1, 1).unwrap());

    let mut bump = CodeBuilder::new();
    bump.op(Opcode::Aload0)
        .op(Opcode::Dup)
        .op_u16(Opcode::Getfield, count)
        .op(Opcode::Iload1)
        .op(Opcode::Iadd)
        .op_u16(Opcode::Putfield, count)
        .op(Opcode::Aload0)
        .op_u16(Opcode::Getfield, count)
        .op(Opcode::Ireturn);
    class.method("bump", "(I)I", ACC_PUBLIC, bump.build(3, 2).unwrap());
    class.build()
}

fn configs() -> [VmConfig; 2] {
    [
        VmConfig::default(),
        VmConfig::default().with_quickening(false),
    ]
}

/// Test: Loops, recursion, switches and arrays compute the same results in
/// both execution modes
#[test]
fn test_numeric_programs() {
    for config in configs() {
        let vm = engine_with(config, vec![programs()]);
        let mut thread = vm.attach_thread("main");
        let class = vm.load_class("demo/Programs", LoaderId::BOOTSTRAP).unwrap();
        let mut call = |name: &str, descriptor: &str, args: &[Value]| {
            vm.invoke_static(&mut thread, &class, name, descriptor, args)
                .unwrap()
                .unwrap()
        };

        // Run twice so the second pass goes through rewritten instructions.
        for _ in 0..2 {
            assert_eq!(call("sum", "(I)I", &[Value::Int(100)]), Value::Int(5050));
            assert_eq!(call("sum", "(I)I", &[Value::Int(0)]), Value::Int(0));
            assert_eq!(
                call("fact", "(J)J", &[Value::Long(20)]),
                Value::Long(2_432_902_008_176_640_000)
            );
            assert_eq!(call("grade", "(I)I", &[Value::Int(5)]), Value::Int(50));
            assert_eq!(call("grade", "(I)I", &[Value::Int(100)]), Value::Int(1000));
            assert_eq!(call("grade", "(I)I", &[Value::Int(7)]), Value::Int(-1));
            assert_eq!(call("squares", "(I)I", &[Value::Int(10)]), Value::Int(285));
            assert_eq!(
                call("mean", "(II)D", &[Value::Int(3), Value::Int(4)]),
                Value::Double(3.5)
            );
        }
    }
}

/// Test: Static state is seeded once by the initializer and then shared
#[test]
fn test_static_counter() {
    for config in configs() {
        let vm = engine_with(config, vec![sequence()]);
        let mut thread = vm.attach_thread("main");
        let class = vm.load_class("demo/Sequence", LoaderId::BOOTSTRAP).unwrap();

        for expected in 100..105 {
            let taken = vm.invoke_static(&mut thread, &class, "take", "()I", &[]).unwrap();
            assert_eq!(taken, Some(Value::Int(expected)));
        }
        assert_eq!(vm.get_static(&mut thread, &class, "next").unwrap(), Value::Int(105));
    }
}

/// Test: A string constant resolves to one interned object
#[test]
fn test_string_constant_identity() {
    for config in configs() {
        let vm = engine_with(config, vec![sequence()]);
        let mut thread = vm.attach_thread("main");
        let class = vm.load_class("demo/Sequence", LoaderId::BOOTSTRAP).unwrap();
        let descriptor = "()Ljava/lang/String;";

        let first = vm.invoke_static(&mut thread, &class, "greeting", descriptor, &[]).unwrap();
        let second = vm.invoke_static(&mut thread, &class, "greeting", descriptor, &[]).unwrap();
        assert_eq!(first, second);
        let string = first.and_then(|value| value.object()).unwrap();
        assert_eq!(vm.string_value(string).as_deref(), Some("hello"));
    }
}

/// Test: Instance fields are read and written through virtual calls
#[test]
fn test_instance_fields() {
    for config in configs() {
        let vm = engine_with(config, vec![tally()]);
        let mut thread = vm.attach_thread("main");
        let class = vm.load_class("demo/Tally", LoaderId::BOOTSTRAP).unwrap();
        let tally = vm.new_instance(&mut thread, &class, "()V", &[]).unwrap();
        vm.new_global_ref(tally);

        let mut last = None;
        for step in 1..=4 {
            last = vm
                .invoke_virtual(&mut thread, tally, "bump", "(I)I", &[Value::Int(step)])
                .unwrap();
        }
        assert_eq!(last, Some(Value::Int(10)));
        assert_eq!(vm.get_field(tally, "count").unwrap(), Value::Int(10));
        assert!(vm.delete_global_ref(tally));
    }
}
