//! Classes every engine starts with.
//!
//! The library is assembled in code: the root class, `java/lang/Class`,
//! `java/lang/String`, the two interfaces every array implements, and the
//! throwable hierarchy the engine itself raises.

use crate::loader::ClassSource;
use bytecode_system::access::{
    ACC_ABSTRACT, ACC_FINAL, ACC_INTERFACE, ACC_NATIVE, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC,
    ACC_SUPER,
};
use bytecode_system::{BuildError, ClassBuilder, ClassFile, CodeBuilder, Opcode};
use core_types::ErrorKind;
use std::collections::HashMap;

pub(crate) const CLASS: &str = "java/lang/Class";
pub(crate) const STRING: &str = "java/lang/String";
pub(crate) const THROWABLE: &str = "java/lang/Throwable";
pub(crate) const ERROR: &str = "java/lang/Error";
pub(crate) const CHAR_ARRAY: &str = "[C";

const OBJECT: &str = "java/lang/Object";
const STRING_DESC: &str = "Ljava/lang/String;";
const THROWABLE_DESC: &str = "Ljava/lang/Throwable;";

/// Intermediate throwable classes and their superclasses.
const HIERARCHY: &[(&str, &str)] = &[
    ("java/lang/Exception", THROWABLE),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    (ERROR, THROWABLE),
    ("java/lang/LinkageError", ERROR),
    ("java/lang/VirtualMachineError", ERROR),
    (
        "java/lang/IndexOutOfBoundsException",
        "java/lang/RuntimeException",
    ),
];

/// The bootstrap class library.
#[derive(Debug, Clone)]
pub struct BootstrapLibrary {
    classes: HashMap<String, ClassFile>,
}

impl BootstrapLibrary {
    /// Assembles the library.
    pub fn new() -> Result<Self, BuildError> {
        let mut files = vec![
            object()?,
            class_class(),
            string()?,
            marker_interface("java/lang/Cloneable"),
            marker_interface("java/io/Serializable"),
            throwable()?,
        ];
        for (name, super_name) in HIERARCHY {
            files.push(throwable_subclass(name, super_name)?);
        }
        for kind in ErrorKind::ALL {
            files.push(throwable_subclass(kind.class_name(), kind.superclass_name())?);
        }
        Ok(BootstrapLibrary {
            classes: files.into_iter().map(|f| (f.name.clone(), f)).collect(),
        })
    }

    /// Names of every class in the library, sorted.
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.keys().cloned().collect();
        names.sort();
        names
    }
}

impl ClassSource for BootstrapLibrary {
    fn find_class(&self, name: &str) -> Option<ClassFile> {
        self.classes.get(name).cloned()
    }
}

fn source_name(class: &str) -> String {
    let simple = class.rsplit('/').next().unwrap_or(class);
    format!("{}.java", simple)
}

fn object() -> Result<ClassFile, BuildError> {
    let mut class = ClassBuilder::new(OBJECT);
    class.source_file(&source_name(OBJECT));

    let mut init = CodeBuilder::new();
    init.op(Opcode::Return);
    class.method("<init>", "()V", ACC_PUBLIC, init.build(0, 1)?);

    let mut equals = CodeBuilder::new();
    let different = equals.new_label();
    equals
        .op(Opcode::Aload0)
        .op(Opcode::Aload1)
        .branch(Opcode::IfAcmpne, different)
        .op(Opcode::Iconst1)
        .op(Opcode::Ireturn)
        .bind(different)
        .op(Opcode::Iconst0)
        .op(Opcode::Ireturn);
    class.method(
        "equals",
        "(Ljava/lang/Object;)Z",
        ACC_PUBLIC,
        equals.build(2, 2)?,
    );

    let native = ACC_PUBLIC | ACC_NATIVE;
    let final_native = native | ACC_FINAL;
    class
        .bodiless_method("hashCode", "()I", native)
        .bodiless_method("getClass", "()Ljava/lang/Class;", final_native)
        .bodiless_method("wait", "()V", final_native)
        .bodiless_method("wait", "(J)V", final_native)
        .bodiless_method("notify", "()V", final_native)
        .bodiless_method("notifyAll", "()V", final_native);

    let mut finalize = CodeBuilder::new();
    finalize.op(Opcode::Return);
    class.method("finalize", "()V", ACC_PROTECTED, finalize.build(0, 1)?);
    Ok(class.build())
}

fn class_class() -> ClassFile {
    let mut class = ClassBuilder::new(CLASS);
    class
        .access(ACC_PUBLIC | ACC_FINAL | ACC_SUPER)
        .source_file(&source_name(CLASS));
    class.build()
}

fn string() -> Result<ClassFile, BuildError> {
    let mut class = ClassBuilder::new(STRING);
    class
        .access(ACC_PUBLIC | ACC_FINAL | ACC_SUPER)
        .interface("java/io/Serializable")
        .source_file(&source_name(STRING))
        .field("value", CHAR_ARRAY, ACC_PRIVATE | ACC_FINAL);
    let value = class.field_ref(STRING, "value", CHAR_ARRAY);
    let super_init = class.method_ref(OBJECT, "<init>", "()V");

    let mut init = CodeBuilder::new();
    init.op(Opcode::Aload0)
        .op_u16(Opcode::Invokespecial, super_init)
        .op(Opcode::Aload0)
        .op(Opcode::Aload1)
        .op_u16(Opcode::Putfield, value)
        .op(Opcode::Return);
    class.method("<init>", "([C)V", ACC_PUBLIC, init.build(2, 2)?);

    let mut length = CodeBuilder::new();
    length
        .op(Opcode::Aload0)
        .op_u16(Opcode::Getfield, value)
        .op(Opcode::Arraylength)
        .op(Opcode::Ireturn);
    class.method("length", "()I", ACC_PUBLIC, length.build(1, 1)?);

    let mut char_at = CodeBuilder::new();
    char_at
        .op(Opcode::Aload0)
        .op_u16(Opcode::Getfield, value)
        .op(Opcode::Iload1)
        .op(Opcode::Caload)
        .op(Opcode::Ireturn);
    class.method("charAt", "(I)C", ACC_PUBLIC, char_at.build(2, 2)?);
    Ok(class.build())
}

fn marker_interface(name: &str) -> ClassFile {
    let mut class = ClassBuilder::new(name);
    class
        .access(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT)
        .source_file(&source_name(name));
    class.build()
}

fn throwable() -> Result<ClassFile, BuildError> {
    let mut class = ClassBuilder::new(THROWABLE);
    class
        .interface("java/io/Serializable")
        .source_file(&source_name(THROWABLE))
        .field("message", STRING_DESC, ACC_PRIVATE)
        .field("cause", THROWABLE_DESC, ACC_PRIVATE);
    let message = class.field_ref(THROWABLE, "message", STRING_DESC);
    let cause = class.field_ref(THROWABLE, "cause", THROWABLE_DESC);
    let super_init = class.method_ref(OBJECT, "<init>", "()V");

    let mut init = CodeBuilder::new();
    init.op(Opcode::Aload0)
        .op_u16(Opcode::Invokespecial, super_init)
        .op(Opcode::Return);
    class.method("<init>", "()V", ACC_PUBLIC, init.build(1, 1)?);

    let mut init = CodeBuilder::new();
    init.op(Opcode::Aload0)
        .op_u16(Opcode::Invokespecial, super_init)
        .op(Opcode::Aload0)
        .op(Opcode::Aload1)
        .op_u16(Opcode::Putfield, message)
        .op(Opcode::Return);
    class.method("<init>", "(Ljava/lang/String;)V", ACC_PUBLIC, init.build(2, 2)?);

    let mut init = CodeBuilder::new();
    init.op(Opcode::Aload0)
        .op_u16(Opcode::Invokespecial, super_init)
        .op(Opcode::Aload0)
        .op(Opcode::Aload1)
        .op_u16(Opcode::Putfield, message)
        .op(Opcode::Aload0)
        .op(Opcode::Aload2)
        .op_u16(Opcode::Putfield, cause)
        .op(Opcode::Return);
    class.method(
        "<init>",
        "(Ljava/lang/String;Ljava/lang/Throwable;)V",
        ACC_PUBLIC,
        init.build(2, 3)?,
    );

    for (name, field, descriptor) in [
        ("getMessage", message, "()Ljava/lang/String;"),
        ("getCause", cause, "()Ljava/lang/Throwable;"),
    ] {
        let mut getter = CodeBuilder::new();
        getter
            .op(Opcode::Aload0)
            .op_u16(Opcode::Getfield, field)
            .op(Opcode::Areturn);
        class.method(name, descriptor, ACC_PUBLIC, getter.build(1, 1)?);
    }
    Ok(class.build())
}

/// A throwable class whose constructors only delegate to its superclass.
fn throwable_subclass(name: &str, super_name: &str) -> Result<ClassFile, BuildError> {
    let mut class = ClassBuilder::new(name);
    class
        .super_class(Some(super_name))
        .source_file(&source_name(name));

    let no_args = class.method_ref(super_name, "<init>", "()V");
    let mut init = CodeBuilder::new();
    init.op(Opcode::Aload0)
        .op_u16(Opcode::Invokespecial, no_args)
        .op(Opcode::Return);
    class.method("<init>", "()V", ACC_PUBLIC, init.build(1, 1)?);

    let with_message = class.method_ref(super_name, "<init>", "(Ljava/lang/String;)V");
    let mut init = CodeBuilder::new();
    init.op(Opcode::Aload0)
        .op(Opcode::Aload1)
        .op_u16(Opcode::Invokespecial, with_message)
        .op(Opcode::Return);
    class.method("<init>", "(Ljava/lang/String;)V", ACC_PUBLIC, init.build(2, 2)?);
    Ok(class.build())
}
