//! Programmatic class assembly.
//!
//! [`ClassBuilder`] interns constant-pool entries and collects members;
//! [`CodeBuilder`] emits instructions with symbolic labels and patches
//! branch offsets when the method is finished.

use crate::access::{ACC_PUBLIC, ACC_SUPER};
use crate::class_file::{
    ClassFile, CodeAttribute, ExceptionTableEntry, FieldInfo, LineNumberEntry, MethodInfo,
};
use crate::constant_pool::{Constant, ConstantPool};
use crate::instruction::switch_operands;
use crate::opcode::Opcode;
use std::collections::HashMap;
use thiserror::Error;

/// Failure to finish a method body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A branch targets a label that was never bound
    #[error("label {0} was never bound")]
    UnboundLabel(usize),
    /// A 16-bit branch cannot reach its target
    #[error("branch at pc {at} cannot reach pc {target}")]
    BranchOutOfRange {
        /// Pc of the branching instruction
        at: usize,
        /// Pc of the target
        target: usize,
    },
    /// The method is larger than a class file allows
    #[error("code length {0} exceeds 65535 bytes")]
    CodeTooLarge(usize),
}

/// A branch target inside a [`CodeBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Clone, Copy)]
enum Patch {
    Short { at: usize, origin: usize, label: Label },
    Wide { at: usize, origin: usize, label: Label },
}

#[derive(Debug, Clone, Copy)]
struct Handler {
    start: Label,
    end: Label,
    handler: Label,
    catch_type: u16,
}

/// Emits one method body.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    code: Vec<u8>,
    labels: Vec<Option<usize>>,
    patches: Vec<Patch>,
    handlers: Vec<Handler>,
    lines: Vec<LineNumberEntry>,
}

impl CodeBuilder {
    /// Creates an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current emission offset.
    pub fn pc(&self) -> usize {
        self.code.len()
    }

    /// Emits an operand-less instruction.
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.code.push(opcode as u8);
        self
    }

    /// Emits an instruction with one unsigned byte operand.
    pub fn op_u8(&mut self, opcode: Opcode, operand: u8) -> &mut Self {
        self.code.extend_from_slice(&[opcode as u8, operand]);
        self
    }

    /// Emits an instruction with one 16-bit operand.
    pub fn op_u16(&mut self, opcode: Opcode, operand: u16) -> &mut Self {
        self.code.push(opcode as u8);
        self.code.extend_from_slice(&operand.to_be_bytes());
        self
    }

    /// Emits `bipush`.
    pub fn bipush(&mut self, value: i8) -> &mut Self {
        self.op_u8(Opcode::Bipush, value as u8)
    }

    /// Emits `sipush`.
    pub fn sipush(&mut self, value: i16) -> &mut Self {
        self.op_u16(Opcode::Sipush, value as u16)
    }

    /// Emits the shortest instruction that pushes an int constant.
    pub fn push_int(&mut self, value: i16) -> &mut Self {
        const SMALL: [Opcode; 7] = [
            Opcode::IconstM1,
            Opcode::Iconst0,
            Opcode::Iconst1,
            Opcode::Iconst2,
            Opcode::Iconst3,
            Opcode::Iconst4,
            Opcode::Iconst5,
        ];
        match value {
            -1..=5 => self.op(SMALL[(value + 1) as usize]),
            -128..=127 => self.bipush(value as i8),
            _ => self.sipush(value),
        }
    }

    /// Emits `iinc`.
    pub fn iinc(&mut self, index: u8, delta: i8) -> &mut Self {
        self.code
            .extend_from_slice(&[Opcode::Iinc as u8, index, delta as u8]);
        self
    }

    /// Emits a `wide` load, store or `ret`.
    pub fn wide(&mut self, opcode: Opcode, index: u16) -> &mut Self {
        self.code.extend_from_slice(&[Opcode::Wide as u8, opcode as u8]);
        self.code.extend_from_slice(&index.to_be_bytes());
        self
    }

    /// Emits `wide iinc`.
    pub fn wide_iinc(&mut self, index: u16, delta: i16) -> &mut Self {
        self.code
            .extend_from_slice(&[Opcode::Wide as u8, Opcode::Iinc as u8]);
        self.code.extend_from_slice(&index.to_be_bytes());
        self.code.extend_from_slice(&delta.to_be_bytes());
        self
    }

    /// Emits `invokeinterface` with its argument-slot count (receiver included).
    pub fn invokeinterface(&mut self, index: u16, count: u8) -> &mut Self {
        self.op_u16(Opcode::Invokeinterface, index);
        self.code.extend_from_slice(&[count, 0]);
        self
    }

    /// Emits `multianewarray`.
    pub fn multianewarray(&mut self, index: u16, dimensions: u8) -> &mut Self {
        self.op_u16(Opcode::Multianewarray, index);
        self.code.push(dimensions);
        self
    }

    /// Allocates an unbound label.
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the current pc.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        let pc = self.pc();
        if let Some(slot) = self.labels.get_mut(label.0) {
            *slot = Some(pc);
        }
        self
    }

    /// Emits a 16-bit branch to `label`.
    pub fn branch(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        let origin = self.pc();
        self.code.extend_from_slice(&[opcode as u8, 0, 0]);
        self.patches.push(Patch::Short {
            at: origin + 1,
            origin,
            label,
        });
        self
    }

    /// Emits a 32-bit branch (`goto_w`, `jsr_w`) to `label`.
    pub fn branch_wide(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        let origin = self.pc();
        self.code.extend_from_slice(&[opcode as u8, 0, 0, 0, 0]);
        self.patches.push(Patch::Wide {
            at: origin + 1,
            origin,
            label,
        });
        self
    }

    fn align_switch(&mut self, opcode: Opcode) -> usize {
        let origin = self.pc();
        self.code.push(opcode as u8);
        while self.code.len() < switch_operands(origin) {
            self.code.push(0);
        }
        origin
    }

    fn wide_target(&mut self, origin: usize, label: Label) {
        let at = self.pc();
        self.code.extend_from_slice(&[0; 4]);
        self.patches.push(Patch::Wide { at, origin, label });
    }

    /// Emits a `tableswitch` covering `low..=high`.
    pub fn tableswitch(&mut self, low: i32, high: i32, default: Label, targets: &[Label]) -> &mut Self {
        let origin = self.align_switch(Opcode::Tableswitch);
        self.wide_target(origin, default);
        self.code.extend_from_slice(&low.to_be_bytes());
        self.code.extend_from_slice(&high.to_be_bytes());
        for target in targets {
            self.wide_target(origin, *target);
        }
        self
    }

    /// Emits a `lookupswitch`; pairs are sorted by key.
    pub fn lookupswitch(&mut self, default: Label, pairs: &[(i32, Label)]) -> &mut Self {
        let origin = self.align_switch(Opcode::Lookupswitch);
        self.wide_target(origin, default);
        let mut sorted = pairs.to_vec();
        sorted.sort_by_key(|(key, _)| *key);
        self.code
            .extend_from_slice(&(sorted.len() as i32).to_be_bytes());
        for (key, target) in sorted {
            self.code.extend_from_slice(&key.to_be_bytes());
            self.wide_target(origin, target);
        }
        self
    }

    /// Registers a handler for `[start, end)`; `catch_type` 0 catches everything.
    pub fn handler(&mut self, start: Label, end: Label, handler: Label, catch_type: u16) -> &mut Self {
        self.handlers.push(Handler {
            start,
            end,
            handler,
            catch_type,
        });
        self
    }

    /// Starts a new source line at the current pc.
    pub fn line(&mut self, line_number: u16) -> &mut Self {
        let start_pc = self.pc() as u16;
        self.lines.push(LineNumberEntry {
            start_pc,
            line_number,
        });
        self
    }

    fn resolve(&self, label: Label) -> Result<usize, BuildError> {
        self.labels
            .get(label.0)
            .copied()
            .flatten()
            .ok_or(BuildError::UnboundLabel(label.0))
    }

    /// Patches branches and produces the `Code` attribute.
    pub fn build(&self, max_stack: u16, max_locals: u16) -> Result<CodeAttribute, BuildError> {
        if self.code.len() > u16::MAX as usize {
            return Err(BuildError::CodeTooLarge(self.code.len()));
        }
        let mut code = self.code.clone();
        for patch in &self.patches {
            match *patch {
                Patch::Short { at, origin, label } => {
                    let target = self.resolve(label)?;
                    let offset = target as i64 - origin as i64;
                    let offset = i16::try_from(offset)
                        .map_err(|_| BuildError::BranchOutOfRange { at: origin, target })?;
                    code[at..at + 2].copy_from_slice(&offset.to_be_bytes());
                }
                Patch::Wide { at, origin, label } => {
                    let target = self.resolve(label)?;
                    let offset = (target as i64 - origin as i64) as i32;
                    code[at..at + 4].copy_from_slice(&offset.to_be_bytes());
                }
            }
        }
        let exception_table = self
            .handlers
            .iter()
            .map(|h| {
                Ok(ExceptionTableEntry {
                    start_pc: self.resolve(h.start)? as u16,
                    end_pc: self.resolve(h.end)? as u16,
                    handler_pc: self.resolve(h.handler)? as u16,
                    catch_type: h.catch_type,
                })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;
        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            line_numbers: self.lines.clone(),
        })
    }
}

/// Assembles a [`ClassFile`].
///
/// # Examples
///
/// ```
/// use bytecode_system::{access, ClassBuilder, CodeBuilder, Opcode};
///
/// let mut class = ClassBuilder::new("demo/Counter");
/// let count = class.field_ref("demo/Counter", "count", "I");
/// class.field("count", "I", access::ACC_STATIC);
///
/// let mut code = CodeBuilder::new();
/// code.op(Opcode::Iconst5).op_u16(Opcode::Putstatic, count).op(Opcode::Return);
/// class.method("<clinit>", "()V", access::ACC_STATIC, code.build(1, 0).unwrap());
///
/// let file = class.build();
/// assert_eq!(file.super_name.as_deref(), Some("java/lang/Object"));
/// assert!(file.method("<clinit>", "()V").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    access_flags: u16,
    pool: ConstantPool,
    interned: HashMap<PoolKey, u16>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    source_file: Option<String>,
}

/// Hashable key for constant-pool deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    Fieldref(u16, u16),
    Methodref(u16, u16),
    InterfaceMethodref(u16, u16),
    NameAndType(u16, u16),
}

impl ClassBuilder {
    /// Starts a public class extending `java/lang/Object`.
    pub fn new(name: &str) -> Self {
        let super_name = if name == "java/lang/Object" {
            None
        } else {
            Some("java/lang/Object".to_string())
        };
        Self {
            name: name.to_string(),
            super_name,
            interfaces: Vec::new(),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            pool: ConstantPool::new(),
            interned: HashMap::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            source_file: None,
        }
    }

    /// Sets the superclass; `None` only for the root class.
    pub fn super_class(&mut self, name: Option<&str>) -> &mut Self {
        self.super_name = name.map(str::to_string);
        self
    }

    /// Adds a directly implemented interface.
    pub fn interface(&mut self, name: &str) -> &mut Self {
        self.interfaces.push(name.to_string());
        self
    }

    /// Replaces the class access flags.
    pub fn access(&mut self, flags: u16) -> &mut Self {
        self.access_flags = flags;
        self
    }

    /// Records the source file name used in stack traces.
    pub fn source_file(&mut self, name: &str) -> &mut Self {
        self.source_file = Some(name.to_string());
        self
    }

    fn intern(&mut self, key: PoolKey, constant: Constant) -> u16 {
        if let Some(index) = self.interned.get(&key) {
            return *index;
        }
        let index = self.pool.push(constant);
        self.interned.insert(key, index);
        index
    }

    /// Interns a Utf8 entry.
    pub fn utf8(&mut self, text: &str) -> u16 {
        self.intern(PoolKey::Utf8(text.to_string()), Constant::Utf8(text.into()))
    }

    /// Interns an Integer entry.
    pub fn integer(&mut self, value: i32) -> u16 {
        self.intern(PoolKey::Integer(value), Constant::Integer(value))
    }

    /// Interns a Float entry.
    pub fn float(&mut self, value: f32) -> u16 {
        self.intern(PoolKey::Float(value.to_bits()), Constant::Float(value))
    }

    /// Interns a Long entry.
    pub fn long(&mut self, value: i64) -> u16 {
        self.intern(PoolKey::Long(value), Constant::Long(value))
    }

    /// Interns a Double entry.
    pub fn double(&mut self, value: f64) -> u16 {
        self.intern(PoolKey::Double(value.to_bits()), Constant::Double(value))
    }

    /// Interns a Class entry.
    pub fn class_ref(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.intern(PoolKey::Class(name_index), Constant::Class { name_index })
    }

    /// Interns a String entry.
    pub fn string(&mut self, text: &str) -> u16 {
        let string_index = self.utf8(text);
        self.intern(
            PoolKey::String(string_index),
            Constant::String { string_index },
        )
    }

    /// Interns a NameAndType entry.
    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.intern(
            PoolKey::NameAndType(name_index, descriptor_index),
            Constant::NameAndType {
                name_index,
                descriptor_index,
            },
        )
    }

    /// Interns a Fieldref entry.
    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class_ref(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.intern(
            PoolKey::Fieldref(class_index, name_and_type_index),
            Constant::Fieldref {
                class_index,
                name_and_type_index,
            },
        )
    }

    /// Interns a Methodref entry.
    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class_ref(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.intern(
            PoolKey::Methodref(class_index, name_and_type_index),
            Constant::Methodref {
                class_index,
                name_and_type_index,
            },
        )
    }

    /// Interns an InterfaceMethodref entry.
    pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class_ref(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.intern(
            PoolKey::InterfaceMethodref(class_index, name_and_type_index),
            Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            },
        )
    }

    /// Declares a field.
    pub fn field(&mut self, name: &str, descriptor: &str, access_flags: u16) -> &mut Self {
        self.fields.push(FieldInfo {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags,
        });
        self
    }

    /// Declares a method with bytecode.
    pub fn method(
        &mut self,
        name: &str,
        descriptor: &str,
        access_flags: u16,
        code: CodeAttribute,
    ) -> &mut Self {
        self.methods.push(MethodInfo {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags,
            code: Some(code),
        });
        self
    }

    /// Declares a method without bytecode (native or abstract).
    pub fn bodiless_method(&mut self, name: &str, descriptor: &str, access_flags: u16) -> &mut Self {
        self.methods.push(MethodInfo {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags,
            code: None,
        });
        self
    }

    /// Produces the class descriptor.
    pub fn build(&self) -> ClassFile {
        ClassFile {
            name: self.name.clone(),
            super_name: self.super_name.clone(),
            interfaces: self.interfaces.clone(),
            access_flags: self.access_flags,
            constant_pool: self.pool.clone(),
            fields: self.fields.clone(),
            methods: self.methods.clone(),
            source_file: self.source_file.clone(),
        }
    }
}
