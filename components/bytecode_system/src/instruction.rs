//! Operand decoding
//!
//! Operands are big-endian. Branch offsets are relative to the pc of the
//! instruction's own opcode. Switch operands start at the next 4-byte
//! boundary measured from the start of the code array.

use crate::opcode::Opcode;

/// Random access to a code stream.
///
/// Implemented for plain byte slices and by the interpreter for its
/// rewritable code arrays.
pub trait ByteSource {
    /// Byte at `pc`.
    fn byte_at(&self, pc: usize) -> Option<u8>;

    /// Length of the code stream.
    fn code_len(&self) -> usize;

    /// Signed byte at `pc`.
    fn i8_at(&self, pc: usize) -> Option<i8> {
        self.byte_at(pc).map(|b| b as i8)
    }

    /// Unsigned 16-bit operand at `pc`.
    fn u16_at(&self, pc: usize) -> Option<u16> {
        Some(u16::from_be_bytes([self.byte_at(pc)?, self.byte_at(pc + 1)?]))
    }

    /// Signed 16-bit operand at `pc`.
    fn i16_at(&self, pc: usize) -> Option<i16> {
        self.u16_at(pc).map(|v| v as i16)
    }

    /// Signed 32-bit operand at `pc`.
    fn i32_at(&self, pc: usize) -> Option<i32> {
        Some(i32::from_be_bytes([
            self.byte_at(pc)?,
            self.byte_at(pc + 1)?,
            self.byte_at(pc + 2)?,
            self.byte_at(pc + 3)?,
        ]))
    }
}

impl ByteSource for [u8] {
    fn byte_at(&self, pc: usize) -> Option<u8> {
        self.get(pc).copied()
    }

    fn code_len(&self) -> usize {
        self.len()
    }
}

impl ByteSource for Vec<u8> {
    fn byte_at(&self, pc: usize) -> Option<u8> {
        self.get(pc).copied()
    }

    fn code_len(&self) -> usize {
        self.len()
    }
}

/// Offset of the first switch operand for a switch opcode at `pc`.
pub fn switch_operands(pc: usize) -> usize {
    (pc + 4) & !3
}

/// Branch offset a `tableswitch` at `pc` selects for `key`.
///
/// # Examples
///
/// ```
/// use bytecode_system::{CodeBuilder, Opcode};
/// use bytecode_system::instruction::table_switch_offset;
///
/// let mut code = CodeBuilder::new();
/// let (a, b, c, default) = (code.new_label(), code.new_label(), code.new_label(), code.new_label());
/// code.tableswitch(0, 2, default, &[a, b, c]);
/// for label in [a, b, c, default] {
///     code.bind(label).op(Opcode::Return);
/// }
/// let attribute = code.build(1, 1).unwrap();
/// assert_eq!(table_switch_offset(&attribute.code, 0, 1), Some(29));
/// assert_eq!(table_switch_offset(&attribute.code, 0, 5), Some(31));
/// ```
pub fn table_switch_offset<S: ByteSource + ?Sized>(code: &S, pc: usize, key: i32) -> Option<i32> {
    let base = switch_operands(pc);
    let default = code.i32_at(base)?;
    let low = code.i32_at(base + 4)?;
    let high = code.i32_at(base + 8)?;
    if key < low || key > high {
        return Some(default);
    }
    let slot = (key as i64 - low as i64) as usize;
    code.i32_at(base + 12 + slot * 4)
}

/// Branch offset a `lookupswitch` at `pc` selects for `key`.
pub fn lookup_switch_offset<S: ByteSource + ?Sized>(code: &S, pc: usize, key: i32) -> Option<i32> {
    let base = switch_operands(pc);
    let default = code.i32_at(base)?;
    let pairs = code.i32_at(base + 4)?.max(0) as usize;
    for pair in 0..pairs {
        let at = base + 8 + pair * 8;
        if code.i32_at(at)? == key {
            return code.i32_at(at + 4);
        }
    }
    Some(default)
}

/// Encoded length of the instruction at `pc`, including variable-length forms.
pub fn instruction_length<S: ByteSource + ?Sized>(code: &S, pc: usize) -> Option<usize> {
    let opcode = Opcode::from_byte(code.byte_at(pc)?)?;
    if let Some(length) = opcode.length() {
        return Some(length);
    }
    match opcode {
        Opcode::Tableswitch => {
            let base = switch_operands(pc);
            let low = code.i32_at(base + 4)? as i64;
            let high = code.i32_at(base + 8)? as i64;
            let count = (high - low + 1).max(0) as usize;
            Some(base + 12 + count * 4 - pc)
        }
        Opcode::Lookupswitch => {
            let base = switch_operands(pc);
            let pairs = code.i32_at(base + 4)?.max(0) as usize;
            Some(base + 8 + pairs * 8 - pc)
        }
        Opcode::Wide => match Opcode::from_byte(code.byte_at(pc + 1)?)? {
            Opcode::Iinc => Some(6),
            _ => Some(4),
        },
        _ => None,
    }
}
