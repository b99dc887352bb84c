//! Rewritable code streams.
//!
//! Once an instruction's operand has been resolved, the interpreter
//! replaces it in place with a quick form. A rewrite is two-phase: the
//! opcode byte is first replaced by [`Opcode::Lock`], then the operand
//! bytes are stored, then the final opcode. A thread that reads an opcode,
//! decodes its operands and finds the opcode byte changed afterwards must
//! re-dispatch the instruction.

use bytecode_system::{ByteSource, Opcode};
use std::sync::atomic::{AtomicU8, Ordering};

/// A method's code as a slice of atomically accessed bytes.
pub struct CodeStream {
    bytes: Box<[AtomicU8]>,
}

impl CodeStream {
    /// Copies `code` into a fresh stream.
    pub fn new(code: &[u8]) -> Self {
        CodeStream {
            bytes: code.iter().map(|b| AtomicU8::new(*b)).collect(),
        }
    }

    /// Opcode at `pc`.
    #[inline]
    pub fn opcode_at(&self, pc: usize) -> Option<Opcode> {
        self.byte_at(pc).and_then(Opcode::from_byte)
    }

    /// Returns true if the opcode at `pc` is still `expected`.
    #[inline]
    pub fn still(&self, pc: usize, expected: Opcode) -> bool {
        self.byte_at(pc) == Some(expected as u8)
    }

    /// Replaces the instruction at `pc` with `opcode` and `operands`.
    pub fn rewrite(&self, pc: usize, opcode: Opcode, operands: &[u8]) {
        let Some(slot) = self.bytes.get(pc) else {
            return;
        };
        if pc + operands.len() >= self.bytes.len() {
            return;
        }
        slot.store(Opcode::Lock as u8, Ordering::SeqCst);
        for (i, byte) in operands.iter().enumerate() {
            self.bytes[pc + 1 + i].store(*byte, Ordering::SeqCst);
        }
        slot.store(opcode as u8, Ordering::SeqCst);
    }

    /// Current contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.iter().map(|b| b.load(Ordering::SeqCst)).collect()
    }
}

impl ByteSource for CodeStream {
    #[inline]
    fn byte_at(&self, pc: usize) -> Option<u8> {
        self.bytes.get(pc).map(|b| b.load(Ordering::SeqCst))
    }

    fn code_len(&self) -> usize {
        self.bytes.len()
    }
}

impl std::fmt::Debug for CodeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeStream")
            .field("len", &self.bytes.len())
            .finish()
    }
}
