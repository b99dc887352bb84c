//! Dispatch loop for bytecode execution
//!
//! Instructions that only touch the current frame are executed by
//! [`execute_local`]. Everything that needs the constant pool, the heap or
//! another frame goes through [`Vm::execute`], which also performs the
//! quickening rewrites.

use crate::call_frame::CallFrame;
use crate::class::{Class, Code, Field, Method};
use crate::constant_pool::Resolved;
use crate::error::{ExecResult, Exception};
use crate::linker::link;
use crate::native::monitor_error;
use crate::quicken::CodeStream;
use crate::thread::ThreadContext;
use crate::vm::Vm;
use bytecode_system::instruction::{lookup_switch_offset, table_switch_offset};
use bytecode_system::{ByteSource, Constant, Opcode as Op};
use core_types::{ErrorKind, LoaderId, ObjectId, Value, VmError};
use memory_manager::{ArrayAccessError, ArrayKind};
use std::cmp::Ordering;
use std::sync::Arc;

/// What the dispatch loop does after an instruction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Flow {
    /// Keep executing the current frame
    Continue,
    /// A new frame was pushed
    Invoked,
    /// The current frame completed with an optional result
    Return(Option<Value>),
}

fn truncated(pc: usize) -> VmError {
    VmError::internal(format!("truncated instruction at pc {}", pc))
}

fn u8_at(code: &CodeStream, pc: usize) -> Result<u8, VmError> {
    code.byte_at(pc).ok_or_else(|| truncated(pc))
}

fn u16_at(code: &CodeStream, pc: usize) -> Result<u16, VmError> {
    code.u16_at(pc).ok_or_else(|| truncated(pc))
}

fn i16_at(code: &CodeStream, pc: usize) -> Result<i16, VmError> {
    code.i16_at(pc).ok_or_else(|| truncated(pc))
}

fn i32_at(code: &CodeStream, pc: usize) -> Result<i32, VmError> {
    code.i32_at(pc).ok_or_else(|| truncated(pc))
}

fn branch_target(pc: usize, offset: i32) -> Result<usize, VmError> {
    usize::try_from(pc as i64 + offset as i64)
        .map_err(|_| VmError::internal(format!("branch from pc {} by {} leaves the method", pc, offset)))
}

fn array_error(error: ArrayAccessError) -> VmError {
    match error {
        ArrayAccessError::OutOfBounds(index) => VmError::index_out_of_bounds(index),
        ArrayAccessError::NotArray => VmError::internal("array instruction on a non-array object"),
    }
}

fn incompatible(message: impl Into<String>) -> Exception {
    VmError::with_message(ErrorKind::IncompatibleClassChangeError, message).into()
}

fn abstract_method(method: &Method) -> Exception {
    VmError::with_message(
        ErrorKind::AbstractMethodError,
        format!("{}{}", method.qualified_name().replace('/', "."), method.descriptor()),
    )
    .into()
}

/// Three-way float compare; `nan` is the result when either side is NaN.
fn compare_floats<T: PartialOrd>(a: T, b: T, nan: i32) -> i32 {
    match a.partial_cmp(&b) {
        Some(Ordering::Greater) => 1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Less) => -1,
        None => nan,
    }
}

fn int_op(frame: &mut CallFrame, f: impl FnOnce(i32, i32) -> i32) -> Result<(), VmError> {
    let b = frame.pop_int()?;
    let a = frame.pop_int()?;
    frame.push_int(f(a, b));
    Ok(())
}

fn long_op(frame: &mut CallFrame, f: impl FnOnce(i64, i64) -> i64) -> Result<(), VmError> {
    let b = frame.pop_long()?;
    let a = frame.pop_long()?;
    frame.push_long(f(a, b));
    Ok(())
}

fn long_shift(frame: &mut CallFrame, f: impl FnOnce(i64, u32) -> i64) -> Result<(), VmError> {
    let b = frame.pop_int()?;
    let a = frame.pop_long()?;
    frame.push_long(f(a, b as u32));
    Ok(())
}

fn float_op(frame: &mut CallFrame, f: impl FnOnce(f32, f32) -> f32) -> Result<(), VmError> {
    let b = frame.pop_float()?;
    let a = frame.pop_float()?;
    frame.push_float(f(a, b));
    Ok(())
}

fn double_op(frame: &mut CallFrame, f: impl FnOnce(f64, f64) -> f64) -> Result<(), VmError> {
    let b = frame.pop_double()?;
    let a = frame.pop_double()?;
    frame.push_double(f(a, b));
    Ok(())
}

fn load_local(frame: &mut CallFrame, index: usize) -> Result<(), VmError> {
    let value = frame.local(index)?;
    frame.push_value(value);
    Ok(())
}

fn store_local(frame: &mut CallFrame, index: usize) -> Result<(), VmError> {
    let value = frame.pop_value()?;
    frame.set_local(index, value)
}

fn return_address(frame: &CallFrame, index: usize) -> Result<usize, VmError> {
    match frame.local(index)? {
        Value::ReturnAddress(target) => Ok(target as usize),
        other => Err(VmError::internal(format!(
            "ret through local {} holding {:?}",
            index, other
        ))),
    }
}

fn int_branch(frame: &mut CallFrame, code: &CodeStream, pc: usize, taken: impl FnOnce(i32) -> bool) -> Result<Option<usize>, VmError> {
    let value = frame.pop_int()?;
    if taken(value) {
        Ok(Some(branch_target(pc, i16_at(code, pc + 1)? as i32)?))
    } else {
        Ok(None)
    }
}

fn int_compare_branch(
    frame: &mut CallFrame,
    code: &CodeStream,
    pc: usize,
    taken: impl FnOnce(i32, i32) -> bool,
) -> Result<Option<usize>, VmError> {
    let b = frame.pop_int()?;
    let a = frame.pop_int()?;
    if taken(a, b) {
        Ok(Some(branch_target(pc, i16_at(code, pc + 1)? as i32)?))
    } else {
        Ok(None)
    }
}

/// Executes an instruction that only reads and writes the current frame.
/// Returns the next pc, or `None` if `op` needs the engine.
pub(crate) fn execute_local(
    frame: &mut CallFrame,
    code: &CodeStream,
    op: Op,
    pc: usize,
) -> Result<Option<usize>, VmError> {
    let mut next = pc + op.length().unwrap_or(1);
    match op {
        Op::Nop => {}
        Op::AconstNull => frame.push(Value::Null),
        Op::IconstM1 => frame.push_int(-1),
        Op::Iconst0 => frame.push_int(0),
        Op::Iconst1 => frame.push_int(1),
        Op::Iconst2 => frame.push_int(2),
        Op::Iconst3 => frame.push_int(3),
        Op::Iconst4 => frame.push_int(4),
        Op::Iconst5 => frame.push_int(5),
        Op::Lconst0 => frame.push_long(0),
        Op::Lconst1 => frame.push_long(1),
        Op::Fconst0 => frame.push_float(0.0),
        Op::Fconst1 => frame.push_float(1.0),
        Op::Fconst2 => frame.push_float(2.0),
        Op::Dconst0 => frame.push_double(0.0),
        Op::Dconst1 => frame.push_double(1.0),
        Op::Bipush => frame.push_int(u8_at(code, pc + 1)? as i8 as i32),
        Op::Sipush => frame.push_int(i16_at(code, pc + 1)? as i32),

        Op::Iload | Op::Lload | Op::Fload | Op::Dload | Op::Aload => {
            load_local(frame, u8_at(code, pc + 1)? as usize)?
        }
        Op::Iload0 | Op::Lload0 | Op::Fload0 | Op::Dload0 | Op::Aload0 => load_local(frame, 0)?,
        Op::Iload1 | Op::Lload1 | Op::Fload1 | Op::Dload1 | Op::Aload1 => load_local(frame, 1)?,
        Op::Iload2 | Op::Lload2 | Op::Fload2 | Op::Dload2 | Op::Aload2 => load_local(frame, 2)?,
        Op::Iload3 | Op::Lload3 | Op::Fload3 | Op::Dload3 | Op::Aload3 => load_local(frame, 3)?,
        Op::Istore | Op::Lstore | Op::Fstore | Op::Dstore | Op::Astore => {
            store_local(frame, u8_at(code, pc + 1)? as usize)?
        }
        Op::Istore0 | Op::Lstore0 | Op::Fstore0 | Op::Dstore0 | Op::Astore0 => {
            store_local(frame, 0)?
        }
        Op::Istore1 | Op::Lstore1 | Op::Fstore1 | Op::Dstore1 | Op::Astore1 => {
            store_local(frame, 1)?
        }
        Op::Istore2 | Op::Lstore2 | Op::Fstore2 | Op::Dstore2 | Op::Astore2 => {
            store_local(frame, 2)?
        }
        Op::Istore3 | Op::Lstore3 | Op::Fstore3 | Op::Dstore3 | Op::Astore3 => {
            store_local(frame, 3)?
        }

        Op::Pop => {
            frame.pop()?;
        }
        Op::Pop2 => {
            frame.pop()?;
            frame.pop()?;
        }
        Op::Dup => frame.dup_x(1, 0)?,
        Op::DupX1 => frame.dup_x(1, 1)?,
        Op::DupX2 => frame.dup_x(1, 2)?,
        Op::Dup2 => frame.dup_x(2, 0)?,
        Op::Dup2X1 => frame.dup_x(2, 1)?,
        Op::Dup2X2 => frame.dup_x(2, 2)?,
        Op::Swap => {
            let a = frame.pop()?;
            let b = frame.pop()?;
            frame.push(a);
            frame.push(b);
        }

        Op::Iadd => int_op(frame, i32::wrapping_add)?,
        Op::Isub => int_op(frame, i32::wrapping_sub)?,
        Op::Imul => int_op(frame, i32::wrapping_mul)?,
        Op::Idiv | Op::Irem => {
            if frame.peek(0)?.as_int() == Some(0) {
                return Err(VmError::divide_by_zero());
            }
            if op == Op::Idiv {
                int_op(frame, i32::wrapping_div)?
            } else {
                int_op(frame, i32::wrapping_rem)?
            }
        }
        Op::Ladd => long_op(frame, i64::wrapping_add)?,
        Op::Lsub => long_op(frame, i64::wrapping_sub)?,
        Op::Lmul => long_op(frame, i64::wrapping_mul)?,
        Op::Ldiv | Op::Lrem => {
            if frame.peek(1)?.as_long() == Some(0) {
                return Err(VmError::divide_by_zero());
            }
            if op == Op::Ldiv {
                long_op(frame, i64::wrapping_div)?
            } else {
                long_op(frame, i64::wrapping_rem)?
            }
        }
        Op::Fadd => float_op(frame, |a, b| a + b)?,
        Op::Fsub => float_op(frame, |a, b| a - b)?,
        Op::Fmul => float_op(frame, |a, b| a * b)?,
        Op::Fdiv => float_op(frame, |a, b| a / b)?,
        Op::Frem => float_op(frame, |a, b| a % b)?,
        Op::Dadd => double_op(frame, |a, b| a + b)?,
        Op::Dsub => double_op(frame, |a, b| a - b)?,
        Op::Dmul => double_op(frame, |a, b| a * b)?,
        Op::Ddiv => double_op(frame, |a, b| a / b)?,
        Op::Drem => double_op(frame, |a, b| a % b)?,
        Op::Ineg => {
            let value = frame.pop_int()?;
            frame.push_int(value.wrapping_neg());
        }
        Op::Lneg => {
            let value = frame.pop_long()?;
            frame.push_long(value.wrapping_neg());
        }
        Op::Fneg => {
            let value = frame.pop_float()?;
            frame.push_float(-value);
        }
        Op::Dneg => {
            let value = frame.pop_double()?;
            frame.push_double(-value);
        }

        // Shift distances are masked to the operand width
        Op::Ishl => int_op(frame, |a, b| a.wrapping_shl(b as u32))?,
        Op::Ishr => int_op(frame, |a, b| a.wrapping_shr(b as u32))?,
        Op::Iushr => int_op(frame, |a, b| (a as u32).wrapping_shr(b as u32) as i32)?,
        Op::Lshl => long_shift(frame, i64::wrapping_shl)?,
        Op::Lshr => long_shift(frame, i64::wrapping_shr)?,
        Op::Lushr => long_shift(frame, |a, b| (a as u64).wrapping_shr(b) as i64)?,
        Op::Iand => int_op(frame, |a, b| a & b)?,
        Op::Ior => int_op(frame, |a, b| a | b)?,
        Op::Ixor => int_op(frame, |a, b| a ^ b)?,
        Op::Land => long_op(frame, |a, b| a & b)?,
        Op::Lor => long_op(frame, |a, b| a | b)?,
        Op::Lxor => long_op(frame, |a, b| a ^ b)?,
        Op::Iinc => {
            let index = u8_at(code, pc + 1)? as usize;
            let delta = u8_at(code, pc + 2)? as i8 as i32;
            let value = frame.local_int(index)?;
            frame.set_local(index, Value::Int(value.wrapping_add(delta)))?;
        }

        // Float-to-integer conversions saturate and map NaN to zero
        Op::I2l => {
            let value = frame.pop_int()?;
            frame.push_long(value as i64);
        }
        Op::I2f => {
            let value = frame.pop_int()?;
            frame.push_float(value as f32);
        }
        Op::I2d => {
            let value = frame.pop_int()?;
            frame.push_double(value as f64);
        }
        Op::L2i => {
            let value = frame.pop_long()?;
            frame.push_int(value as i32);
        }
        Op::L2f => {
            let value = frame.pop_long()?;
            frame.push_float(value as f32);
        }
        Op::L2d => {
            let value = frame.pop_long()?;
            frame.push_double(value as f64);
        }
        Op::F2i => {
            let value = frame.pop_float()?;
            frame.push_int(value as i32);
        }
        Op::F2l => {
            let value = frame.pop_float()?;
            frame.push_long(value as i64);
        }
        Op::F2d => {
            let value = frame.pop_float()?;
            frame.push_double(value as f64);
        }
        Op::D2i => {
            let value = frame.pop_double()?;
            frame.push_int(value as i32);
        }
        Op::D2l => {
            let value = frame.pop_double()?;
            frame.push_long(value as i64);
        }
        Op::D2f => {
            let value = frame.pop_double()?;
            frame.push_float(value as f32);
        }
        Op::I2b => {
            let value = frame.pop_int()?;
            frame.push_int(value as i8 as i32);
        }
        Op::I2c => {
            let value = frame.pop_int()?;
            frame.push_int(value as u16 as i32);
        }
        Op::I2s => {
            let value = frame.pop_int()?;
            frame.push_int(value as i16 as i32);
        }

        Op::Lcmp => {
            let b = frame.pop_long()?;
            let a = frame.pop_long()?;
            frame.push_int(a.cmp(&b) as i32);
        }
        Op::Fcmpl | Op::Fcmpg => {
            let b = frame.pop_float()?;
            let a = frame.pop_float()?;
            frame.push_int(compare_floats(a, b, if op == Op::Fcmpl { -1 } else { 1 }));
        }
        Op::Dcmpl | Op::Dcmpg => {
            let b = frame.pop_double()?;
            let a = frame.pop_double()?;
            frame.push_int(compare_floats(a, b, if op == Op::Dcmpl { -1 } else { 1 }));
        }

        Op::Ifeq | Op::Ifne | Op::Iflt | Op::Ifge | Op::Ifgt | Op::Ifle => {
            let taken = int_branch(frame, code, pc, |v| match op {
                Op::Ifeq => v == 0,
                Op::Ifne => v != 0,
                Op::Iflt => v < 0,
                Op::Ifge => v >= 0,
                Op::Ifgt => v > 0,
                _ => v <= 0,
            })?;
            if let Some(target) = taken {
                next = target;
            }
        }
        Op::IfIcmpeq | Op::IfIcmpne | Op::IfIcmplt | Op::IfIcmpge | Op::IfIcmpgt | Op::IfIcmple => {
            let taken = int_compare_branch(frame, code, pc, |a, b| match op {
                Op::IfIcmpeq => a == b,
                Op::IfIcmpne => a != b,
                Op::IfIcmplt => a < b,
                Op::IfIcmpge => a >= b,
                Op::IfIcmpgt => a > b,
                _ => a <= b,
            })?;
            if let Some(target) = taken {
                next = target;
            }
        }
        Op::IfAcmpeq | Op::IfAcmpne => {
            let b = frame.pop_ref()?;
            let a = frame.pop_ref()?;
            if (a == b) == (op == Op::IfAcmpeq) {
                next = branch_target(pc, i16_at(code, pc + 1)? as i32)?;
            }
        }
        Op::Ifnull | Op::Ifnonnull => {
            let value = frame.pop_ref()?;
            if value.is_none() == (op == Op::Ifnull) {
                next = branch_target(pc, i16_at(code, pc + 1)? as i32)?;
            }
        }
        Op::Goto => next = branch_target(pc, i16_at(code, pc + 1)? as i32)?,
        Op::GotoW => next = branch_target(pc, i32_at(code, pc + 1)?)?,
        Op::Jsr | Op::JsrW => {
            frame.push(Value::ReturnAddress(next as u32));
            let offset = if op == Op::Jsr {
                i16_at(code, pc + 1)? as i32
            } else {
                i32_at(code, pc + 1)?
            };
            next = branch_target(pc, offset)?;
        }
        Op::Ret => next = return_address(frame, u8_at(code, pc + 1)? as usize)?,
        Op::Tableswitch => {
            let key = frame.pop_int()?;
            let offset = table_switch_offset(code, pc, key).ok_or_else(|| truncated(pc))?;
            next = branch_target(pc, offset)?;
        }
        Op::Lookupswitch => {
            let key = frame.pop_int()?;
            let offset = lookup_switch_offset(code, pc, key).ok_or_else(|| truncated(pc))?;
            next = branch_target(pc, offset)?;
        }
        Op::Wide => {
            let modified = Op::from_byte(u8_at(code, pc + 1)?)
                .ok_or_else(|| VmError::internal(format!("bad wide instruction at pc {}", pc)))?;
            let index = u16_at(code, pc + 2)? as usize;
            next = pc + 4;
            match modified {
                Op::Iload | Op::Lload | Op::Fload | Op::Dload | Op::Aload => load_local(frame, index)?,
                Op::Istore | Op::Lstore | Op::Fstore | Op::Dstore | Op::Astore => {
                    store_local(frame, index)?
                }
                Op::Ret => next = return_address(frame, index)?,
                Op::Iinc => {
                    let delta = i16_at(code, pc + 4)? as i32;
                    let value = frame.local_int(index)?;
                    frame.set_local(index, Value::Int(value.wrapping_add(delta)))?;
                    next = pc + 6;
                }
                other => {
                    return Err(VmError::internal(format!(
                        "wide cannot modify {}",
                        other.mnemonic()
                    )))
                }
            }
        }
        _ => return Ok(None),
    }
    Ok(Some(next))
}

impl Vm {
    /// Calls `method` with its argument slots and runs it to completion.
    pub(crate) fn call(
        &self,
        thread: &mut ThreadContext,
        method: &Arc<Method>,
        args: Vec<Value>,
    ) -> ExecResult<Option<Value>> {
        if method.is_abstract() {
            return Err(abstract_method(method));
        }
        if !thread.fits(method.frame_size()) {
            return Err(VmError::new(ErrorKind::StackOverflowError).into());
        }
        if method.is_native() {
            return self.call_native(thread, method, args);
        }
        let base = thread.depth();
        self.push_method_frame(thread, method, args)?;
        self.run(thread, base)
    }

    /// Runs frames until the stack is back at `base` frames.
    pub(crate) fn run(&self, thread: &mut ThreadContext, base: usize) -> ExecResult<Option<Value>> {
        loop {
            match self.interpret(thread) {
                Ok(Flow::Continue) | Ok(Flow::Invoked) => {}
                Ok(Flow::Return(value)) => {
                    let frame = thread
                        .pop_frame()
                        .ok_or_else(|| VmError::internal("return without a frame"))?;
                    let released = self.release_frame(thread, &frame);
                    if thread.depth() <= base {
                        return released.map(|()| value).map_err(Exception::from);
                    }
                    let resumed = released.and_then(|()| {
                        let caller = thread.frame()?;
                        caller.pc = caller.resume_pc;
                        if let Some(value) = value {
                            caller.push_value(value);
                        }
                        Ok(())
                    });
                    if let Err(error) = resumed {
                        self.unwind(thread, base, error.into())?;
                    }
                }
                Err(exception) => self.unwind(thread, base, exception)?,
            }
        }
    }

    /// Executes the top frame until it invokes, returns or throws.
    fn interpret(&self, thread: &mut ThreadContext) -> ExecResult<Flow> {
        let method = Arc::clone(thread.frame()?.method());
        let class = method
            .class()
            .ok_or_else(|| VmError::internal("method without a class"))?;
        let code = method
            .code()
            .ok_or_else(|| VmError::internal(format!("{} has no code", method.qualified_name())))?;
        loop {
            let pc = thread.frame()?.pc;
            match self.execute(thread, &class, &method, code, pc)? {
                Flow::Continue => {}
                flow => return Ok(flow),
            }
        }
    }

    fn execute(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        method: &Arc<Method>,
        code: &Code,
        pc: usize,
    ) -> ExecResult<Flow> {
        let stream = &code.stream;
        let byte = u8_at(stream, pc)?;
        let op = Op::from_byte(byte).ok_or_else(|| {
            VmError::internal(format!(
                "invalid opcode {:#04x} at pc {} in {}",
                byte,
                pc,
                method.qualified_name()
            ))
        })?;

        if let Some(next) = execute_local(thread.frame()?, stream, op, pc)? {
            if next <= pc {
                self.poll_safepoint(thread);
            }
            thread.frame()?.pc = next;
            return Ok(Flow::Continue);
        }

        let next = pc + op.length().unwrap_or(1);
        match op {
            // A rewrite of this instruction is in flight
            Op::Lock => {
                std::hint::spin_loop();
                return Ok(Flow::Continue);
            }

            Op::Ldc | Op::LdcW => {
                let index = if op == Op::Ldc {
                    u8_at(stream, pc + 1)? as u16
                } else {
                    u16_at(stream, pc + 1)?
                };
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let value = match class.pool().symbols().get(index) {
                    Some(Constant::Integer(v)) => Value::Int(*v),
                    Some(Constant::Float(v)) => Value::Float(*v),
                    Some(Constant::String { .. }) | Some(Constant::Class { .. }) => {
                        let resolved = self.resolve(thread, class, index, false)?;
                        let value = self.constant_value(thread, &resolved)?;
                        if op == Op::Ldc {
                            self.quicken(method, code, pc, Op::LdcQuick, &[index as u8]);
                        } else {
                            self.quicken(method, code, pc, Op::LdcWQuick, &index.to_be_bytes());
                        }
                        value
                    }
                    other => {
                        return Err(VmError::internal(format!("ldc of {:?}", other)).into())
                    }
                };
                thread.frame()?.push(value);
            }
            Op::LdcQuick | Op::LdcWQuick => {
                let index = if op == Op::LdcQuick {
                    u8_at(stream, pc + 1)? as u16
                } else {
                    u16_at(stream, pc + 1)?
                };
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let resolved = resolved_entry(class, index)?.clone();
                let value = self.constant_value(thread, &resolved)?;
                thread.frame()?.push(value);
            }
            Op::Ldc2W => {
                let index = u16_at(stream, pc + 1)?;
                let value = match class.pool().symbols().get(index) {
                    Some(Constant::Long(v)) => Value::Long(*v),
                    Some(Constant::Double(v)) => Value::Double(*v),
                    other => {
                        return Err(VmError::internal(format!("ldc2_w of {:?}", other)).into())
                    }
                };
                thread.frame()?.push_value(value);
            }

            Op::Iaload | Op::Laload | Op::Faload | Op::Daload | Op::Aaload | Op::Baload
            | Op::Caload | Op::Saload => {
                let frame = thread.frame()?;
                let index = frame.pop_int()?;
                let array = frame.pop_ref()?.ok_or_else(VmError::null_pointer)?;
                let value = self.deref(array)?.array_load(index).map_err(array_error)?;
                frame.push_value(value);
            }
            Op::Iastore | Op::Lastore | Op::Fastore | Op::Dastore | Op::Bastore | Op::Castore
            | Op::Sastore => {
                let frame = thread.frame()?;
                let value = frame.pop_value()?;
                let index = frame.pop_int()?;
                let array = frame.pop_ref()?.ok_or_else(VmError::null_pointer)?;
                self.deref(array)?
                    .array_store(index, value)
                    .map_err(array_error)?;
            }
            Op::Aastore => {
                let frame = thread.frame()?;
                let value = frame.pop()?;
                let index = frame.pop_int()?;
                let array = frame.pop_ref()?.ok_or_else(VmError::null_pointer)?;
                self.store_reference(array, index, value)?;
            }
            Op::Arraylength => {
                let frame = thread.frame()?;
                let array = frame.pop_ref()?.ok_or_else(VmError::null_pointer)?;
                let length = self
                    .deref(array)?
                    .array_length()
                    .ok_or_else(|| array_error(ArrayAccessError::NotArray))?;
                frame.push_int(length as i32);
            }

            Op::Ireturn => return Ok(Flow::Return(Some(Value::Int(thread.frame()?.pop_int()?)))),
            Op::Lreturn => {
                return Ok(Flow::Return(Some(Value::Long(thread.frame()?.pop_long()?))))
            }
            Op::Freturn => {
                return Ok(Flow::Return(Some(Value::Float(thread.frame()?.pop_float()?))))
            }
            Op::Dreturn => {
                return Ok(Flow::Return(Some(Value::Double(thread.frame()?.pop_double()?))))
            }
            Op::Areturn => {
                let value = thread.frame()?.pop_ref()?;
                return Ok(Flow::Return(Some(Value::from_reference(value))));
            }
            Op::Return => return Ok(Flow::Return(None)),

            Op::Getstatic | Op::Putstatic => {
                let index = u16_at(stream, pc + 1)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let field = self.resolve_field(thread, class, index)?;
                if !field.is_static() {
                    return Err(incompatible(format!("Expected static field {}", field.name())));
                }
                let put = op == Op::Putstatic;
                access_static(thread.frame()?, &field, put)?;
                // Only once no thread can still observe the class mid-initialization
                if field.class().is_some_and(|owner| owner.is_initialized()) {
                    let quick = match (put, field.is_wide()) {
                        (false, false) => Op::GetstaticQuick,
                        (false, true) => Op::Getstatic2Quick,
                        (true, false) => Op::PutstaticQuick,
                        (true, true) => Op::Putstatic2Quick,
                    };
                    self.quicken(method, code, pc, quick, &index.to_be_bytes());
                }
            }
            Op::GetstaticQuick | Op::Getstatic2Quick | Op::PutstaticQuick | Op::Putstatic2Quick => {
                let index = u16_at(stream, pc + 1)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let field = resolved_field(class, index)?;
                let put = matches!(op, Op::PutstaticQuick | Op::Putstatic2Quick);
                access_static(thread.frame()?, &field, put)?;
            }

            Op::Getfield | Op::Putfield => {
                let index = u16_at(stream, pc + 1)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let field = self.resolve_field(thread, class, index)?;
                if field.is_static() {
                    return Err(incompatible(format!("Expected non-static field {}", field.name())));
                }
                let put = op == Op::Putfield;
                self.access_field(thread.frame()?, field.offset(), field.is_wide(), put)?;
                match (u8::try_from(field.offset()), put, field.is_wide()) {
                    (Ok(slot), false, false) => {
                        self.quicken(method, code, pc, Op::GetfieldQuick, &[slot, 0])
                    }
                    (Ok(slot), false, true) => {
                        self.quicken(method, code, pc, Op::Getfield2Quick, &[slot, 0])
                    }
                    (Ok(slot), true, false) => {
                        self.quicken(method, code, pc, Op::PutfieldQuick, &[slot, 0])
                    }
                    (Ok(slot), true, true) => {
                        self.quicken(method, code, pc, Op::Putfield2Quick, &[slot, 0])
                    }
                    (Err(_), false, _) => {
                        self.quicken(method, code, pc, Op::GetfieldQuickW, &index.to_be_bytes())
                    }
                    (Err(_), true, _) => {
                        self.quicken(method, code, pc, Op::PutfieldQuickW, &index.to_be_bytes())
                    }
                }
            }
            Op::GetfieldQuick | Op::Getfield2Quick | Op::PutfieldQuick | Op::Putfield2Quick => {
                let slot = u8_at(stream, pc + 1)? as usize;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let wide = matches!(op, Op::Getfield2Quick | Op::Putfield2Quick);
                let put = matches!(op, Op::PutfieldQuick | Op::Putfield2Quick);
                self.access_field(thread.frame()?, slot, wide, put)?;
            }
            Op::GetfieldQuickW | Op::PutfieldQuickW => {
                let index = u16_at(stream, pc + 1)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let field = resolved_field(class, index)?;
                let put = op == Op::PutfieldQuickW;
                self.access_field(thread.frame()?, field.offset(), field.is_wide(), put)?;
            }

            Op::Invokevirtual => {
                let index = u16_at(stream, pc + 1)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let declared = self.resolve_method(thread, class, index)?;
                if declared.is_static() {
                    return Err(incompatible(format!(
                        "Expected non-static method {}",
                        declared.qualified_name()
                    )));
                }
                let receiver = receiver(thread, declared.args_count())?;
                let target = self.select_virtual(receiver, &declared)?;
                if declared.is_private() {
                    self.quicken(method, code, pc, Op::InvokenonvirtualQuick, &index.to_be_bytes());
                } else if let Some(slot) = declared.vtable_index() {
                    match (u8::try_from(slot), u8::try_from(declared.args_count())) {
                        (Ok(slot), Ok(args)) => {
                            self.quicken(method, code, pc, Op::InvokevirtualQuick, &[slot, args])
                        }
                        _ => self.quicken(
                            method,
                            code,
                            pc,
                            Op::InvokevirtualQuickW,
                            &index.to_be_bytes(),
                        ),
                    }
                }
                return self.invoke(thread, &target, next);
            }
            Op::InvokevirtualQuick => {
                let slot = u8_at(stream, pc + 1)? as usize;
                let args = u8_at(stream, pc + 2)? as usize;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let receiver = receiver(thread, args)?;
                let receiver_class = self.class_of(receiver)?;
                let target = link(&receiver_class)?
                    .vtable
                    .get(slot)
                    .cloned()
                    .ok_or_else(|| VmError::internal(format!("vtable slot {} out of range", slot)))?;
                return self.invoke(thread, &target, next);
            }
            Op::InvokevirtualQuickW => {
                let index = u16_at(stream, pc + 1)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let declared = resolved_method(class, index)?;
                let receiver = receiver(thread, declared.args_count())?;
                let target = self.select_virtual(receiver, &declared)?;
                return self.invoke(thread, &target, next);
            }
            Op::Invokespecial => {
                let index = u16_at(stream, pc + 1)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let declared = self.resolve_method(thread, class, index)?;
                if declared.is_static() {
                    return Err(incompatible(format!(
                        "Expected non-static method {}",
                        declared.qualified_name()
                    )));
                }
                receiver(thread, declared.args_count())?;
                let target = match self.super_slot(class, &declared) {
                    Some(slot) => {
                        let target = super_method(class, slot)?;
                        if let Ok(slot) = u16::try_from(slot) {
                            self.quicken(method, code, pc, Op::InvokesuperQuick, &slot.to_be_bytes());
                        }
                        target
                    }
                    None => {
                        self.quicken(method, code, pc, Op::InvokenonvirtualQuick, &index.to_be_bytes());
                        declared
                    }
                };
                return self.invoke(thread, &target, next);
            }
            Op::InvokesuperQuick => {
                let slot = u16_at(stream, pc + 1)? as usize;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let target = super_method(class, slot)?;
                receiver(thread, target.args_count())?;
                return self.invoke(thread, &target, next);
            }
            Op::InvokenonvirtualQuick => {
                let index = u16_at(stream, pc + 1)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let target = resolved_method(class, index)?;
                receiver(thread, target.args_count())?;
                return self.invoke(thread, &target, next);
            }
            Op::Invokestatic => {
                let index = u16_at(stream, pc + 1)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let target = self.resolve_method(thread, class, index)?;
                if !target.is_static() {
                    return Err(incompatible(format!(
                        "Expected static method {}",
                        target.qualified_name()
                    )));
                }
                if target.class().is_some_and(|owner| owner.is_initialized()) {
                    self.quicken(method, code, pc, Op::InvokestaticQuick, &index.to_be_bytes());
                }
                return self.invoke(thread, &target, next);
            }
            Op::InvokestaticQuick => {
                let index = u16_at(stream, pc + 1)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let target = resolved_method(class, index)?;
                return self.invoke(thread, &target, next);
            }
            Op::Invokeinterface => {
                let index = u16_at(stream, pc + 1)?;
                let count = u8_at(stream, pc + 3)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let declared = self.resolve_method(thread, class, index)?;
                let receiver = receiver(thread, declared.args_count())?;
                let receiver_class = self.class_of(receiver)?;
                let target = select_interface(&receiver_class, &declared)?;
                let [high, low] = index.to_be_bytes();
                self.quicken(method, code, pc, Op::InvokeinterfaceQuick, &[high, low, count, 0]);
                return self.invoke(thread, &target, next);
            }
            Op::InvokeinterfaceQuick => {
                let index = u16_at(stream, pc + 1)?;
                if !stream.still(pc, op) {
                    return Ok(Flow::Continue);
                }
                let declared = resolved_method(class, index)?;
                let receiver = receiver(thread, declared.args_count())?;
                let receiver_class = self.class_of(receiver)?;
                let cached = code
                    .call_sites
                    .lock()
                    .get(&pc)
                    .and_then(|cache| cache.lookup(receiver_class.id()));
                let target = match cached {
                    Some(target) => target,
                    None => {
                        let target = select_interface(&receiver_class, &declared)?;
                        code.call_sites
                            .lock()
                            .entry(pc)
                            .or_default()
                            .update(receiver_class.id(), Arc::clone(&target));
                        target
                    }
                };
                return self.invoke(thread, &target, next);
            }

            Op::New => {
                let index = u16_at(stream, pc + 1)?;
                let target = self.resolve_class(thread, class, index, true)?;
                if target.is_abstract() || target.is_interface() || target.is_array() {
                    return Err(VmError::with_message(
                        ErrorKind::IncompatibleClassChangeError,
                        format!("cannot instantiate {}", target.name().replace('/', ".")),
                    )
                    .into());
                }
                let object = self.allocate_instance(thread, &target)?;
                thread.frame()?.push_ref(Some(object));
            }
            Op::Newarray => {
                let code_byte = u8_at(stream, pc + 1)?;
                let descriptor = ArrayKind::from_type_code(code_byte)
                    .and_then(ArrayKind::descriptor)
                    .ok_or_else(|| VmError::internal(format!("bad array type {}", code_byte)))?;
                let array_class = self
                    .registry
                    .load(&format!("[{}", descriptor), LoaderId::BOOTSTRAP)?;
                let length = thread.frame()?.pop_int()?;
                let array = self.allocate_array(thread, &array_class, length)?;
                thread.frame()?.push_ref(Some(array));
            }
            Op::Anewarray => {
                let index = u16_at(stream, pc + 1)?;
                let component = self.resolve_class(thread, class, index, false)?;
                let array_class = self.array_class_of(&component)?;
                let length = thread.frame()?.pop_int()?;
                let array = self.allocate_array(thread, &array_class, length)?;
                thread.frame()?.push_ref(Some(array));
            }
            Op::Multianewarray => {
                let index = u16_at(stream, pc + 1)?;
                let dimensions = u8_at(stream, pc + 3)? as usize;
                let array_class = self.resolve_class(thread, class, index, false)?;
                if dimensions == 0 {
                    return Err(VmError::internal("multianewarray with no dimensions").into());
                }
                let counts = thread.frame()?.take(dimensions)?;
                let counts = counts
                    .iter()
                    .map(|count| {
                        count
                            .as_int()
                            .ok_or_else(|| VmError::internal("array dimension is not an int"))
                    })
                    .collect::<Result<Vec<i32>, VmError>>()?;
                if let Some(negative) = counts.iter().find(|count| **count < 0) {
                    return Err(VmError::with_message(
                        ErrorKind::NegativeArraySizeException,
                        negative.to_string(),
                    )
                    .into());
                }
                let array = self.new_multi_array(thread, &array_class, &counts)?;
                thread.frame()?.push_ref(Some(array));
            }

            Op::Athrow => {
                let throwable = thread
                    .frame()?
                    .pop_ref()?
                    .ok_or_else(VmError::null_pointer)?;
                self.fill_in_stack_trace(thread, throwable);
                return Err(Exception::Thrown(throwable));
            }
            Op::Checkcast => {
                let index = u16_at(stream, pc + 1)?;
                let target = self.resolve_class(thread, class, index, false)?;
                if let Some(object) = thread.frame()?.receiver(1)? {
                    let actual = self.class_of(object)?;
                    if !actual.is_assignable_to(&target) {
                        return Err(VmError::with_message(
                            ErrorKind::ClassCastException,
                            format!(
                                "{} cannot be cast to {}",
                                actual.name().replace('/', "."),
                                target.name().replace('/', ".")
                            ),
                        )
                        .into());
                    }
                }
            }
            Op::Instanceof => {
                let index = u16_at(stream, pc + 1)?;
                let target = self.resolve_class(thread, class, index, false)?;
                let object = thread.frame()?.pop_ref()?;
                let result = match object {
                    Some(object) => self.class_of(object)?.is_assignable_to(&target),
                    None => false,
                };
                thread.frame()?.push_int(result as i32);
            }
            Op::Monitorenter => {
                let object = thread.frame()?.receiver(1)?.ok_or_else(VmError::null_pointer)?;
                self.monitor_enter(thread, object)?;
                thread.frame()?.pop()?;
            }
            Op::Monitorexit => {
                let object = thread
                    .frame()?
                    .pop_ref()?
                    .ok_or_else(VmError::null_pointer)?;
                self.deref(object)?
                    .monitor()
                    .exit(thread.id)
                    .map_err(monitor_error)?;
            }

            other => {
                return Err(VmError::internal(format!(
                    "unexpected {} at pc {} in {}",
                    other.mnemonic(),
                    pc,
                    method.qualified_name()
                ))
                .into())
            }
        }
        thread.frame()?.pc = next;
        Ok(Flow::Continue)
    }

    /// Replaces the instruction at `pc` with its quick form.
    fn quicken(&self, method: &Method, code: &Code, pc: usize, quick: Op, operands: &[u8]) {
        if !self.config.quickening {
            return;
        }
        code.stream.rewrite(pc, quick, operands);
        log::trace!(
            "{}{} pc {}: rewritten to {}",
            method.qualified_name(),
            method.descriptor(),
            pc,
            quick.mnemonic()
        );
    }

    fn constant_value(&self, thread: &mut ThreadContext, resolved: &Resolved) -> ExecResult<Value> {
        match resolved {
            Resolved::String(id) => Ok(Value::Reference(*id)),
            Resolved::Class(class) => Ok(Value::Reference(self.mirror(thread, class)?)),
            other => Err(VmError::internal(format!("constant resolved to {:?}", other)).into()),
        }
    }

    fn access_field(
        &self,
        frame: &mut CallFrame,
        offset: usize,
        wide: bool,
        put: bool,
    ) -> ExecResult<()> {
        let missing = || VmError::internal(format!("field slot {} out of range", offset));
        if put {
            let value = if wide { frame.pop_value()? } else { frame.pop()? };
            let object = frame.pop_ref()?.ok_or_else(VmError::null_pointer)?;
            if !self.deref(object)?.set_field(offset, value) {
                return Err(missing().into());
            }
        } else {
            let object = frame.pop_ref()?.ok_or_else(VmError::null_pointer)?;
            let value = self.deref(object)?.field(offset).ok_or_else(missing)?;
            frame.push_value(value);
        }
        Ok(())
    }

    /// `aastore`: null check, bounds check, then the element type check.
    fn store_reference(&self, array: ObjectId, index: i32, value: Value) -> ExecResult<()> {
        let target = self.deref(array)?;
        let length = target
            .array_length()
            .ok_or_else(|| array_error(ArrayAccessError::NotArray))?;
        if index < 0 || index as usize >= length {
            return Err(VmError::index_out_of_bounds(index).into());
        }
        if let Some(element) = value.object() {
            let array_class = self.class_of(array)?;
            let element_class = self.class_of(element)?;
            let accepted = array_class
                .array_info()
                .and_then(|info| info.component.as_ref())
                .is_some_and(|component| element_class.is_assignable_to(component));
            if !accepted {
                return Err(VmError::with_message(
                    ErrorKind::ArrayStoreException,
                    element_class.name().replace('/', "."),
                )
                .into());
            }
        }
        target.array_store(index, value).map_err(array_error)?;
        Ok(())
    }

    fn new_multi_array(
        &self,
        thread: &mut ThreadContext,
        class: &Arc<Class>,
        counts: &[i32],
    ) -> ExecResult<ObjectId> {
        let array = self.allocate_array(thread, class, counts[0])?;
        if counts.len() == 1 {
            return Ok(array);
        }
        let component = class
            .array_info()
            .and_then(|info| info.component.clone())
            .ok_or_else(|| VmError::internal(format!("{} has too few dimensions", class.name())))?;
        thread.handles.push(array);
        let filled: ExecResult<()> = (0..counts[0]).try_for_each(|index| {
            let element = self.new_multi_array(thread, &component, &counts[1..])?;
            self.deref(array)?
                .array_store(index, Value::Reference(element))
                .map_err(|error| array_error(error).into())
        });
        thread.handles.pop();
        filled.map(|()| array)
    }

    /// Method a virtual call of `declared` selects for `receiver`.
    fn select_virtual(&self, receiver: ObjectId, declared: &Arc<Method>) -> ExecResult<Arc<Method>> {
        if declared.is_private() || declared.is_initializer() {
            return Ok(Arc::clone(declared));
        }
        let class = self.class_of(receiver)?;
        let selected = match declared.vtable_index() {
            Some(slot) => link(&class)?.vtable.get(slot).cloned(),
            None => class
                .find_method(declared.name(), declared.descriptor())
                .filter(|m| !m.is_abstract()),
        };
        selected.ok_or_else(|| abstract_method(declared))
    }

    /// Dispatch slot for `invokespecial` with superclass semantics: the
    /// caller opted in, the target is an ordinary method, and it is
    /// declared by a proper superclass of the caller.
    fn super_slot(&self, caller: &Class, declared: &Method) -> Option<usize> {
        if !caller.has_super_semantics() || declared.is_initializer() || declared.is_private() {
            return None;
        }
        let owner = declared.class()?;
        if owner.id() == caller.id() || owner.is_interface() || !caller.is_subclass_of(&owner) {
            return None;
        }
        declared.vtable_index()
    }

    /// Pushes the frame of a bytecode method, entering its monitor if it is
    /// synchronized.
    fn push_method_frame(
        &self,
        thread: &mut ThreadContext,
        method: &Arc<Method>,
        args: Vec<Value>,
    ) -> ExecResult<()> {
        let lock = if method.is_synchronized() {
            let class = method
                .class()
                .ok_or_else(|| VmError::internal("method without a class"))?;
            Some(self.method_lock(thread, method, &class, &args)?)
        } else {
            None
        };
        thread.push_frame(CallFrame::new(Arc::clone(method), args, lock));
        if let Some(object) = lock {
            if let Err(exception) = self.monitor_enter(thread, object) {
                thread.pop_frame();
                return Err(exception);
            }
        }
        Ok(())
    }

    /// Object a synchronized method locks: the class mirror for static
    /// methods, the receiver otherwise.
    pub(crate) fn method_lock(
        &self,
        thread: &mut ThreadContext,
        method: &Method,
        class: &Arc<Class>,
        args: &[Value],
    ) -> ExecResult<ObjectId> {
        if method.is_static() {
            let mark = thread.handles.len();
            thread.handles.extend(args.iter().filter_map(Value::object));
            let mirror = self.mirror(thread, class);
            thread.handles.truncate(mark);
            mirror
        } else {
            args.first()
                .and_then(Value::object)
                .ok_or_else(|| VmError::null_pointer().into())
        }
    }

    /// Enters `object`'s monitor, blocking outside the safe-point protocol
    /// if it is contended.
    pub(crate) fn monitor_enter(&self, thread: &mut ThreadContext, object: ObjectId) -> ExecResult<()> {
        let target = self.deref(object)?;
        let monitor = target.monitor();
        if !monitor.try_enter(thread.id) {
            thread.handles.push(object);
            self.enter_blocking(thread);
            monitor.enter(thread.id);
            self.leave_blocking(thread);
            thread.handles.pop();
        }
        Ok(())
    }

    /// Exits the monitor a finished frame holds.
    pub(crate) fn release_frame(&self, thread: &ThreadContext, frame: &CallFrame) -> Result<(), VmError> {
        match frame.lock {
            Some(object) => self
                .heap
                .get(object)
                .ok_or_else(|| VmError::internal(format!("dangling monitor {}", object)))?
                .monitor()
                .exit(thread.id)
                .map_err(monitor_error),
            None => Ok(()),
        }
    }

    /// Transfers control to `target`, whose arguments are on top of the
    /// current frame's operand stack.
    fn invoke(&self, thread: &mut ThreadContext, target: &Arc<Method>, next: usize) -> ExecResult<Flow> {
        if target.is_abstract() {
            return Err(abstract_method(target));
        }
        self.poll_safepoint(thread);
        if !thread.fits(target.frame_size()) {
            return Err(VmError::new(ErrorKind::StackOverflowError).into());
        }
        let frame = thread.frame()?;
        let args = frame.take(target.args_count())?;
        frame.resume_pc = next;

        if target.is_native() {
            let result = self.call_native(thread, target, args)?;
            let frame = thread.frame()?;
            if let Some(value) = result {
                frame.push_value(value);
            }
            frame.pc = next;
            return Ok(Flow::Continue);
        }
        self.push_method_frame(thread, target, args)?;
        Ok(Flow::Invoked)
    }

    /// Dispatches a throwable to the nearest handler above `base`. Frames
    /// without a handler are popped, releasing their monitors. Returns the
    /// throwable once no frame above `base` is left.
    fn unwind(&self, thread: &mut ThreadContext, base: usize, exception: Exception) -> ExecResult<()> {
        let throwable = self.materialize(thread, exception);
        thread.handles.push(throwable);
        let outcome = self.find_handler_frame(thread, base, throwable);
        thread.handles.pop();
        if outcome.is_err() {
            while thread.depth() > base {
                if let Some(frame) = thread.pop_frame() {
                    let _ = self.release_frame(thread, &frame);
                }
            }
        }
        outcome
    }

    fn find_handler_frame(
        &self,
        thread: &mut ThreadContext,
        base: usize,
        throwable: ObjectId,
    ) -> ExecResult<()> {
        let thrown = self.class_of(throwable)?;
        while thread.depth() > base {
            let (method, pc) = {
                let frame = thread.frame()?;
                (Arc::clone(frame.method()), frame.pc())
            };
            if let Some(handler) = self.find_handler(thread, &method, pc, &thrown) {
                let frame = thread.frame()?;
                frame.stack.clear();
                frame.push_ref(Some(throwable));
                frame.pc = handler;
                return Ok(());
            }
            if let Some(frame) = thread.pop_frame() {
                if let Err(error) = self.release_frame(thread, &frame) {
                    log::debug!("unwinding {}: {}", method.qualified_name(), error);
                }
            }
        }
        Err(Exception::Thrown(throwable))
    }

    /// First exception-table entry of `method` covering `pc` that catches
    /// `thrown`. An entry whose catch type cannot be resolved is skipped.
    fn find_handler(
        &self,
        thread: &mut ThreadContext,
        method: &Method,
        pc: usize,
        thrown: &Class,
    ) -> Option<usize> {
        let code = method.code()?;
        let class = method.class()?;
        for entry in code.exception_table() {
            if !entry.covers(pc) {
                continue;
            }
            if entry.catch_type == 0 {
                return Some(entry.handler_pc as usize);
            }
            match self.resolve_class(thread, &class, entry.catch_type, false) {
                Ok(catch) if thrown.is_subclass_of(&catch) => return Some(entry.handler_pc as usize),
                Ok(_) => {}
                Err(_) => log::debug!(
                    "{} pc {}: skipping handler whose catch type does not resolve",
                    method.qualified_name(),
                    entry.handler_pc
                ),
            }
        }
        None
    }
}

/// Receiver of a call taking `args` slots; null raises
/// `NullPointerException`.
fn receiver(thread: &mut ThreadContext, args: usize) -> ExecResult<ObjectId> {
    Ok(thread
        .frame()?
        .receiver(args)?
        .ok_or_else(VmError::null_pointer)?)
}

fn access_static(frame: &mut CallFrame, field: &Field, put: bool) -> Result<(), VmError> {
    if put {
        let value = if field.is_wide() {
            frame.pop_value()?
        } else {
            frame.pop()?
        };
        field.set_static(value);
    } else {
        frame.push_value(field.get_static());
    }
    Ok(())
}

fn resolved_entry(class: &Class, index: u16) -> Result<&Resolved, VmError> {
    class.pool().resolved(index).ok_or_else(|| {
        VmError::internal(format!(
            "quick instruction on unresolved entry {} of {}",
            index,
            class.name()
        ))
    })
}

fn resolved_field(class: &Class, index: u16) -> Result<Arc<Field>, VmError> {
    match resolved_entry(class, index)? {
        Resolved::Field(field) => Ok(Arc::clone(field)),
        other => Err(VmError::internal(format!("expected a field, found {:?}", other))),
    }
}

fn resolved_method(class: &Class, index: u16) -> Result<Arc<Method>, VmError> {
    match resolved_entry(class, index)? {
        Resolved::Method(method) => Ok(Arc::clone(method)),
        other => Err(VmError::internal(format!("expected a method, found {:?}", other))),
    }
}

/// Method at `slot` of the caller's superclass dispatch table.
fn super_method(caller: &Class, slot: usize) -> Result<Arc<Method>, VmError> {
    caller
        .super_class()
        .and_then(|super_class| super_class.linkage())
        .and_then(|linkage| linkage.vtable.get(slot).cloned())
        .ok_or_else(|| VmError::internal(format!("no superclass slot {} for {}", slot, caller.name())))
}

/// Implementation of interface method `declared` in `receiver`.
fn select_interface(receiver: &Class, declared: &Method) -> ExecResult<Arc<Method>> {
    if let Some(interface) = declared.class() {
        if interface.is_interface() && !receiver.implements(&interface) {
            return Err(incompatible(format!(
                "Class {} does not implement the requested interface {}",
                receiver.name().replace('/', "."),
                interface.name().replace('/', ".")
            )));
        }
    }
    receiver
        .find_method(declared.name(), declared.descriptor())
        .filter(|method| !method.is_abstract() && !method.is_static())
        .ok_or_else(|| abstract_method(declared))
}
