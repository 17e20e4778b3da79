use crate::bitreader::BitReader;
use crate::memory::Memory;

use super::{Exception, Operation};

const WINDOW_SIZE: u64 = 32;
const MAX_OPERANDS: usize = 32;

const CODING_INSTR_END: u64 = 0b000;
const CODING_REG: u64 = 0b001;
const CODING_IMM8: u64 = 0b010;
const CODING_IMM16: u64 = 0b011;
const CODING_IMM32: u64 = 0b100;
const CODING_IMM64: u64 = 0b101;

/// Decodes the instruction at `pc`, writing the result into `op`. On
/// failure sets `op.opcode`/`ilen` to 0 and returns the exception that
/// should be raised.
pub fn decode_at(memory: &Memory, pc: u64, op: &mut Operation) -> Result<(), Exception> {
    op.reset();

    let Some(available) = memory.size().checked_sub(pc) else {
        return Err(Exception::BadAccess);
    };
    let window_size = WINDOW_SIZE.min(available);
    let Some(window) = memory.access(pc, window_size) else {
        return Err(Exception::BadAccess);
    };

    let mut reader = BitReader::new(window);
    op.opcode = reader.read(8) as u8;

    if matches!(op.opcode, super::opcode::HLT | super::opcode::NOP | super::opcode::RET) {
        op.ilen = 1;
        return Ok(());
    }

    loop {
        if op.param_count() >= MAX_OPERANDS {
            break;
        }

        let tag = reader.read(3);
        match tag {
            CODING_INSTR_END => break,
            CODING_REG => {
                let index = reader.read(5) as usize;
                op.push_register(index);
            }
            CODING_IMM8 => op.push_immediate(reader.read(8)),
            CODING_IMM16 => op.push_immediate(reader.read(16)),
            CODING_IMM32 => op.push_immediate(reader.read(32)),
            CODING_IMM64 => op.push_immediate(reader.read(64)),
            _ => return Err(Exception::BadInstruction),
        }
    }

    op.ilen = reader.bytes_used() as u8;
    Ok(())
}
