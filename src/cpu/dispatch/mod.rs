mod alu;
mod control;
mod core;
mod data;

use crate::memory::Memory;

use super::{opcode, Cpu, Exception};

/// Dispatches the currently decoded instruction in `cpu.op`. Handlers
/// raise into `cpu.exception` on arity violations or arithmetic/access
/// faults rather than returning a `Result`, matching the execution
/// loop's "observe the tag on the next iteration" contract.
pub fn dispatch(cpu: &mut Cpu, memory: &mut Memory) {
    match cpu.op.opcode {
        opcode::HLT => core::hlt(cpu),
        opcode::NOP => core::nop(cpu),

        opcode::CLR => data::clr(cpu),
        opcode::MOV => data::mov(cpu),
        opcode::SWP => data::swp(cpu),
        opcode::SWPZ => data::swpz(cpu),
        opcode::PUSH => data::push(cpu, memory),
        opcode::POP => data::pop(cpu, memory),
        opcode::LDB => data::load(cpu, memory, 1),
        opcode::LDW => data::load(cpu, memory, 2),
        opcode::LDD => data::load(cpu, memory, 4),
        opcode::LDQ => data::load(cpu, memory, 8),
        opcode::STB => data::store(cpu, memory, 1),
        opcode::STW => data::store(cpu, memory, 2),
        opcode::STD => data::store(cpu, memory, 4),
        opcode::STQ => data::store(cpu, memory, 8),

        opcode::ADD => alu::binary(cpu, |a, b| a.wrapping_add(b)),
        opcode::SUB => alu::binary(cpu, |a, b| a.wrapping_sub(b)),
        opcode::MUL => alu::binary(cpu, |a, b| a.wrapping_mul(b)),
        opcode::DIV => alu::division(cpu, alu::DivKind::Unsigned, alu::DivOp::Quotient),
        opcode::IDIV => alu::division(cpu, alu::DivKind::Signed, alu::DivOp::Quotient),
        opcode::MOD => alu::division(cpu, alu::DivKind::Unsigned, alu::DivOp::Remainder),
        opcode::INC => alu::unary_each(cpu, |a| a.wrapping_add(1)),
        opcode::DEC => alu::unary_each(cpu, |a| a.wrapping_sub(1)),
        opcode::NOT => alu::not(cpu),
        opcode::AND => alu::binary(cpu, |a, b| a & b),
        opcode::OR => alu::binary(cpu, |a, b| a | b),
        opcode::XOR => alu::binary(cpu, |a, b| a ^ b),
        opcode::SHR => alu::binary(cpu, |a, b| a.wrapping_shr((b & 63) as u32)),
        opcode::SHL => alu::binary(cpu, |a, b| a.wrapping_shl((b & 63) as u32)),
        opcode::ROR => alu::rotate(cpu, true),
        opcode::ROL => alu::rotate(cpu, false),

        opcode::JMP => control::jmp(cpu),
        opcode::CMP => control::cmp(cpu),
        opcode::JE => control::jcc(cpu, |cf| cf.contains(super::CompareFlags::Z)),
        opcode::JNE => control::jcc(cpu, |cf| !cf.contains(super::CompareFlags::Z)),
        opcode::JLT => control::jcc(cpu, |cf| cf.contains(super::CompareFlags::L)),
        opcode::JGT => control::jcc(cpu, |cf| cf.contains(super::CompareFlags::G)),
        opcode::JLE => control::jcc(cpu, |cf| {
            cf.contains(super::CompareFlags::L) || cf.contains(super::CompareFlags::Z)
        }),
        opcode::JGE => control::jcc(cpu, |cf| {
            cf.contains(super::CompareFlags::G) || cf.contains(super::CompareFlags::Z)
        }),
        opcode::JZ => control::jz(cpu, true),
        opcode::JNZ => control::jz(cpu, false),
        opcode::BL => control::bl(cpu, memory),
        opcode::RET => control::ret(cpu, memory),

        opcode::PDEP => alu::pdep(cpu),
        opcode::PEXT => alu::pext(cpu),
        opcode::BSWAPW => alu::bswap(cpu, 2),
        opcode::BSWAPD => alu::bswap(cpu, 4),
        opcode::BSWAPQ => alu::bswap(cpu, 8),

        _ => cpu.raise(Exception::BadInstruction),
    }
}

/// Shared arity guard: raises `BadInstruction` and returns `false` if
/// `n` isn't an accepted operand count.
fn arity(cpu: &mut Cpu, n: usize, accepted: &[usize]) -> bool {
    if accepted.contains(&n) {
        true
    } else {
        cpu.raise(Exception::BadInstruction);
        false
    }
}
