use crate::cpu::{Cpu, Exception};

use super::arity;

/// Resolves the (dst_index, a, b) operands for a binary ALU op accepting
/// either n=2 (in-place `P[0] <- P[0] op P[1]`) or n=3
/// (`P[0] <- P[1] op P[2]`).
fn binary_operands(cpu: &Cpu) -> Option<(usize, u64, u64)> {
    match cpu.op.param_count() {
        2 => Some((0, cpu.read(0), cpu.read(1))),
        3 => Some((0, cpu.read(1), cpu.read(2))),
        _ => None,
    }
}

pub fn binary(cpu: &mut Cpu, op: impl Fn(u64, u64) -> u64) {
    let Some((dst, a, b)) = binary_operands(cpu) else {
        cpu.raise(Exception::BadInstruction);
        return;
    };
    cpu.write(dst, op(a, b));
}

#[derive(Clone, Copy)]
pub enum DivKind {
    Unsigned,
    Signed,
}

#[derive(Clone, Copy)]
pub enum DivOp {
    Quotient,
    Remainder,
}

pub fn division(cpu: &mut Cpu, kind: DivKind, op: DivOp) {
    let Some((dst, a, b)) = binary_operands(cpu) else {
        cpu.raise(Exception::BadInstruction);
        return;
    };
    if b == 0 {
        cpu.raise(Exception::BadArithmetic);
        return;
    }
    let result = match (kind, op) {
        (DivKind::Unsigned, DivOp::Quotient) => a / b,
        (DivKind::Unsigned, DivOp::Remainder) => a % b,
        (DivKind::Signed, DivOp::Quotient) => ((a as i64).wrapping_div(b as i64)) as u64,
        (DivKind::Signed, DivOp::Remainder) => ((a as i64).wrapping_rem(b as i64)) as u64,
    };
    cpu.write(dst, result);
}

pub fn unary_each(cpu: &mut Cpu, op: impl Fn(u64) -> u64) {
    let n = cpu.op.param_count();
    if n < 1 {
        cpu.raise(Exception::BadInstruction);
        return;
    }
    for i in 0..n {
        let v = cpu.read(i);
        cpu.write(i, op(v));
    }
}

pub fn not(cpu: &mut Cpu) {
    if !arity(cpu, cpu.op.param_count(), &[1]) {
        return;
    }
    let v = cpu.read(0);
    cpu.write(0, !v);
}

pub fn rotate(cpu: &mut Cpu, right: bool) {
    let n = cpu.op.param_count();
    let amount = match n {
        1 => 1,
        2 => (cpu.read(1) % 64) as u32,
        _ => {
            cpu.raise(Exception::BadInstruction);
            return;
        }
    };
    let v = cpu.read(0);
    let result = if right {
        v.rotate_right(amount)
    } else {
        v.rotate_left(amount)
    };
    cpu.write(0, result);
}

pub fn pdep(cpu: &mut Cpu) {
    let Some((dst, src, mask)) = binary_operands(cpu) else {
        cpu.raise(Exception::BadInstruction);
        return;
    };
    let mut result: u64 = 0;
    let mut bit = 0u32;
    for i in 0..64u32 {
        if (mask >> i) & 1 == 1 {
            result |= ((src >> bit) & 1) << i;
            bit += 1;
        }
    }
    cpu.write(dst, result);
}

pub fn pext(cpu: &mut Cpu) {
    let Some((dst, src, mask)) = binary_operands(cpu) else {
        cpu.raise(Exception::BadInstruction);
        return;
    };
    let mut result: u64 = 0;
    let mut bit = 0u32;
    for i in 0..64u32 {
        if (mask >> i) & 1 == 1 {
            result |= ((src >> i) & 1) << bit;
            bit += 1;
        }
    }
    cpu.write(dst, result);
}

pub fn bswap(cpu: &mut Cpu, width: u8) {
    if !arity(cpu, cpu.op.param_count(), &[1]) {
        return;
    }
    let v = cpu.read(0);
    let result = match width {
        2 => (v as u16).swap_bytes() as u64,
        4 => (v as u32).swap_bytes() as u64,
        8 => v.swap_bytes(),
        _ => unreachable!("bswap width is always 2, 4, or 8"),
    };
    cpu.write(0, result);
}
