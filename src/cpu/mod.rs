pub mod decode;
pub mod dispatch;
pub mod execute;
pub mod opcode;

pub const REG_PC: usize = 0;
pub const REG_SP: usize = 1;
pub const REG_FP: usize = 2;
pub const REG_CF: usize = 3;
pub const REG_R0: usize = 4;
pub const REG_COUNT: usize = 32;
pub const REG_RR: usize = 31;

/// Number of general-purpose `R0..R26` registers available as `BL`
/// argument targets.
pub const GPR_COUNT: usize = 27;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CompareFlags: u64 {
        const Z = 1;
        const L = 2;
        const G = 4;
    }
}

/// In-guest CPU exception tag, routed through the software IRQ by the
/// execution loop — distinct from [`crate::error::MachineError`], which
/// aborts host startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Exception {
    #[default]
    None,
    BadAccess,
    Permission,
    BadInstruction,
    BadArithmetic,
}

/// An operand cell: either a register slot or a per-instruction
/// immediate slot. Handlers read/write through this uniformly — a
/// tagged variant standing in for the source's raw-pointer aliasing
/// between register and immediate cells.
#[derive(Clone, Copy, Debug)]
pub enum Operand {
    Register(usize),
    Immediate(usize),
}

/// The decoded instruction at the current PC.
#[derive(Default)]
pub struct Operation {
    pub opcode: u8,
    pub ilen: u8,
    pub params: Vec<Operand>,
    imm: Vec<u64>,
}

impl Operation {
    fn reset(&mut self) {
        self.opcode = 0;
        self.ilen = 0;
        self.params.clear();
        self.imm.clear();
    }

    fn push_register(&mut self, index: usize) {
        self.params.push(Operand::Register(index));
    }

    fn push_immediate(&mut self, value: u64) {
        let slot = self.imm.len();
        self.imm.push(value);
        self.params.push(Operand::Immediate(slot));
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

pub struct Cpu {
    pub registers: [u64; REG_COUNT],
    pub op: Operation,
    pub exception: Exception,
    pub halted: bool,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            registers: [0; REG_COUNT],
            op: Operation::default(),
            exception: Exception::None,
            halted: false,
        }
    }

    pub fn pc(&self) -> u64 {
        self.registers[REG_PC]
    }

    pub fn set_pc(&mut self, value: u64) {
        self.registers[REG_PC] = value;
    }

    pub fn sp(&self) -> u64 {
        self.registers[REG_SP]
    }

    pub fn set_sp(&mut self, value: u64) {
        self.registers[REG_SP] = value;
    }

    pub fn cf(&self) -> CompareFlags {
        CompareFlags::from_bits_truncate(self.registers[REG_CF])
    }

    pub fn set_cf(&mut self, flags: CompareFlags) {
        self.registers[REG_CF] = flags.bits();
    }

    /// Reads operand `i` of the decoded operation.
    pub fn read(&self, i: usize) -> u64 {
        match self.op.params[i] {
            Operand::Register(r) => self.registers[r],
            Operand::Immediate(slot) => self.op.imm[slot],
        }
    }

    /// Writes operand `i` of the decoded operation. Writes to an
    /// immediate cell land in per-instruction scratch and are never
    /// observed again — this mirrors the source's uniform
    /// register-or-immediate pointer, not a meaningful guest effect.
    pub fn write(&mut self, i: usize, value: u64) {
        match self.op.params[i] {
            Operand::Register(r) => self.registers[r] = value,
            Operand::Immediate(slot) => self.op.imm[slot] = value,
        }
    }

    pub fn raise(&mut self, exception: Exception) {
        self.exception = exception;
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
