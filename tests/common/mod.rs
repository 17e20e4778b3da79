use std::cell::RefCell;
use std::rc::Rc;

use la64::cpu::{self, opcode, Cpu};
use la64::intc::{Intc, IRQ_TIMER};
use la64::memory::Memory;
use la64::timer::Timer;

/// Drives a bare CPU/memory/INTC/timer quad through the execution loop,
/// without a `Machine` (and so without spawning the UART host thread).
pub struct Harness {
    pub cpu: Cpu,
    pub memory: Memory,
    pub intc: Rc<RefCell<Intc>>,
    pub timer: Rc<RefCell<Timer>>,
}

impl Harness {
    pub fn new(memory_size: u64, image: &[u8]) -> Self {
        let mut memory = Memory::new(memory_size);
        memory.load_image(image);

        let intc = Intc::new();
        let timer = Timer::new(10_000_000, IRQ_TIMER, intc.pending_handle());

        let mut cpu = Cpu::new();
        cpu.set_pc(memory.read(0, 8).expect("image carries an 8-byte entry address"));
        cpu.set_sp(memory_size - 8);

        Harness {
            cpu,
            memory,
            intc: Rc::new(RefCell::new(intc)),
            timer: Rc::new(RefCell::new(timer)),
        }
    }

    pub fn step(&mut self) {
        let software_irq = self.intc.borrow().pending_handle();
        cpu::execute::step(&mut self.cpu, &mut self.memory, &self.intc, &self.timer, &software_irq);
    }
}

/// Hand-packs `opcode=MOV, tag=REG reg=R0, tag=IMM8 imm=value, tag=END`
/// LSB-first, matching the instruction encoding's little-endian bitfields.
pub fn encode_mov_r0_imm8(value: u8) -> Vec<u8> {
    const CODING_REG: u64 = 0b001;
    const CODING_IMM8: u64 = 0b010;
    const CODING_END: u64 = 0b000;

    let mut bits: Vec<u8> = Vec::new();
    let mut push = |v: u64, width: u32| {
        for i in 0..width {
            bits.push(((v >> i) & 1) as u8);
        }
    };
    push(opcode::MOV as u64, 8);
    push(CODING_REG, 3);
    push(la64::cpu::REG_R0 as u64, 5);
    push(CODING_IMM8, 3);
    push(value as u64, 8);
    push(CODING_END, 3);

    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit != 0 {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Appends `bytes` at the end of `image` and returns the offset they
/// start at, padding with zeroes first if `image` is shorter than
/// `at`.
pub fn place(image: &mut Vec<u8>, at: usize, bytes: &[u8]) {
    if image.len() < at {
        image.resize(at, 0);
    }
    image.truncate(at);
    image.extend_from_slice(bytes);
}
