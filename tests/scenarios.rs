mod common;

use la64::cpu::opcode;
use la64::machine::Machine;
use la64::mmio::MmioDevice;

fn entry_image(entry: u64) -> Vec<u8> {
    entry.to_le_bytes().to_vec()
}

#[test]
fn s1_decode_and_halt() {
    let mut image = entry_image(0x08);
    common::place(&mut image, 0x08, &[opcode::NOP, opcode::HLT]);

    let mut h = common::Harness::new(0x1000, &image);
    h.step();
    assert!(!h.cpu.halted);
    assert_eq!(h.cpu.pc(), 0x09);

    h.step();
    assert!(h.cpu.halted);
    assert_eq!(h.cpu.pc(), 0x0A);
}

#[test]
fn s2_immediate_move() {
    let mut image = entry_image(0x08);
    let mov = common::encode_mov_r0_imm8(27);
    let ilen = mov.len();
    let mut at = 0x08;
    common::place(&mut image, at, &mov);
    at += ilen;
    common::place(&mut image, at, &[opcode::HLT]);

    let mut h = common::Harness::new(0x1000, &image);
    h.step();
    assert_eq!(h.cpu.registers[la64::cpu::REG_R0], 27);
    assert_eq!(h.cpu.pc() as usize, 0x08 + ilen);
}

#[test]
fn s3_division_by_zero_raises_software_irq() {
    // DIV R0, R1, R2 with R1=R2=0 (default): divisor 0 triggers BAD_ARITHMETIC.
    let mut image = entry_image(0x08);
    let div = {
        use la64::cpu::REG_R0;
        let mut bits: Vec<u8> = Vec::new();
        let mut push = |v: u64, width: u32| {
            for i in 0..width {
                bits.push(((v >> i) & 1) as u8);
            }
        };
        push(opcode::DIV as u64, 8);
        push(0b001, 3);
        push(REG_R0 as u64, 5); // dst = R0
        push(0b001, 3);
        push((REG_R0 + 1) as u64, 5); // a = R1
        push(0b001, 3);
        push((REG_R0 + 2) as u64, 5); // b = R2
        push(0b000, 3);
        let mut bytes = vec![0u8; bits.len().div_ceil(8)];
        for (i, bit) in bits.iter().enumerate() {
            if *bit != 0 {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }
        bytes
    };
    common::place(&mut image, 0x08, &div);

    let mut h = common::Harness::new(0x1000, &image);
    // Set up a software-IRQ vector before stepping: vector_base=0x100,
    // handler at 0x100 + 4*8 for line IRQ_SOFTWARE=4 is at 0x20+0x100.
    {
        let mut intc = h.intc.borrow_mut();
        intc.write(0x18, 0x100, 8); // REG_VECTOR
        intc.write(0x08, 0xff, 8); // REG_ENABLED
        intc.write(0x10, 1, 8); // REG_CTRL: global enable
    }
    h.memory.write(0x100 + 4 * 8, 0x200, 8); // vector table entry for line 4
    h.memory.write(0x200, opcode::HLT as u64, 1);

    h.step(); // R1=R2=0, DIV raises BadArithmetic; halts and raises software IRQ
    h.step(); // INTC services the software IRQ, jumps PC to 0x200

    assert_eq!(h.cpu.pc(), 0x200);
}

#[test]
fn s7_rtc_reads_are_close_together() {
    use std::time::Duration;

    let mut rtc = la64::rtc::Rtc::new();
    let first = rtc.read(0x20, 8);
    std::thread::sleep(Duration::from_millis(50));
    let second = rtc.read(0x20, 8);
    assert!(second >= first);
    assert!(second - first <= 1);
}

#[test]
fn s8_memsize_probe_reflects_construction() {
    let mut probe = la64::memsize::MemSizeProbe::new(0x4000);
    assert_eq!(probe.read(0, 8), 0x4000);
}

#[test]
fn s9_platform_poweroff_is_observable() {
    let mut platform = la64::platform::PlatformPower::new();
    let handle = platform.handle();
    assert!(handle.is_on());
    platform.write(0x00, 0, 1);
    assert!(!handle.is_on());
}

#[test]
fn machine_construction_rejects_oversized_image() {
    let image = vec![0u8; 0x2000];
    let err = Machine::new(0x1000, &image, false);
    assert!(err.is_err());
}

#[test]
fn machine_construction_boots_pc_from_entry_bytes() {
    let mut image = entry_image(0x08);
    common::place(&mut image, 0x08, &[opcode::HLT]);
    let machine = Machine::new(0x1000, &image, false);
    assert!(machine.is_ok());
}
