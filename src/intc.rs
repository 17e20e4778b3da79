use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::memory::Memory;
use crate::mmio::MmioDevice;

pub const IRQ_TIMER: u32 = 0;
pub const IRQ_UART: u32 = 1;
pub const IRQ_DISK: u32 = 2;
pub const IRQ_NETWORK: u32 = 3;
pub const IRQ_SOFTWARE: u32 = 4;
pub const IRQ_MAX: u32 = 63;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Ctrl: u64 {
        const ENABLE  = 1 << 0;
        const NESTING = 1 << 1;
    }
}

const REG_PENDING: u64 = 0x00;
const REG_ENABLED: u64 = 0x08;
const REG_CTRL: u64 = 0x10;
const REG_VECTOR: u64 = 0x18;
const REG_ACK: u64 = 0x20;
const REG_CURRENT: u64 = 0x28;
const REG_SAVED_PC: u64 = 0x30;

/// Interrupt controller. `pending` is the only field mutated from device
/// threads (via [`Intc::raise`] / [`Intc::clear`]), so it is the sole
/// atomic here; everything else is CPU-thread-only.
pub struct Intc {
    pending: Arc<AtomicU64>,
    enabled: u64,
    ctrl: Ctrl,
    vector_base: u64,
    current_irq: i64,
    saved_pc: u64,
}

impl Intc {
    pub fn new() -> Self {
        Intc {
            pending: Arc::new(AtomicU64::new(0)),
            enabled: 0,
            ctrl: Ctrl::empty(),
            vector_base: 0,
            current_irq: -1,
            saved_pc: 0,
        }
    }

    /// A cloneable handle device threads can use to post IRQs without
    /// borrowing the whole controller.
    pub fn pending_handle(&self) -> PendingHandle {
        PendingHandle(self.pending.clone())
    }

    pub fn raise(&self, line: u32) {
        PendingHandle(self.pending.clone()).raise(line);
    }

    pub fn clear(&self, line: u32) {
        PendingHandle(self.pending.clone()).clear(line);
    }

    /// True iff the next `check()` would find something to service.
    pub fn has_pending(&self) -> bool {
        if !self.ctrl.contains(Ctrl::ENABLE) {
            return false;
        }
        if self.current_irq >= 0 && !self.ctrl.contains(Ctrl::NESTING) {
            return false;
        }
        (self.pending.load(Ordering::Acquire) & self.enabled) != 0
    }

    fn find_pending(&self) -> Option<u32> {
        let active = self.pending.load(Ordering::Acquire) & self.enabled;
        if active == 0 {
            return None;
        }
        Some(active.trailing_zeros())
    }

    /// Services the highest-priority (lowest line number) pending
    /// interrupt, redirecting `pc` to its vector-table entry. Returns
    /// `true` if a vector jump happened.
    pub fn check(&mut self, memory: &mut Memory, pc: &mut u64) -> bool {
        if !self.has_pending() {
            return false;
        }
        let Some(line) = self.find_pending() else {
            return false;
        };

        self.saved_pc = *pc;
        self.current_irq = line as i64;
        self.pending
            .fetch_and(!(1u64 << line), Ordering::AcqRel);

        let vector_addr = self.vector_base.wrapping_add(line as u64 * 8);
        let Some(handler_addr) = memory.read(vector_addr, 8) else {
            self.current_irq = -1;
            return false;
        };

        *pc = handler_addr;
        true
    }
}

impl Default for Intc {
    fn default() -> Self {
        Self::new()
    }
}

impl MmioDevice for Intc {
    fn read(&mut self, offset: u64, _size: u8) -> u64 {
        match offset {
            REG_PENDING => self.pending.load(Ordering::Acquire),
            REG_ENABLED => self.enabled,
            REG_CTRL => self.ctrl.bits(),
            REG_VECTOR => self.vector_base,
            REG_CURRENT => self.current_irq as u64,
            REG_SAVED_PC => self.saved_pc,
            _ => 0,
        }
    }

    fn write(&mut self, offset: u64, value: u64, _size: u8) {
        match offset {
            REG_PENDING => {
                self.pending.fetch_and(!value, Ordering::AcqRel);
            }
            REG_ENABLED => self.enabled = value,
            REG_CTRL => self.ctrl = Ctrl::from_bits_truncate(value),
            REG_VECTOR => self.vector_base = value,
            REG_ACK => {
                if value as i64 == self.current_irq {
                    self.current_irq = -1;
                }
            }
            REG_SAVED_PC => {}
            _ => log::trace!("intc: write to unknown offset {offset:#x}"),
        }
    }
}

/// Cheap, `Send`-able handle a device thread holds to post interrupts.
#[derive(Clone)]
pub struct PendingHandle(Arc<AtomicU64>);

impl PendingHandle {
    pub fn raise(&self, line: u32) {
        debug_assert!(line <= IRQ_MAX);
        self.0.fetch_or(1u64 << line, Ordering::AcqRel);
    }

    pub fn clear(&self, line: u32) {
        debug_assert!(line <= IRQ_MAX);
        self.0.fetch_and(!(1u64 << line), Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fairness_picks_lowest_line_s7() {
        let mut intc = Intc::new();
        intc.write(REG_ENABLED, 0xff, 8);
        intc.write(REG_CTRL, Ctrl::ENABLE.bits(), 8);
        intc.raise(3);
        intc.raise(1);
        let mut mem = Memory::new(0x1000);
        let mut pc = 0x100;
        assert!(intc.check(&mut mem, &mut pc));
        assert_eq!(intc.current_irq, 1);
    }

    #[test]
    fn non_nesting_blocks_until_ack() {
        let mut intc = Intc::new();
        intc.write(REG_ENABLED, 0xff, 8);
        intc.write(REG_CTRL, Ctrl::ENABLE.bits(), 8);
        let mut mem = Memory::new(0x1000);
        let mut pc = 0;
        intc.raise(0);
        assert!(intc.check(&mut mem, &mut pc));
        intc.raise(1);
        assert!(!intc.has_pending());
        intc.write(REG_ACK, 0, 8);
        assert!(intc.has_pending());
    }

    #[test]
    fn bad_vector_read_restores_idle() {
        let mut intc = Intc::new();
        intc.write(REG_ENABLED, 0x1, 8);
        intc.write(REG_CTRL, Ctrl::ENABLE.bits(), 8);
        intc.write(REG_VECTOR, u64::MAX - 4, 8);
        intc.raise(0);
        let mut mem = Memory::new(0x10);
        let mut pc = 0;
        assert!(!intc.check(&mut mem, &mut pc));
        assert_eq!(intc.current_irq, -1);
    }
}
