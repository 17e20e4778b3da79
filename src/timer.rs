use std::time::Instant;

use crate::intc::PendingHandle;
use crate::mmio::MmioDevice;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default)]
    pub struct TimerCtrl: u64 {
        const ENABLE   = 1 << 0;
        const IRQ_EN   = 1 << 1;
        const PERIODIC = 1 << 2;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default)]
    pub struct TimerStatus: u64 {
        const IRQ = 1 << 0;
    }
}

const REG_CTRL: u64 = 0x00;
const REG_COUNT: u64 = 0x08;
const REG_COMPARE: u64 = 0x10;
const REG_STATUS: u64 = 0x18;
const REG_FREQ: u64 = 0x20;

/// Scales host monotonic time into a virtual tick count, firing a
/// compare-match IRQ. Host cycles are modelled as nanoseconds since
/// construction, sidestepping the original C source's per-architecture
/// TSC/counter detection (rdtsc/cntvct/rdtime) — `Instant` already gives
/// a monotonic counter on every host this crate targets, so `host_freq`
/// is fixed at 1e9 (nanoseconds per second) rather than probed.
pub struct Timer {
    ctrl: TimerCtrl,
    count: u64,
    compare: u64,
    status: TimerStatus,
    virtual_freq: u64,
    host_freq: u64,
    start: Instant,
    last_host_cycles: u64,
    remainder: u128,
    irq_line: u32,
    irq: PendingHandle,
}

impl Timer {
    pub fn new(virtual_freq: u64, irq_line: u32, irq: PendingHandle) -> Self {
        Timer {
            ctrl: TimerCtrl::empty(),
            count: 0,
            compare: u64::MAX,
            status: TimerStatus::empty(),
            virtual_freq,
            host_freq: 1_000_000_000,
            start: Instant::now(),
            last_host_cycles: 0,
            remainder: 0,
            irq_line,
            irq,
        }
    }

    fn host_cycles_now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    /// Advances the timer using the current host cycle count. Called
    /// once per execution-loop iteration regardless of `ctrl`.
    pub fn tick(&mut self) {
        let now = self.host_cycles_now();

        if !self.ctrl.contains(TimerCtrl::ENABLE) {
            self.last_host_cycles = now;
            return;
        }

        let elapsed = now.wrapping_sub(self.last_host_cycles);
        self.last_host_cycles = now;
        if elapsed == 0 {
            return;
        }

        let total = elapsed as u128 * self.virtual_freq as u128 + self.remainder;
        let virtual_ticks = (total / self.host_freq as u128) as u64;
        self.remainder = total % self.host_freq as u128;

        if virtual_ticks == 0 {
            return;
        }

        let old = self.count;
        self.count = self.count.wrapping_add(virtual_ticks);

        if old < self.compare && self.count >= self.compare {
            self.status.insert(TimerStatus::IRQ);
            if self.ctrl.contains(TimerCtrl::PERIODIC) {
                self.count -= self.compare;
            } else {
                self.ctrl.remove(TimerCtrl::ENABLE);
            }
            if self.ctrl.contains(TimerCtrl::IRQ_EN) {
                self.irq.raise(self.irq_line);
            }
        }
    }
}

impl MmioDevice for Timer {
    fn read(&mut self, offset: u64, _size: u8) -> u64 {
        match offset {
            REG_CTRL => self.ctrl.bits(),
            REG_COUNT => self.count,
            REG_COMPARE => self.compare,
            REG_STATUS => self.status.bits(),
            REG_FREQ => self.virtual_freq,
            _ => 0,
        }
    }

    fn write(&mut self, offset: u64, value: u64, _size: u8) {
        match offset {
            REG_CTRL => {
                self.ctrl = TimerCtrl::from_bits_truncate(value);
                if self.ctrl.contains(TimerCtrl::ENABLE) {
                    self.last_host_cycles = self.host_cycles_now();
                }
            }
            REG_COUNT => self.count = value,
            REG_COMPARE => self.compare = value,
            REG_STATUS => self.status.remove(TimerStatus::from_bits_truncate(value)),
            REG_FREQ => {} // read-only
            _ => log::trace!("timer: write to unknown offset {offset:#x}"),
        }
    }
}
