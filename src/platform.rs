use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::mmio::MmioDevice;

const REG_PWR: u64 = 0x00;

/// One byte of state: writing 0 requests machine teardown. The actual
/// teardown (stop UART/framebuffer threads, exit) is driven by the
/// execution loop polling [`PlatformPower::is_on`], since an `MmioDevice`
/// has no access back to the owning `Machine`.
pub struct PlatformPower {
    on: Arc<AtomicBool>,
}

impl PlatformPower {
    pub fn new() -> Self {
        PlatformPower {
            on: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn handle(&self) -> PowerHandle {
        PowerHandle(self.on.clone())
    }
}

impl Default for PlatformPower {
    fn default() -> Self {
        Self::new()
    }
}

impl MmioDevice for PlatformPower {
    fn read(&mut self, offset: u64, _size: u8) -> u64 {
        match offset {
            REG_PWR => self.on.load(Ordering::Acquire) as u64,
            _ => 0,
        }
    }

    fn write(&mut self, offset: u64, value: u64, _size: u8) {
        if offset == REG_PWR {
            self.on.store(value != 0, Ordering::Release);
        }
    }
}

#[derive(Clone)]
pub struct PowerHandle(Arc<AtomicBool>);

impl PowerHandle {
    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
