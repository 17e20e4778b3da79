use crate::mmio::MmioDevice;

/// Read-only MMIO word reporting the machine's total RAM size.
pub struct MemSizeProbe {
    memory_size: u64,
}

impl MemSizeProbe {
    pub fn new(memory_size: u64) -> Self {
        MemSizeProbe { memory_size }
    }
}

impl MmioDevice for MemSizeProbe {
    fn read(&mut self, _offset: u64, _size: u8) -> u64 {
        self.memory_size
    }

    fn write(&mut self, _offset: u64, _value: u64, _size: u8) {}
}
