use thiserror::Error;

/// Host-level failures: things that abort startup before a single guest
/// instruction runs. Never seen by the guest — contrast with
/// [`crate::cpu::Exception`], which is in-guest state routed through the
/// software IRQ.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("boot image is {image_len} bytes, larger than memory ({memory_size} bytes)")]
    ImageTooLarge { image_len: u64, memory_size: u64 },

    #[error("mmio region '{name}' at {base:#x}..{:#x} overlaps an existing region", base + size)]
    MmioOverlap {
        name: &'static str,
        base: u64,
        size: u64,
    },

    #[error("mmio region table is full (max {} regions)", crate::mmio::MAX_MMIO_REGIONS)]
    RegionTableFull,

    #[error("memory size {0} bytes is too small to hold an entry address")]
    MemoryTooSmall(u64),
}

pub type Result<T> = std::result::Result<T, MachineError>;
