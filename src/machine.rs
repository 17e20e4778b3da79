use std::cell::RefCell;
use std::rc::Rc;

use crate::cpu::{self, Cpu};
use crate::error::{MachineError, Result};
use crate::framebuffer::Framebuffer;
use crate::intc::{Intc, PendingHandle, IRQ_TIMER, IRQ_UART};
use crate::memory::Memory;
use crate::memsize::MemSizeProbe;
use crate::mmio::Shared;
use crate::platform::{PlatformPower, PowerHandle};
use crate::rtc::Rtc;
use crate::timer::Timer;
use crate::uart::Uart;

const BASE_INTC: u64 = 0x1FE0_0000;
const SIZE_INTC: u64 = 0x40;
const BASE_TIMER: u64 = 0x1FE0_0100;
const SIZE_TIMER: u64 = 0x28;
const BASE_RTC: u64 = 0x1FE0_0200;
const SIZE_RTC: u64 = 0x28;
const BASE_UART: u64 = 0x1FE0_0300;
const SIZE_UART: u64 = 0x10;
const BASE_MEMSIZE: u64 = 0x1FE0_0400;
const SIZE_MEMSIZE: u64 = 0x08;
const BASE_PLATFORM: u64 = 0x1FE0_0500;
const SIZE_PLATFORM: u64 = 0x01;
const BASE_FRAMEBUFFER: u64 = 0x1FE0_0700;
const SIZE_FRAMEBUFFER: u64 = 0x301 + 65536;

const TIMER_VIRTUAL_FREQ: u64 = 10_000_000;

/// Owns the CPU plus every device it can see through MMIO, and drives
/// the execution loop until the guest requests a poweroff.
///
/// The INTC, timer and UART are each wrapped in `Rc<RefCell<_>>`: the
/// bus holds one handle (via [`Shared`]) to satisfy guest loads/stores,
/// and `Machine` keeps a second to call their non-MMIO methods
/// (`check`, `tick`, `start`/`stop`) directly from the run loop.
pub struct Machine {
    cpu: Cpu,
    memory: Memory,
    intc: Rc<RefCell<Intc>>,
    timer: Rc<RefCell<Timer>>,
    uart: Rc<RefCell<Uart>>,
    software_irq: PendingHandle,
    power: PowerHandle,
}

impl Machine {
    pub fn new(memory_size: u64, image: &[u8], framebuffer: bool) -> Result<Self> {
        if image.len() as u64 > memory_size {
            return Err(MachineError::ImageTooLarge {
                image_len: image.len() as u64,
                memory_size,
            });
        }

        let mut memory = Memory::new(memory_size);
        memory.load_image(image);

        let intc = Intc::new();
        let software_irq = intc.pending_handle();
        let intc = Rc::new(RefCell::new(intc));

        let timer = Timer::new(TIMER_VIRTUAL_FREQ, IRQ_TIMER, intc.borrow().pending_handle());
        let timer = Rc::new(RefCell::new(timer));

        let uart = Uart::new(IRQ_UART, intc.borrow().pending_handle());
        let uart = Rc::new(RefCell::new(uart));

        let rtc = Rtc::new();
        let memsize = MemSizeProbe::new(memory_size);
        let platform = PlatformPower::new();
        let power = platform.handle();

        memory
            .mmio
            .register(BASE_INTC, SIZE_INTC, "intc", Box::new(Shared(intc.clone())))?;
        memory
            .mmio
            .register(BASE_TIMER, SIZE_TIMER, "timer", Box::new(Shared(timer.clone())))?;
        memory
            .mmio
            .register(BASE_RTC, SIZE_RTC, "rtc", Box::new(rtc))?;
        memory
            .mmio
            .register(BASE_UART, SIZE_UART, "uart", Box::new(Shared(uart.clone())))?;
        memory
            .mmio
            .register(BASE_MEMSIZE, SIZE_MEMSIZE, "memsize", Box::new(memsize))?;
        memory
            .mmio
            .register(BASE_PLATFORM, SIZE_PLATFORM, "platform", Box::new(platform))?;

        if framebuffer {
            memory.mmio.register(
                BASE_FRAMEBUFFER,
                SIZE_FRAMEBUFFER,
                "framebuffer",
                Box::new(Framebuffer::new()),
            )?;
        }

        if memory_size < 8 {
            return Err(MachineError::MemoryTooSmall(memory_size));
        }
        let mut cpu = Cpu::new();
        let boot_pc = memory.read(0, 8).expect("memory_size >= 8 checked above");
        cpu.set_pc(boot_pc);
        cpu.set_sp(memory_size - 8);

        uart.borrow_mut().start();

        Ok(Machine {
            cpu,
            memory,
            intc,
            timer,
            uart,
            software_irq,
            power,
        })
    }

    /// Runs until the guest writes 0 to the platform-power register.
    pub fn run(&mut self) {
        while self.power.is_on() {
            cpu::execute::step(
                &mut self.cpu,
                &mut self.memory,
                &self.intc,
                &self.timer,
                &self.software_irq,
            );
        }
        self.uart.borrow_mut().stop();
    }
}
