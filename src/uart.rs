use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::intc::PendingHandle;
use crate::mmio::MmioDevice;

const BUF_SIZE: usize = 64;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Status: u8 {
        const RX_READY = 1 << 0;
        const TX_EMPTY = 1 << 1;
        const RX_FULL  = 1 << 2;
        const OVERFLOW = 1 << 3;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Control: u8 {
        const RX_IRQ_EN = 1 << 0;
        const TX_IRQ_EN = 1 << 1;
        const RESET     = 1 << 2;
    }
}

const REG_DATA: u64 = 0x00;
const REG_STATUS: u64 = 0x04;
const REG_CONTROL: u64 = 0x08;

struct Ring {
    buf: [u8; BUF_SIZE],
    head: usize,
    tail: usize,
    status: Status,
    control: Control,
}

impl Ring {
    fn new() -> Self {
        Ring {
            buf: [0; BUF_SIZE],
            head: 0,
            tail: 0,
            status: Status::TX_EMPTY,
            control: Control::empty(),
        }
    }
}

/// Ring-buffer RX from a raw-mode host stdin thread, synchronous TX to
/// stdout, level-triggered IRQ. Shared state lives behind a mutex that
/// both the guest-facing MMIO calls and the reader thread take.
pub struct Uart {
    ring: Arc<Mutex<Ring>>,
    irq_line: u32,
    irq: PendingHandle,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    orig_termios: Option<libc::termios>,
}

impl Uart {
    pub fn new(irq_line: u32, irq: PendingHandle) -> Self {
        Uart {
            ring: Arc::new(Mutex::new(Ring::new())),
            irq_line,
            irq,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
            orig_termios: None,
        }
    }

    /// Puts stdin in raw mode and spawns the reader thread. A no-op if
    /// already running.
    pub fn start(&mut self) {
        if self.running.load(Ordering::Acquire) {
            return;
        }

        self.orig_termios = set_raw_mode();
        self.running.store(true, Ordering::Release);

        let ring = self.ring.clone();
        let running = self.running.clone();
        let irq = self.irq.clone();
        let irq_line = self.irq_line;

        self.thread = Some(std::thread::spawn(move || {
            let mut stdin = std::io::stdin();
            let mut byte = [0u8; 1];
            while running.load(Ordering::Acquire) {
                match stdin.read(&mut byte) {
                    Ok(0) | Err(_) => continue,
                    Ok(_) => {}
                }
                let ch = byte[0];
                if ch == 0x03 {
                    running.store(false, Ordering::Release);
                    break;
                }

                let mut ring = ring.lock().unwrap();
                let next = (ring.tail + 1) % BUF_SIZE;
                if next == ring.head {
                    ring.status.insert(Status::OVERFLOW);
                } else {
                    ring.buf[ring.tail] = ch;
                    ring.tail = next;
                    ring.status.insert(Status::RX_READY);
                    let fill = (ring.tail + BUF_SIZE - ring.head) % BUF_SIZE;
                    if fill > BUF_SIZE - 4 {
                        ring.status.insert(Status::RX_FULL);
                    }
                    update_irq(&ring, &irq, irq_line);
                }
            }
        }));
    }

    /// Joins the reader thread and restores the host terminal mode.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        if let Some(orig) = self.orig_termios.take() {
            restore_mode(orig);
        }
    }
}

impl Drop for Uart {
    fn drop(&mut self) {
        self.stop();
    }
}

fn update_irq(ring: &Ring, irq: &PendingHandle, irq_line: u32) {
    let level = (ring.control.contains(Control::RX_IRQ_EN) && ring.status.contains(Status::RX_READY))
        || (ring.control.contains(Control::TX_IRQ_EN) && ring.status.contains(Status::TX_EMPTY));
    if level {
        irq.raise(irq_line);
    } else {
        irq.clear(irq_line);
    }
}

impl MmioDevice for Uart {
    fn read(&mut self, offset: u64, _size: u8) -> u64 {
        let mut ring = self.ring.lock().unwrap();
        let result = match offset {
            REG_DATA => {
                if ring.head != ring.tail {
                    let byte = ring.buf[ring.head];
                    ring.head = (ring.head + 1) % BUF_SIZE;
                    if ring.head == ring.tail {
                        ring.status.remove(Status::RX_READY);
                    }
                    ring.status.remove(Status::RX_FULL);
                    update_irq(&ring, &self.irq, self.irq_line);
                    byte as u64
                } else {
                    0
                }
            }
            REG_STATUS => ring.status.bits() as u64,
            REG_CONTROL => ring.control.bits() as u64,
            _ => 0,
        };
        result
    }

    fn write(&mut self, offset: u64, value: u64, _size: u8) {
        let mut ring = self.ring.lock().unwrap();
        match offset {
            REG_DATA => {
                print!("{}", value as u8 as char);
                use std::io::Write;
                let _ = std::io::stdout().flush();
                ring.status.insert(Status::TX_EMPTY);
                update_irq(&ring, &self.irq, self.irq_line);
            }
            REG_CONTROL => {
                ring.control = Control::from_bits_truncate(value as u8);
                if ring.control.contains(Control::RESET) {
                    ring.head = 0;
                    ring.tail = 0;
                    ring.status = Status::TX_EMPTY;
                    ring.control.remove(Control::RESET);
                }
                update_irq(&ring, &self.irq, self.irq_line);
            }
            _ => log::trace!("uart: write to unknown offset {offset:#x}"),
        }
    }
}

fn set_raw_mode() -> Option<libc::termios> {
    unsafe {
        let mut orig: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(libc::STDIN_FILENO, &mut orig) != 0 {
            return None;
        }
        let mut raw = orig;
        raw.c_lflag &= !(libc::ICANON | libc::ECHO);
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;
        libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &raw);
        Some(orig)
    }
}

fn restore_mode(orig: libc::termios) {
    unsafe {
        libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &orig);
    }
}
