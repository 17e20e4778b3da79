use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::mmio::MmioDevice;

const PALETTE_SIZE: usize = 3 * 256;
const PIXELS_SIZE: usize = 256 * 256;
const PALETTE_START: u64 = 0x01;
const PIXELS_START: u64 = PALETTE_START + PALETTE_SIZE as u64;

struct Surface {
    palette: [u8; PALETTE_SIZE],
    pixels: [u8; PIXELS_SIZE],
}

impl Surface {
    fn new() -> Self {
        Surface {
            palette: [0; PALETTE_SIZE],
            pixels: [0; PIXELS_SIZE],
        }
    }
}

/// Optional indexed-colour scanout buffer. Out of scope per the core
/// spec beyond its bus contract: the renderer thread here only
/// maintains a `(palette, pixels)` snapshot under a mutex, matching the
/// UART's threading discipline, with no actual window/GPU backend.
pub struct Framebuffer {
    surface: Arc<Mutex<Surface>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Framebuffer {
    pub fn new() -> Self {
        Framebuffer {
            surface: Arc::new(Mutex::new(Surface::new())),
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    fn start(&mut self) {
        if self.running.load(Ordering::Acquire) {
            return;
        }
        self.running.store(true, Ordering::Release);
        let running = self.running.clone();
        let surface = self.surface.clone();
        self.thread = Some(std::thread::spawn(move || {
            while running.load(Ordering::Acquire) {
                let _ = surface.lock().unwrap();
                std::thread::sleep(Duration::from_millis(16));
            }
        }));
    }

    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl MmioDevice for Framebuffer {
    fn read(&mut self, offset: u64, _size: u8) -> u64 {
        let surface = self.surface.lock().unwrap();
        if offset == 0x00 {
            self.running.load(Ordering::Acquire) as u64
        } else if (PALETTE_START..PIXELS_START).contains(&offset) {
            surface.palette[(offset - PALETTE_START) as usize] as u64
        } else {
            let idx = offset - PIXELS_START;
            surface
                .pixels
                .get(idx as usize)
                .copied()
                .unwrap_or(0) as u64
        }
    }

    fn write(&mut self, offset: u64, value: u64, _size: u8) {
        if offset == 0x00 {
            if value != 0 {
                self.start();
            } else {
                self.stop();
            }
            return;
        }

        let mut surface = self.surface.lock().unwrap();
        if (PALETTE_START..PIXELS_START).contains(&offset) {
            surface.palette[(offset - PALETTE_START) as usize] = value as u8;
        } else {
            let idx = offset - PIXELS_START;
            if let Some(slot) = surface.pixels.get_mut(idx as usize) {
                *slot = value as u8;
            }
        }
    }
}
