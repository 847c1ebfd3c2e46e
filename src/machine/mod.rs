//! Compucolor II
//!
//! The machine aggregate: an 8080 and the [`Board`] it runs against. Every
//! instruction's cycle count is fed to the board's scheduler, which is the
//! only clock in the system.

use crate::config::Config;
use crate::cpu::I8080;
use crate::debugger::Debuggable;
use crate::floppy::{DiskImage, DiskImageError, Floppy, Stepper};
use crate::io::{AutotypeError, Keyboard};
use crate::memory::{MemoryInterface, DRAM_START};
use crate::video::Renderer;
use serde_json::{json, Value};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

pub mod board;
pub use board::{Board, Devices, Event};

pub mod runner;
pub use runner::Runner;

/// BASIC's power-up flag (CRTRAM + 8). Anything other than 0x97 makes the
/// next reset a cold start.
pub const POWER_UP_FLAG: u16 = DRAM_START + 0x01AF + 8;

/// Ticks charged for a step that faulted, so the clock keeps moving.
const FAULT_SKIP_TICKS: u64 = 4;

/// Drives on the board, CD0 and CD1.
pub const NUM_DRIVES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    NoSuchDrive(usize),
    Image(DiskImageError),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchDrive(unit) => {
                write!(f, "no drive CD{} (the machine has {})", unit, NUM_DRIVES)
            }
            Self::Image(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for MediaError {}

impl From<DiskImageError> for MediaError {
    fn from(e: DiskImageError) -> Self {
        MediaError::Image(e)
    }
}

pub struct Machine {
    pub cpu: I8080,
    pub board: Board,
    cpu_freq: u64,
    slice_ticks: u64,
    fault: Option<String>,
}

impl Machine {
    pub fn new(config: &Config) -> Self {
        let mut board = Board::new(
            config.cpu_freq,
            Stepper::from_phases(config.stepper_phases),
            config.hblank_wait_limit,
        );
        board.devices.autotyper.set_mode(config.autotype);
        Self {
            cpu: I8080::new(),
            board,
            cpu_freq: config.cpu_freq,
            slice_ticks: config.slice_ticks(),
            fault: None,
        }
    }

    pub fn cpu_freq(&self) -> u64 {
        self.cpu_freq
    }

    /// CPU ticks in one host timeslice.
    pub fn slice_ticks(&self) -> u64 {
        self.slice_ticks
    }

    /// Machine tick count.
    pub fn now(&self) -> u64 {
        self.board.scheduler.now()
    }

    pub fn devices(&self) -> &Devices {
        &self.board.devices
    }

    pub fn keyboard(&mut self) -> &mut Keyboard {
        &mut self.board.devices.keyboard
    }

    /// Copy a system ROM image to address 0.
    pub fn load_rom(&mut self, image: &[u8]) {
        if image.len() > 0x6000 {
            log::warn!("ROM image is {} bytes, spilling past the ROM area", image.len());
        }
        self.board.memory.load_rom(image);
        log::info!("loaded {} byte ROM", image.len());
    }

    /// Reset button: CPU and every chip, memory untouched. Stops the
    /// autotyper.
    pub fn warm_reset(&mut self) {
        self.board.devices.autotyper.cancel();
        self.reset_chips();
    }

    /// Warm reset, then clear the power-up flag so BASIC cold starts.
    pub fn hard_reset(&mut self) {
        self.warm_reset();
        self.board.write_byte(POWER_UP_FLAG, 0x00);
    }

    fn reset_chips(&mut self) {
        log::info!("warm reset");
        self.cpu.reset();
        self.board.devices.reset(&mut self.board.scheduler);
    }

    /// Run one instruction and let the clock catch up with it.
    pub fn single_step(&mut self) -> u32 {
        self.cpu.irq(self.board.devices.uart.irq_line());
        let cycles = self.cpu.step(&mut self.board);
        self.board.tick(cycles as u64);
        if self.board.devices.autotyper.take_reset_request() {
            // cold start without stopping the text that asked for it
            self.reset_chips();
            self.board.write_byte(POWER_UP_FLAG, 0x00);
        }
        cycles
    }

    /// Step with host faults contained. A panic inside the step is
    /// reported once, latched, and the clock is nudged forward.
    pub fn guarded_step(&mut self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.single_step();
        }));
        if let Err(payload) = result {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown fault".to_string());
            if self.fault.is_none() {
                log::error!("fault at PC={:04X}: {}", self.cpu.pc, message);
                self.fault = Some(message);
            } else {
                log::debug!("repeat fault at PC={:04X}: {}", self.cpu.pc, message);
            }
            self.board.tick(FAULT_SKIP_TICKS);
        }
    }

    /// First host fault seen, if any.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    /// Run until at least `ticks` have passed. Returns the ticks actually
    /// run, which overshoots by at most one instruction or hblank wait.
    pub fn run_ticks(&mut self, ticks: u64) -> u64 {
        let start = self.now();
        let limit = start + ticks;
        while self.now() < limit {
            self.guarded_step();
        }
        self.now() - start
    }

    /// Run one host timeslice worth of emulated time.
    pub fn run_timeslice(&mut self) -> u64 {
        self.run_ticks(self.slice_ticks)
    }

    // ========== Media ==========

    /// Mount `image` in drive `unit`. On error the drive is left as it was.
    pub fn insert_disk(&mut self, unit: usize, image: DiskImage) -> Result<(), MediaError> {
        let board = &mut self.board;
        let drive = board
            .devices
            .drives
            .get_mut(unit)
            .ok_or(MediaError::NoSuchDrive(unit))?;
        drive.insert(image, &mut board.scheduler)?;
        Ok(())
    }

    /// Parse and insert a disk image. On error the drive is left as it was.
    pub fn insert_disk_text(&mut self, unit: usize, text: &str) -> Result<(), MediaError> {
        if unit >= NUM_DRIVES {
            return Err(MediaError::NoSuchDrive(unit));
        }
        let image = DiskImage::parse(text)?;
        self.insert_disk(unit, image)
    }

    /// Take the disk out of `unit`. `None` for an empty or missing drive.
    pub fn eject_disk(&mut self, unit: usize) -> Option<DiskImage> {
        let board = &mut self.board;
        board.devices.drives.get_mut(unit)?.remove(&mut board.scheduler)
    }

    /// Current contents of the disk in `unit`, in text image form.
    pub fn save_disk(&mut self, unit: usize) -> Option<String> {
        let board = &mut self.board;
        board.devices.drives.get_mut(unit)?.save(&mut board.scheduler)
    }

    pub fn volume_label(&self, unit: usize) -> Option<String> {
        self.board.devices.drives.get(unit).map(Floppy::volume_label)
    }

    // ========== Autotype ==========

    /// Type `text` into BASIC, one line or key per frame.
    pub fn autotype(&mut self, text: &str) -> Result<(), AutotypeError> {
        self.board.devices.autotyper.start(text)
    }

    pub fn is_autotyping(&self) -> bool {
        self.board.devices.autotyper.is_running()
    }

    /// Stop typing and let go of any key it was holding.
    pub fn cancel_autotype(&mut self) {
        self.board.devices.autotyper.cancel();
        self.board.devices.keyboard.clear();
    }

    /// Percent of the queued text sent so far.
    pub fn autotype_progress(&self) -> f64 {
        self.board.devices.autotyper.percent_done()
    }

    // ========== Serial and display ==========

    /// A byte arrived on J-2.
    pub fn serial_receive(&mut self, byte: u8) {
        log::trace!("J-2: receive {:02X}", byte);
        self.board.devices.uart.rx_serial(byte, false);
    }

    /// Bytes sent out of J-2 since the last call.
    pub fn serial_output(&mut self) -> Vec<u8> {
        self.board.devices.serial.take_output()
    }

    /// Redraw whatever changed since the last call.
    pub fn render(&mut self, renderer: &mut dyn Renderer) {
        let devices = &mut self.board.devices;
        devices
            .display
            .render(self.board.memory.video_ram(), &devices.crtc, renderer);
    }
}

impl Debuggable for Machine {
    fn read_state(&self) -> Value {
        let devices = &self.board.devices;
        json!({
            "cpu": self.cpu.read_state(),
            "uart": devices.uart.read_state(),
            "crtc": devices.crtc.read_state(),
            "drives": [devices.drives[0].read_state(), devices.drives[1].read_state()],
            "ticks": self.now(),
        })
    }

    fn write_state(&mut self, state: &Value) {
        let devices = &mut self.board.devices;
        if let Some(v) = state.get("cpu") {
            self.cpu.write_state(v);
        }
        if let Some(v) = state.get("uart") {
            devices.uart.write_state(v);
        }
        if let Some(v) = state.get("crtc") {
            devices.crtc.write_state(v);
            devices.crtc.resume(&mut self.board.scheduler, Event::HBlank);
        }
        if let Some(drives) = state.get("drives").and_then(Value::as_array) {
            for (drive, v) in devices.drives.iter_mut().zip(drives) {
                drive.restore_state(v, &mut self.board.scheduler);
            }
        }
        devices.display.refresh_all();
    }
}

#[cfg(test)]
mod tests_machine;
