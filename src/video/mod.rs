//! SMC 5027 CRT Timing Controller
//!
//! The 5027 generates display timing from a bank of programmable
//! registers. The emulator only models what software can observe: the
//! scroll and cursor registers, and the horizontal blanking signal that
//! the slow video window waits on.
//!
//! ## Registers (ports 0x60-0x6F, write only on this machine)
//!
//! | Reg | Write                         | Read                    |
//! |:----|:------------------------------|:------------------------|
//! | 0-5 | timing parameters             | register                |
//! | 6   | last displayed data row       | register                |
//! | 8   | -                             | cursor row              |
//! | 9   | -                             | cursor column           |
//! | B   | scroll up one row             | 0                       |
//! | C   | load cursor column            | 0                       |
//! | D   | load cursor row (6 bits)      | 0                       |

use crate::debugger::Debuggable;
use crate::scheduler::{Scheduler, TimerHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod constants;
pub use constants::*;

pub mod display;
pub use display::{Display, Glyph, Renderer, TextScreen};

/// Horizontal blanking interval, in tenths of a microsecond.
const HBLANK_TENTHS_US: u64 = 47;
/// Visible part of a scan line, in tenths of a microsecond.
const HACTIVE_TENTHS_US: u64 = 635 - HBLANK_TENTHS_US;

#[derive(Debug, Serialize, Deserialize)]
pub struct Smc5027 {
    pub registers: [u8; NUM_REGISTERS],
    hblank: bool,
    blank_ticks: u64,
    active_ticks: u64,
    #[serde(skip)]
    timer: Option<TimerHandle>,
}

impl Smc5027 {
    pub fn new(cpu_freq: u64) -> Self {
        Self {
            registers: [0; NUM_REGISTERS],
            hblank: false,
            blank_ticks: cpu_freq * HBLANK_TENTHS_US / 10_000_000,
            active_ticks: cpu_freq * HACTIVE_TENTHS_US / 10_000_000,
            timer: None,
        }
    }

    /// Clears the registers. Blanking keeps running.
    pub fn reset(&mut self) {
        self.registers.fill(0);
    }

    /// Start the blanking chain at the beginning of a visible line.
    /// `event` is delivered back to [`Smc5027::on_hblank`].
    pub fn start<E: Copy>(&mut self, sched: &mut Scheduler<E>, event: E) {
        self.hblank = false;
        self.resume(sched, event);
    }

    /// Rebuild the edge chain from the current blanking state, as after a
    /// restore: the next edge comes a full blank or active period later.
    pub fn resume<E: Copy>(&mut self, sched: &mut Scheduler<E>, event: E) {
        if let Some(old) = self.timer.take() {
            sched.cancel(old);
        }
        self.timer = Some(sched.one_shot(self.edge_ticks(), event, "hBlank"));
    }

    /// Blanking edge: flip the state and arm the next edge.
    pub fn on_hblank<E: Copy>(&mut self, sched: &mut Scheduler<E>, event: E) {
        self.hblank = !self.hblank;
        self.timer = Some(sched.one_shot(self.edge_ticks(), event, "hBlank"));
    }

    fn edge_ticks(&self) -> u64 {
        if self.hblank {
            self.blank_ticks
        } else {
            self.active_ticks
        }
    }

    pub fn in_hblank(&self) -> bool {
        self.hblank
    }

    /// Length of one scan line in ticks.
    pub fn line_ticks(&self) -> u64 {
        self.blank_ticks + self.active_ticks
    }

    pub fn read(&self, reg: u8) -> u8 {
        match reg & 0xF {
            r @ (0x0..=0x6 | 0x8 | 0x9) => self.registers[r as usize],
            _ => 0x00,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        match reg & 0xF {
            CMD_SCROLL => {
                let last = self.registers[REG_LAST_DISPLAY_ROW] as usize;
                self.registers[REG_LAST_DISPLAY_ROW] = ((last + 1) % ROWS) as u8;
            }
            CMD_LOAD_CURSOR_X => self.registers[REG_CURSOR_X] = value,
            CMD_LOAD_CURSOR_Y => self.registers[REG_CURSOR_Y] = value & 0x3F,
            r => self.registers[r as usize] = value,
        }
    }

    pub fn cursor_x(&self) -> u8 {
        self.registers[REG_CURSOR_X]
    }

    pub fn cursor_y(&self) -> u8 {
        self.registers[REG_CURSOR_Y]
    }

    /// Video RAM row shown at the top of the screen (hardware scroll).
    pub fn first_display_row(&self) -> usize {
        (self.registers[REG_LAST_DISPLAY_ROW] as usize + 1) % ROWS
    }
}

impl Debuggable for Smc5027 {
    fn read_state(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn write_state(&mut self, state: &Value) {
        match serde_json::from_value::<Smc5027>(state.clone()) {
            Ok(chip) => {
                self.registers = chip.registers;
                self.hblank = chip.hblank;
            }
            Err(e) => log::warn!("5027: ignoring bad state: {}", e),
        }
    }
}

#[cfg(test)]
mod tests_video;
