//! Keyboard and Serial Port
//!
//! The keyboard is a passive switch matrix scanned by software through the
//! 5501 parallel port. With the keyboard selected (output bits 4-5 = 00),
//! the output port picks a row and the parallel input reads it back.
//!
//! ## Row select (5501 output port)
//!
//! | Bits   | Meaning                                   |
//! |:-------|:------------------------------------------|
//! | 3-0    | matrix row 0-15                           |
//! | 7      | modifier row (overrides bits 3-0)         |
//!
//! ## Modifier row (active low)
//!
//! | Bit    | Key                                       |
//! |:-------|:------------------------------------------|
//! | 7      | CAPS LOCK                                 |
//! | 6      | REPEAT                                    |
//! | 5      | SHIFT                                     |
//! | 4      | CONTROL                                   |
//! | 3-0    | unused, read high                         |

pub mod autotyper;
pub mod keymap;
pub mod serial;
pub use autotyper::{AutotypeError, Autotyper, TypingMode};
pub use keymap::{encode_ascii, Key, KeyStroke};
pub use serial::SerialPort;

pub const KEYBOARD_ROWS: usize = 17;
pub const MODIFIER_ROW: usize = 16;

pub mod modifier {
    pub const CAPS_LOCK: u8 = 0x80;
    pub const REPEAT: u8 = 0x40;
    pub const SHIFT: u8 = 0x20;
    pub const CONTROL: u8 = 0x10;
}

/// Keyboard switch matrix. A pressed key pulls its bit low.
#[derive(Debug, Clone)]
pub struct Keyboard {
    matrix: [u8; KEYBOARD_ROWS],
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyboard {
    pub fn new() -> Self {
        Self {
            matrix: [0xFF; KEYBOARD_ROWS],
        }
    }

    pub fn reset(&mut self) {
        self.clear();
    }

    /// Release every key, modifiers included.
    pub fn clear(&mut self) {
        self.matrix = [0xFF; KEYBOARD_ROWS];
    }

    pub fn press(&mut self, row: usize, bit: u8) {
        if let Some(r) = self.matrix.get_mut(row) {
            *r &= !(1 << (bit & 7));
        }
    }

    pub fn release(&mut self, row: usize, bit: u8) {
        if let Some(r) = self.matrix.get_mut(row) {
            *r |= 1 << (bit & 7);
        }
    }

    /// Hold or release modifier keys given as a [`modifier`] mask.
    pub fn set_modifiers(&mut self, mask: u8, down: bool) {
        let row = &mut self.matrix[MODIFIER_ROW];
        if down {
            *row &= !mask;
        } else {
            *row |= mask;
        }
    }

    /// Row as seen on the parallel input. Rows past the matrix read as
    /// nothing pressed.
    pub fn row(&self, row: usize) -> u8 {
        self.matrix.get(row).copied().unwrap_or(0xFF)
    }

    pub fn any_pressed(&self) -> bool {
        self.matrix.iter().any(|&r| r != 0xFF)
    }

    /// Release everything except REPEAT, then hold `stroke`. CAPS LOCK is
    /// left up; the stroke's SHIFT already accounts for it.
    pub fn strike(&mut self, stroke: KeyStroke) -> bool {
        let Some((row, bit)) = stroke.key.position() else {
            log::warn!("keyboard: {:?} has no key", stroke.key);
            return false;
        };
        let repeat = self.matrix[MODIFIER_ROW] & modifier::REPEAT == 0;
        self.clear();
        self.press(row, bit);
        self.set_modifiers(modifier::REPEAT, repeat);
        self.set_modifiers(modifier::SHIFT, stroke.shift);
        self.set_modifiers(modifier::CONTROL, stroke.control);
        true
    }

    /// Hold the keys that produce character `code`.
    pub fn type_ascii(&mut self, code: u8) -> bool {
        match encode_ascii(code) {
            Some(stroke) => self.strike(stroke),
            None => {
                log::warn!("keyboard: no key produces code {:02X}", code);
                false
            }
        }
    }

    /// Hold `key` under whatever SHIFT and CONTROL are already down.
    pub fn force_key(&mut self, key: Key) -> bool {
        let held = !self.matrix[MODIFIER_ROW];
        self.strike(KeyStroke {
            key,
            shift: held & modifier::SHIFT != 0,
            control: held & modifier::CONTROL != 0,
        })
    }
}
