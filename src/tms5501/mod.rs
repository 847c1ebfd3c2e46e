//! TMS 5501 multifunction I/O controller
//!
//! Five interval timers, an interrupt controller that hands RST vectors to
//! the 8080, a double-buffered serial port and an 8-bit parallel port. On
//! the Compucolor II the serial port carries floppy data (or the J-2
//! connector) and the parallel output selects which of those is attached.
//!
//! ## Registers (ports 0x00-0x0F, mirrored at 0x10-0x1F)
//!
//! | Reg | Read                       | Write                        |
//! |:----|:---------------------------|:-----------------------------|
//! | 0x0 | receive data               |                              |
//! | 0x1 | parallel input             |                              |
//! | 0x2 | interrupt address (ack)    |                              |
//! | 0x3 | status                     |                              |
//! | 0x4 |                            | discrete command             |
//! | 0x5 | baud rate                  | baud rate                    |
//! | 0x6 |                            | transmit data                |
//! | 0x7 |                            | parallel output              |
//! | 0x8 | interrupt mask             | interrupt mask               |
//! | 0x9-0xD | timer 1-5 period       | timer 1-5 period             |
//!
//! ## Interrupt sources (bit 0 has the highest priority)
//!
//! | Bit | Source                 | Vector  |
//! |:----|:-----------------------|:--------|
//! | 0   | timer 1                | RST 0   |
//! | 1   | timer 2                | RST 1   |
//! | 2   | external sensor        | RST 2   |
//! | 3   | timer 3                | RST 3   |
//! | 4   | receive buffer loaded  | RST 4   |
//! | 5   | transmit buffer empty  | RST 5   |
//! | 6   | timer 4                | RST 6   |
//! | 7   | timer 5                | RST 7   |

use crate::debugger::Debuggable;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serial status register bits
pub mod status {
    pub const FRAMING_ERROR: u8 = 0x01;
    pub const OVERRUN: u8 = 0x02;
    pub const SERIAL_RCVD: u8 = 0x04;
    pub const RX_FULL: u8 = 0x08;
    pub const TX_EMPTY: u8 = 0x10;
    pub const INT_PENDING: u8 = 0x20;
    pub const FULL_BIT: u8 = 0x40;
    pub const START_BIT: u8 = 0x80;
}

/// Interrupt source bits, shared by the mask and pending registers
pub mod irq {
    pub const TIMER1: u8 = 0x01;
    pub const TIMER2: u8 = 0x02;
    pub const SENSOR: u8 = 0x04;
    pub const TIMER3: u8 = 0x08;
    pub const RX: u8 = 0x10;
    pub const TX: u8 = 0x20;
    pub const TIMER4: u8 = 0x40;
    pub const TIMER5: u8 = 0x80;

    /// Pending bit raised by each of the five timers
    pub const TIMERS: [u8; 5] = [TIMER1, TIMER2, TIMER3, TIMER4, TIMER5];
}

/// J-2 baud rates for rate register bits 0-6
const BAUD_RATES: [u32; 7] = [110, 150, 300, 1200, 2400, 4800, 9600];

/// Device attached to the serial and parallel ports, from output bits 4-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peripheral {
    /// Keyboard on the parallel port, J-2 on the serial port
    Keyboard,
    Floppy0,
    Floppy1,
    Unconnected,
}

impl Peripheral {
    fn from_outport(value: u8) -> Self {
        match (value >> 4) & 3 {
            0 => Peripheral::Keyboard,
            1 => Peripheral::Floppy0,
            2 => Peripheral::Floppy1,
            _ => Peripheral::Unconnected,
        }
    }

    /// Drive unit index, if this is a floppy.
    pub fn drive(self) -> Option<usize> {
        match self {
            Peripheral::Floppy0 => Some(0),
            Peripheral::Floppy1 => Some(1),
            _ => None,
        }
    }
}

/// Side effect of a register write that the board must carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartAction {
    /// Byte moved into the shift register; hand it to the selected device.
    Transmit(u8),
    /// Parallel output changed.
    Outport(u8),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tms5501 {
    rx_data: u8,
    /// Transmit buffer register
    tx_data: u8,
    /// Byte in the transmit shift register
    tx_shift: u8,
    /// Bytes in the two-stage transmit path (0-2)
    tx_count: u8,
    outport: u8,
    status: u8,
    rate: u8,
    mask: u8,
    /// Pending interrupt sources; not visible to the CPU directly
    pending: u8,
    command: u8,
    period: [u8; 5],
    count: [u8; 5],
}

impl Default for Tms5501 {
    fn default() -> Self {
        Self::new()
    }
}

impl Tms5501 {
    pub fn new() -> Self {
        let mut chip = Self {
            rx_data: 0,
            tx_data: 0,
            tx_shift: 0,
            tx_count: 0,
            outport: 0,
            status: 0,
            rate: 0,
            mask: 0,
            pending: 0,
            command: 0,
            period: [0; 5],
            count: [0; 5],
        };
        chip.reset();
        chip
    }

    /// Power-on reset. The parallel output goes to zero; the caller must
    /// propagate that to the drives.
    pub fn reset(&mut self) {
        self.rx_data = 0;
        self.status = status::TX_EMPTY;
        self.tx_count = 0;
        self.rate = 0;
        self.mask = 0;
        self.pending = irq::TX;
        self.command = 0;
        self.period = [0; 5];
        self.count = [0; 5];
        self.outport = 0;
    }

    // ========== Parallel port ==========

    pub fn outport(&self) -> u8 {
        self.outport
    }

    pub fn selected(&self) -> Peripheral {
        Peripheral::from_outport(self.outport)
    }

    /// Floppy write gate, output bit 3.
    pub fn write_enable(&self) -> bool {
        self.outport & 0x08 != 0
    }

    /// Stepper winding code, output bits 0-2.
    pub fn stepper(&self) -> u8 {
        self.outport & 0x07
    }

    /// Keyboard row addressed by the parallel output. Bit 7 selects the
    /// modifier row.
    pub fn keyboard_row(&self) -> usize {
        if self.outport & 0x80 != 0 {
            16
        } else {
            (self.outport & 0x0F) as usize
        }
    }

    // ========== Serial port ==========

    /// J-2 baud rate: the highest selected rate bit, 9600 when none is set.
    pub fn baud_rate(&self) -> u32 {
        (0..7)
            .rev()
            .find(|&bit| self.rate & (1 << bit) != 0)
            .map(|bit| BAUD_RATES[bit])
            .unwrap_or(9600)
    }

    /// Bits per transmitted character: start, 8 data, 1 or 2 stop.
    pub fn frame_bits(&self) -> u32 {
        if self.rate & 0x80 != 0 {
            11
        } else {
            10
        }
    }

    /// A peripheral delivered a byte.
    pub fn rx_serial(&mut self, byte: u8, framing_error: bool) {
        let overrun = self.status & status::RX_FULL != 0;
        if overrun {
            log::trace!("5501: receive overrun, {:02X} replaces {:02X}", byte, self.rx_data);
        }
        self.rx_data = byte;
        let mut bits = status::RX_FULL;
        if framing_error {
            bits |= status::FRAMING_ERROR;
        }
        if overrun {
            bits |= status::OVERRUN;
        }
        // start and full-bit detect clear once the character is in
        self.status = (self.status & 0x3E) | bits;
        self.pending |= irq::RX;
    }

    /// The selected peripheral finished shifting out the last byte. Returns
    /// the next byte to send when one was waiting in the buffer.
    pub fn tx_serial_ready(&mut self) -> Option<u8> {
        if self.tx_count == 0 {
            debug_assert!(false, "transmit complete with nothing in flight");
            log::error!("5501: transmit complete with nothing in flight");
            return None;
        }
        self.tx_count -= 1;
        self.status |= status::TX_EMPTY;
        self.pending |= irq::TX;
        if self.tx_count == 1 {
            self.tx_shift = self.tx_data;
            Some(self.tx_shift)
        } else {
            None
        }
    }

    /// Bytes waiting in the transmit path.
    pub fn tx_pending(&self) -> u8 {
        self.tx_count
    }

    // ========== Timers and interrupts ==========

    /// Rising edge on the SN pin (vsync-derived on this machine).
    pub fn trigger_external_sensor(&mut self) {
        self.pending |= irq::SENSOR;
    }

    /// Called every 64 microseconds.
    pub fn tick_64us(&mut self) {
        for i in 0..5 {
            if self.count[i] > 0 {
                self.count[i] -= 1;
                if self.count[i] == 0 {
                    self.count[i] = self.period[i];
                    self.pending |= irq::TIMERS[i];
                }
            }
        }
    }

    /// Level of the INT output.
    pub fn irq_line(&self) -> bool {
        self.pending & self.mask != 0
    }

    /// RST opcode for the highest-priority enabled and pending source.
    pub fn interrupt_vector(&self) -> Option<u8> {
        let masked = self.pending & self.mask;
        if masked == 0 {
            None
        } else {
            Some(0xC7 | (masked.trailing_zeros() as u8) << 3)
        }
    }

    /// Interrupt acknowledge: return the vector and retire its source.
    /// Transmit-empty stays asserted while the transmit path is empty.
    pub fn acknowledge(&mut self) -> Option<u8> {
        let vector = self.interrupt_vector()?;
        let bit = 1u8 << ((vector >> 3) & 7);
        if !(bit == irq::TX && self.tx_count == 0) {
            self.pending &= !bit;
        }
        Some(vector)
    }

    // ========== Register access ==========

    /// Read register `reg`. `parallel_in` is the value currently presented
    /// on the parallel input by the selected peripheral.
    pub fn read(&mut self, reg: u8, parallel_in: u8) -> u8 {
        match reg & 0x0F {
            0x0 => {
                self.status &= !status::RX_FULL;
                self.pending &= !irq::RX;
                self.rx_data
            }
            0x1 => parallel_in,
            0x2 => self.acknowledge().unwrap_or(0x00),
            0x3 => {
                let mut value = self.status & !status::INT_PENDING;
                if self.irq_line() {
                    value |= status::INT_PENDING;
                }
                self.status &= !status::OVERRUN;
                value
            }
            0x5 => self.rate,
            0x8 => self.mask,
            r @ 0x9..=0xD => self.period[(r - 0x9) as usize],
            _ => 0x00,
        }
    }

    /// Write register `reg`.
    pub fn write(&mut self, reg: u8, value: u8) -> Option<UartAction> {
        match reg & 0x0F {
            0x4 => {
                self.command = value;
                if value & 0x01 != 0 {
                    self.status &= 0x35;
                    self.pending = irq::TX;
                }
                if value & 0x02 != 0 {
                    log::debug!("5501: transmit break requested");
                }
                None
            }
            0x5 => {
                self.rate = value;
                None
            }
            0x6 => self.write_tx(value),
            0x7 => {
                self.outport = value;
                Some(UartAction::Outport(value))
            }
            0x8 => {
                self.mask = value;
                None
            }
            r @ 0x9..=0xD => {
                let i = (r - 0x9) as usize;
                self.period[i] = value;
                self.count[i] = value;
                if value == 0 {
                    self.pending |= irq::TIMERS[i];
                }
                None
            }
            _ => None,
        }
    }

    fn write_tx(&mut self, value: u8) -> Option<UartAction> {
        self.tx_data = value;
        self.tx_count += 1;
        if self.tx_count == 3 {
            log::warn!("5501: transmit buffer overwritten with {:02X}", value);
            self.tx_count = 2;
        }
        match self.tx_count {
            1 => {
                self.tx_shift = self.tx_data;
                Some(UartAction::Transmit(self.tx_shift))
            }
            _ => {
                self.status &= !status::TX_EMPTY;
                self.pending &= !irq::TX;
                None
            }
        }
    }
}

impl Debuggable for Tms5501 {
    fn read_state(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn write_state(&mut self, state: &Value) {
        match serde_json::from_value(state.clone()) {
            Ok(chip) => *self = chip,
            Err(e) => log::warn!("5501: ignoring bad state: {}", e),
        }
    }
}
