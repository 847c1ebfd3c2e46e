//! Intel 8080 CPU
//!
//! The Compucolor II runs an 8080 at 1.9968 MHz. Instructions dispatch
//! through a 256-entry table (see [`ops`]); each handler returns its
//! data-sheet cycle count, which the machine feeds to the scheduler.
//!
//! Interrupts are level-sensitive. The controller drives [`I8080::irq`];
//! the line is sampled only at instruction boundaries, and an accepted
//! interrupt executes whatever opcode the controller supplies (an RST on
//! this machine) in place of the next fetch.

use crate::debugger::Debuggable;
use crate::memory::CpuBus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod disasm;
pub mod ops;

pub use disasm::disassemble;

/// 8080 flag bits in the F register
pub mod flags {
    pub const CARRY: u8 = 0b0000_0001;      // CY
    pub const PARITY: u8 = 0b0000_0100;     // P - even parity
    pub const HALF_CARRY: u8 = 0b0001_0000; // AC - auxiliary carry
    pub const ZERO: u8 = 0b0100_0000;       // Z
    pub const SIGN: u8 = 0b1000_0000;       // S

    /// Bits that hold flags; the rest read back as fixed values.
    pub const DEFINED: u8 = SIGN | ZERO | HALF_CARRY | PARITY | CARRY;
    /// Bit 1 always reads as 1 in a pushed PSW.
    pub const ALWAYS_ONE: u8 = 0b0000_0010;
}

/// Idle cost of one step while halted.
pub const HALT_IDLE_CYCLES: u32 = 4;

/// 8080 CPU state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct I8080 {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    pub sp: u16,
    pub pc: u16,

    /// Interrupt enable flip-flop
    pub inte: bool,
    /// EI takes effect after the following instruction
    pub ei_delay: bool,
    pub halted: bool,
    /// Interrupt request line as last driven by the controller
    pub int_pending: bool,

    /// Total cycles executed since reset
    pub cycles: u64,
}

impl I8080 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero all registers and leave the CPU running with interrupts off.
    pub fn reset(&mut self) {
        *self = Self {
            int_pending: self.int_pending,
            ..Self::default()
        };
    }

    /// Drive the interrupt request line.
    pub fn irq(&mut self, pending: bool) {
        self.int_pending = pending;
    }

    // ========== Register pair getters/setters ==========

    pub fn psw(&self) -> u16 {
        (self.a as u16) << 8 | ((self.f & flags::DEFINED) | flags::ALWAYS_ONE) as u16
    }

    pub fn set_psw(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = val as u8 & flags::DEFINED;
    }

    pub fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn de(&self) -> u16 {
        (self.d as u16) << 8 | self.e as u16
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    // ========== Flag helpers ==========

    pub fn get_flag(&self, flag: u8) -> bool {
        (self.f & flag) != 0
    }

    pub fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.f |= flag;
        } else {
            self.f &= !flag;
        }
    }

    fn set_szp_flags(&mut self, value: u8) {
        self.set_flag(flags::ZERO, value == 0);
        self.set_flag(flags::SIGN, (value & 0x80) != 0);
        self.set_flag(flags::PARITY, value.count_ones() % 2 == 0);
    }

    // ========== Bus helpers ==========

    fn fetch_byte(&mut self, bus: &mut dyn CpuBus) -> u8 {
        let byte = bus.read_byte(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn fetch_word(&mut self, bus: &mut dyn CpuBus) -> u16 {
        let low = self.fetch_byte(bus) as u16;
        let high = self.fetch_byte(bus) as u16;
        (high << 8) | low
    }

    fn push(&mut self, bus: &mut dyn CpuBus, value: u16) {
        self.sp = self.sp.wrapping_sub(2);
        bus.write_word(self.sp, value);
    }

    fn pop(&mut self, bus: &mut dyn CpuBus) -> u16 {
        let value = bus.read_word(self.sp);
        self.sp = self.sp.wrapping_add(2);
        value
    }

    // ========== ALU operations ==========

    fn add_a(&mut self, value: u8, with_carry: bool) {
        let carry = (with_carry && self.get_flag(flags::CARRY)) as u16;
        let result = self.a as u16 + value as u16 + carry;
        let half = (self.a & 0x0F) as u16 + (value & 0x0F) as u16 + carry > 0x0F;
        self.a = result as u8;
        self.set_szp_flags(self.a);
        self.set_flag(flags::HALF_CARRY, half);
        self.set_flag(flags::CARRY, result > 0xFF);
    }

    /// SUB/SBB/CMP. Carry and half carry report a borrow.
    fn sub_a(&mut self, value: u8, with_carry: bool, store: bool) {
        let carry = (with_carry && self.get_flag(flags::CARRY)) as u16;
        let subtrahend = value as u16 + carry;
        let result = (self.a as u16).wrapping_sub(subtrahend);
        let half = ((self.a & 0x0F) as u16) < (value & 0x0F) as u16 + carry;
        self.set_szp_flags(result as u8);
        self.set_flag(flags::HALF_CARRY, half);
        self.set_flag(flags::CARRY, (self.a as u16) < subtrahend);
        if store {
            self.a = result as u8;
        }
    }

    fn logic_flags(&mut self) {
        self.set_szp_flags(self.a);
        self.set_flag(flags::HALF_CARRY, false);
        self.set_flag(flags::CARRY, false);
    }

    fn and_a(&mut self, value: u8) {
        self.a &= value;
        self.logic_flags();
    }

    fn xor_a(&mut self, value: u8) {
        self.a ^= value;
        self.logic_flags();
    }

    fn or_a(&mut self, value: u8) {
        self.a |= value;
        self.logic_flags();
    }

    /// ALU group selected by bits 3-5 of the opcode.
    fn alu(&mut self, op: u8, value: u8) {
        match op & 7 {
            0 => self.add_a(value, false),        // ADD
            1 => self.add_a(value, true),         // ADC
            2 => self.sub_a(value, false, true),  // SUB
            3 => self.sub_a(value, true, true),   // SBB
            4 => self.and_a(value),               // ANA
            5 => self.xor_a(value),               // XRA
            6 => self.or_a(value),                // ORA
            _ => self.sub_a(value, false, false), // CMP
        }
    }

    fn inr(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.set_szp_flags(result);
        self.set_flag(flags::HALF_CARRY, (value & 0x0F) == 0x0F);
        result
    }

    fn dcr(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.set_szp_flags(result);
        self.set_flag(flags::HALF_CARRY, (value & 0x0F) == 0x00);
        result
    }

    fn dad(&mut self, value: u16) {
        let result = self.hl() as u32 + value as u32;
        self.set_flag(flags::CARRY, result > 0xFFFF);
        self.set_hl(result as u16);
    }

    fn daa(&mut self) {
        let lo = self.a & 0x0F;
        let hi = self.a >> 4;
        let carry = self.get_flag(flags::CARRY);
        let mut adjust = 0u8;
        if lo > 9 || self.get_flag(flags::HALF_CARRY) {
            adjust |= 0x06;
        }
        if hi > 9 || carry || (hi == 9 && lo > 9) {
            adjust |= 0x60;
        }
        let half = lo + (adjust & 0x0F) > 0x0F;
        self.a = self.a.wrapping_add(adjust);
        self.set_szp_flags(self.a);
        self.set_flag(flags::HALF_CARRY, half);
        self.set_flag(flags::CARRY, carry || adjust & 0x60 != 0);
    }

    // ========== Register decoding ==========

    /// 3-bit register field; 6 is the byte at (HL).
    fn get_reg(&mut self, bus: &mut dyn CpuBus, index: u8) -> u8 {
        match index & 7 {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => bus.read_byte(self.hl()),
            _ => self.a,
        }
    }

    fn set_reg(&mut self, bus: &mut dyn CpuBus, index: u8, value: u8) {
        match index & 7 {
            0 => self.b = value,
            1 => self.c = value,
            2 => self.d = value,
            3 => self.e = value,
            4 => self.h = value,
            5 => self.l = value,
            6 => bus.write_byte(self.hl(), value),
            _ => self.a = value,
        }
    }

    /// 2-bit register pair field with SP in slot 3.
    fn get_rp(&self, index: u8) -> u16 {
        match index & 3 {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    fn set_rp(&mut self, index: u8, value: u16) {
        match index & 3 {
            0 => self.set_bc(value),
            1 => self.set_de(value),
            2 => self.set_hl(value),
            _ => self.sp = value,
        }
    }

    /// Condition field: NZ Z NC C PO PE P M.
    fn check_condition(&self, cc: u8) -> bool {
        match cc & 7 {
            0 => !self.get_flag(flags::ZERO),
            1 => self.get_flag(flags::ZERO),
            2 => !self.get_flag(flags::CARRY),
            3 => self.get_flag(flags::CARRY),
            4 => !self.get_flag(flags::PARITY),
            5 => self.get_flag(flags::PARITY),
            6 => !self.get_flag(flags::SIGN),
            _ => self.get_flag(flags::SIGN),
        }
    }

    // ========== Main execution ==========

    /// Execute one instruction (or take an interrupt, or idle while
    /// halted) and return the cycles consumed.
    pub fn step(&mut self, bus: &mut dyn CpuBus) -> u32 {
        let deferred = std::mem::take(&mut self.ei_delay);
        let cycles = if self.int_pending && self.inte && !deferred {
            self.halted = false;
            self.inte = false;
            // nothing was prefetched, so PC already names the instruction
            // to resume at
            let opcode = bus.acknowledge_interrupt();
            log::trace!("8080: interrupt, executing {:02X} at {:04X}", opcode, self.pc);
            self.execute(bus, opcode)
        } else if self.halted {
            HALT_IDLE_CYCLES
        } else {
            let opcode = self.fetch_byte(bus);
            self.execute(bus, opcode)
        };
        self.cycles += cycles as u64;
        cycles
    }

    /// Run a single opcode whose byte has already been consumed.
    pub fn execute(&mut self, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
        (ops::OPCODES[opcode as usize].exec)(self, bus, opcode)
    }
}

impl Debuggable for I8080 {
    fn read_state(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn write_state(&mut self, state: &Value) {
        match serde_json::from_value(state.clone()) {
            Ok(cpu) => *self = cpu,
            Err(e) => log::warn!("8080: ignoring bad state: {}", e),
        }
    }
}


#[cfg(test)]
mod tests_alu;


#[cfg(test)]
mod tests_control;
