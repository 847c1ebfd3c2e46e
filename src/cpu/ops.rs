//! 8080 opcode table
//!
//! One entry per opcode byte. Handlers decode their register fields from
//! the opcode itself, so a family like MOV shares one function. Cycle
//! counts are the Intel data sheet figures.

use super::{flags, I8080};
use crate::memory::CpuBus;

pub type ExecFn = fn(&mut I8080, &mut dyn CpuBus, u8) -> u32;

/// Operand shape, used by the disassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    /// Register in bits 3-5
    Dst,
    /// Register in bits 0-2
    Src,
    DstSrc,
    /// Register pair in bits 4-5, SP in slot 3
    Rp,
    /// Register pair in bits 4-5, PSW in slot 3
    RpPsw,
    Imm8,
    Imm16,
    DstImm8,
    RpImm16,
    /// RST number in bits 3-5
    Rst,
}

#[derive(Clone, Copy)]
pub struct OpEntry {
    pub mnemonic: &'static str,
    pub operands: Operands,
    /// Instruction length in bytes
    pub len: u8,
    pub exec: ExecFn,
}

impl OpEntry {
    pub fn is_illegal(&self) -> bool {
        self.mnemonic == "???"
    }
}

const fn op(mnemonic: &'static str, operands: Operands, len: u8, exec: ExecFn) -> OpEntry {
    OpEntry {
        mnemonic,
        operands,
        len,
        exec,
    }
}

const ILLEGAL: OpEntry = op("???", Operands::None, 1, illegal);

const CC: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];

const fn jcc_name(cc: u8) -> &'static str {
    match cc {
        0 => "JNZ",
        1 => "JZ",
        2 => "JNC",
        3 => "JC",
        4 => "JPO",
        5 => "JPE",
        6 => "JP",
        _ => "JM",
    }
}

const fn ccc_name(cc: u8) -> &'static str {
    match cc {
        0 => "CNZ",
        1 => "CZ",
        2 => "CNC",
        3 => "CC",
        4 => "CPO",
        5 => "CPE",
        6 => "CP",
        _ => "CM",
    }
}

const fn rcc_name(cc: u8) -> &'static str {
    match cc {
        0 => "RNZ",
        1 => "RZ",
        2 => "RNC",
        3 => "RC",
        4 => "RPO",
        5 => "RPE",
        6 => "RP",
        _ => "RM",
    }
}

const fn alu_name(op: u8, imm: bool) -> &'static str {
    match (op, imm) {
        (0, false) => "ADD",
        (1, false) => "ADC",
        (2, false) => "SUB",
        (3, false) => "SBB",
        (4, false) => "ANA",
        (5, false) => "XRA",
        (6, false) => "ORA",
        (7, false) => "CMP",
        (0, true) => "ADI",
        (1, true) => "ACI",
        (2, true) => "SUI",
        (3, true) => "SBI",
        (4, true) => "ANI",
        (5, true) => "XRI",
        (6, true) => "ORI",
        _ => "CPI",
    }
}

const fn entry(opcode: u8) -> OpEntry {
    use Operands::*;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;
    let q = (opcode >> 3) & 1;

    match opcode >> 6 {
        0 => match z {
            0 => {
                if opcode == 0x00 {
                    op("NOP", None, 1, nop)
                } else {
                    ILLEGAL
                }
            }
            1 => {
                if q == 0 {
                    op("LXI", RpImm16, 3, lxi)
                } else {
                    op("DAD", Rp, 1, dad)
                }
            }
            2 => match opcode {
                0x02 => op("STAX", Rp, 1, stax),
                0x12 => op("STAX", Rp, 1, stax),
                0x0A => op("LDAX", Rp, 1, ldax),
                0x1A => op("LDAX", Rp, 1, ldax),
                0x22 => op("SHLD", Imm16, 3, shld),
                0x2A => op("LHLD", Imm16, 3, lhld),
                0x32 => op("STA", Imm16, 3, sta),
                _ => op("LDA", Imm16, 3, lda),
            },
            3 => {
                if q == 0 {
                    op("INX", Rp, 1, inx)
                } else {
                    op("DCX", Rp, 1, dcx)
                }
            }
            4 => op("INR", Dst, 1, inr),
            5 => op("DCR", Dst, 1, dcr),
            6 => op("MVI", DstImm8, 2, mvi),
            _ => match y {
                0 => op("RLC", None, 1, rlc),
                1 => op("RRC", None, 1, rrc),
                2 => op("RAL", None, 1, ral),
                3 => op("RAR", None, 1, rar),
                4 => op("DAA", None, 1, daa),
                5 => op("CMA", None, 1, cma),
                6 => op("STC", None, 1, stc),
                _ => op("CMC", None, 1, cmc),
            },
        },
        1 => {
            if opcode == 0x76 {
                op("HLT", None, 1, hlt)
            } else {
                op("MOV", DstSrc, 1, mov)
            }
        }
        2 => op(alu_name(y, false), Src, 1, alu_reg),
        _ => match z {
            0 => op(rcc_name(y), None, 1, rcc),
            1 => match opcode {
                0xC9 => op("RET", None, 1, ret),
                0xE9 => op("PCHL", None, 1, pchl),
                0xF9 => op("SPHL", None, 1, sphl),
                0xD9 => ILLEGAL,
                _ => op("POP", RpPsw, 1, pop),
            },
            2 => op(jcc_name(y), Imm16, 3, jcc),
            3 => match opcode {
                0xC3 => op("JMP", Imm16, 3, jmp),
                0xD3 => op("OUT", Imm8, 2, out),
                0xDB => op("IN", Imm8, 2, input),
                0xE3 => op("XTHL", None, 1, xthl),
                0xEB => op("XCHG", None, 1, xchg),
                0xF3 => op("DI", None, 1, di),
                0xFB => op("EI", None, 1, ei),
                _ => ILLEGAL, // CB
            },
            4 => op(ccc_name(y), Imm16, 3, ccc),
            5 => match opcode {
                0xCD => op("CALL", Imm16, 3, call),
                0xC5 | 0xD5 | 0xE5 | 0xF5 => op("PUSH", RpPsw, 1, push),
                _ => ILLEGAL, // DD ED FD
            },
            6 => op(alu_name(y, true), Imm8, 2, alu_imm),
            _ => op("RST", Rst, 1, rst),
        },
    }
}

const fn build_table() -> [OpEntry; 256] {
    let mut table = [ILLEGAL; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = entry(i as u8);
        i += 1;
    }
    table
}

/// Dispatch table indexed by opcode byte.
pub static OPCODES: [OpEntry; 256] = build_table();

/// Condition names in field order, for the disassembler.
pub fn condition_name(cc: u8) -> &'static str {
    CC[(cc & 7) as usize]
}

// ========== Handlers ==========

fn nop(_: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    4
}

fn illegal(cpu: &mut I8080, _: &mut dyn CpuBus, opcode: u8) -> u32 {
    log::warn!(
        "8080: illegal opcode {:02X} at {:04X}, halting",
        opcode,
        cpu.pc.wrapping_sub(1)
    );
    cpu.halted = true;
    4
}

fn lxi(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let nn = cpu.fetch_word(bus);
    cpu.set_rp(opcode >> 4, nn);
    10
}

fn dad(cpu: &mut I8080, _: &mut dyn CpuBus, opcode: u8) -> u32 {
    let rp = cpu.get_rp(opcode >> 4);
    cpu.dad(rp);
    10
}

fn stax(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let addr = cpu.get_rp(opcode >> 4);
    bus.write_byte(addr, cpu.a);
    7
}

fn ldax(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let addr = cpu.get_rp(opcode >> 4);
    cpu.a = bus.read_byte(addr);
    7
}

fn shld(cpu: &mut I8080, bus: &mut dyn CpuBus, _: u8) -> u32 {
    let addr = cpu.fetch_word(bus);
    bus.write_word(addr, cpu.hl());
    16
}

fn lhld(cpu: &mut I8080, bus: &mut dyn CpuBus, _: u8) -> u32 {
    let addr = cpu.fetch_word(bus);
    let value = bus.read_word(addr);
    cpu.set_hl(value);
    16
}

fn sta(cpu: &mut I8080, bus: &mut dyn CpuBus, _: u8) -> u32 {
    let addr = cpu.fetch_word(bus);
    bus.write_byte(addr, cpu.a);
    13
}

fn lda(cpu: &mut I8080, bus: &mut dyn CpuBus, _: u8) -> u32 {
    let addr = cpu.fetch_word(bus);
    cpu.a = bus.read_byte(addr);
    13
}

fn inx(cpu: &mut I8080, _: &mut dyn CpuBus, opcode: u8) -> u32 {
    let rp = opcode >> 4;
    cpu.set_rp(rp, cpu.get_rp(rp).wrapping_add(1));
    5
}

fn dcx(cpu: &mut I8080, _: &mut dyn CpuBus, opcode: u8) -> u32 {
    let rp = opcode >> 4;
    cpu.set_rp(rp, cpu.get_rp(rp).wrapping_sub(1));
    5
}

fn inr(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let r = opcode >> 3;
    let value = cpu.get_reg(bus, r);
    let result = cpu.inr(value);
    cpu.set_reg(bus, r, result);
    if r & 7 == 6 {
        10
    } else {
        5
    }
}

fn dcr(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let r = opcode >> 3;
    let value = cpu.get_reg(bus, r);
    let result = cpu.dcr(value);
    cpu.set_reg(bus, r, result);
    if r & 7 == 6 {
        10
    } else {
        5
    }
}

fn mvi(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let n = cpu.fetch_byte(bus);
    let r = opcode >> 3;
    cpu.set_reg(bus, r, n);
    if r & 7 == 6 {
        10
    } else {
        7
    }
}

fn rlc(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    let carry = cpu.a & 0x80 != 0;
    cpu.a = cpu.a.rotate_left(1);
    cpu.set_flag(flags::CARRY, carry);
    4
}

fn rrc(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    let carry = cpu.a & 0x01 != 0;
    cpu.a = cpu.a.rotate_right(1);
    cpu.set_flag(flags::CARRY, carry);
    4
}

fn ral(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    let old_carry = cpu.get_flag(flags::CARRY) as u8;
    cpu.set_flag(flags::CARRY, cpu.a & 0x80 != 0);
    cpu.a = (cpu.a << 1) | old_carry;
    4
}

fn rar(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    let old_carry = (cpu.get_flag(flags::CARRY) as u8) << 7;
    cpu.set_flag(flags::CARRY, cpu.a & 0x01 != 0);
    cpu.a = (cpu.a >> 1) | old_carry;
    4
}

fn daa(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    cpu.daa();
    4
}

fn cma(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    cpu.a = !cpu.a;
    4
}

fn stc(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    cpu.set_flag(flags::CARRY, true);
    4
}

fn cmc(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    cpu.f ^= flags::CARRY;
    4
}

fn mov(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let dst = (opcode >> 3) & 7;
    let src = opcode & 7;
    let value = cpu.get_reg(bus, src);
    cpu.set_reg(bus, dst, value);
    if dst == 6 || src == 6 {
        7
    } else {
        5
    }
}

fn hlt(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    cpu.halted = true;
    7
}

fn alu_reg(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let src = opcode & 7;
    let value = cpu.get_reg(bus, src);
    cpu.alu(opcode >> 3, value);
    if src == 6 {
        7
    } else {
        4
    }
}

fn alu_imm(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let n = cpu.fetch_byte(bus);
    cpu.alu(opcode >> 3, n);
    7
}

fn rcc(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    if cpu.check_condition(opcode >> 3) {
        cpu.pc = cpu.pop(bus);
        11
    } else {
        5
    }
}

fn ret(cpu: &mut I8080, bus: &mut dyn CpuBus, _: u8) -> u32 {
    cpu.pc = cpu.pop(bus);
    10
}

fn pchl(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    cpu.pc = cpu.hl();
    5
}

fn sphl(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    cpu.sp = cpu.hl();
    5
}

fn pop(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let value = cpu.pop(bus);
    match (opcode >> 4) & 3 {
        3 => cpu.set_psw(value),
        rp => cpu.set_rp(rp, value),
    }
    10
}

fn push(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let value = match (opcode >> 4) & 3 {
        3 => cpu.psw(),
        rp => cpu.get_rp(rp),
    };
    cpu.push(bus, value);
    11
}

fn jcc(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let target = cpu.fetch_word(bus);
    if cpu.check_condition(opcode >> 3) {
        cpu.pc = target;
    }
    10
}

fn jmp(cpu: &mut I8080, bus: &mut dyn CpuBus, _: u8) -> u32 {
    cpu.pc = cpu.fetch_word(bus);
    10
}

fn out(cpu: &mut I8080, bus: &mut dyn CpuBus, _: u8) -> u32 {
    let port = cpu.fetch_byte(bus);
    bus.write_port(port, cpu.a);
    10
}

fn input(cpu: &mut I8080, bus: &mut dyn CpuBus, _: u8) -> u32 {
    let port = cpu.fetch_byte(bus);
    cpu.a = bus.read_port(port);
    10
}

fn xthl(cpu: &mut I8080, bus: &mut dyn CpuBus, _: u8) -> u32 {
    let top = bus.read_word(cpu.sp);
    bus.write_word(cpu.sp, cpu.hl());
    cpu.set_hl(top);
    18
}

fn xchg(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    std::mem::swap(&mut cpu.h, &mut cpu.d);
    std::mem::swap(&mut cpu.l, &mut cpu.e);
    4
}

fn di(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    cpu.inte = false;
    4
}

fn ei(cpu: &mut I8080, _: &mut dyn CpuBus, _: u8) -> u32 {
    cpu.inte = true;
    cpu.ei_delay = true;
    4
}

fn ccc(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    let target = cpu.fetch_word(bus);
    if cpu.check_condition(opcode >> 3) {
        cpu.push(bus, cpu.pc);
        cpu.pc = target;
        17
    } else {
        11
    }
}

fn call(cpu: &mut I8080, bus: &mut dyn CpuBus, _: u8) -> u32 {
    let target = cpu.fetch_word(bus);
    cpu.push(bus, cpu.pc);
    cpu.pc = target;
    17
}

fn rst(cpu: &mut I8080, bus: &mut dyn CpuBus, opcode: u8) -> u32 {
    cpu.push(bus, cpu.pc);
    cpu.pc = (opcode & 0x38) as u16;
    11
}
