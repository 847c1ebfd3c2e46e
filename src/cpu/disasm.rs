//! Single-instruction disassembler, driven by the opcode table.

use super::ops::{Operands, OPCODES};
use crate::memory::MemoryInterface;

const REG: [&str; 8] = ["B", "C", "D", "E", "H", "L", "M", "A"];
const RP: [&str; 4] = ["B", "D", "H", "SP"];
const RP_PSW: [&str; 4] = ["B", "D", "H", "PSW"];

/// Disassemble the instruction at `addr` without side effects.
/// Returns the text and the address of the following instruction.
pub fn disassemble<M: MemoryInterface + ?Sized>(mem: &M, addr: u16) -> (String, u16) {
    let opcode = mem.peek_byte(addr);
    let entry = &OPCODES[opcode as usize];
    let imm8 = mem.peek_byte(addr.wrapping_add(1));
    let imm16 = (mem.peek_byte(addr.wrapping_add(2)) as u16) << 8 | imm8 as u16;
    let dst = REG[((opcode >> 3) & 7) as usize];
    let src = REG[(opcode & 7) as usize];
    let rp = ((opcode >> 4) & 3) as usize;

    let text = match entry.operands {
        Operands::None if entry.is_illegal() => format!("DB {:02X}H", opcode),
        Operands::None => entry.mnemonic.to_string(),
        Operands::Dst => format!("{} {}", entry.mnemonic, dst),
        Operands::Src => format!("{} {}", entry.mnemonic, src),
        Operands::DstSrc => format!("{} {},{}", entry.mnemonic, dst, src),
        Operands::Rp => format!("{} {}", entry.mnemonic, RP[rp]),
        Operands::RpPsw => format!("{} {}", entry.mnemonic, RP_PSW[rp]),
        Operands::Imm8 => format!("{} {:02X}H", entry.mnemonic, imm8),
        Operands::Imm16 => format!("{} {:04X}H", entry.mnemonic, imm16),
        Operands::DstImm8 => format!("{} {},{:02X}H", entry.mnemonic, dst, imm8),
        Operands::RpImm16 => format!("{} {},{:04X}H", entry.mnemonic, RP[rp], imm16),
        Operands::Rst => format!("{} {}", entry.mnemonic, (opcode >> 3) & 7),
    };
    (text, addr.wrapping_add(entry.len as u16))
}
