#![no_main]

use compucolor::memory::MemoryInterface;
use compucolor::{Config, Machine};
use libfuzzer_sys::fuzz_target;

/// Run arbitrary bytes as a program in DRAM. Port writes reach the real
/// devices, so this also shakes the 5501, the 5027 and the drives.
fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    let mut machine = Machine::new(&Config::default());
    let program = &data[2..];
    let copy_len = std::cmp::min(program.len(), 0x4000);
    for (i, &b) in program[..copy_len].iter().enumerate() {
        machine.board.memory.write_unsafe(0x8000 + i as u16, b);
    }
    machine.cpu.pc = 0x8000;
    machine.cpu.sp = 0xFF00;
    machine.cpu.a = data[0];
    machine.cpu.set_hl(0xC000 | data[1] as u16);

    for _ in 0..2000 {
        if machine.cpu.halted {
            break;
        }
        machine.guarded_step();
    }

    assert!(machine.fault().is_none());
    // ROM never changes under program control
    assert_eq!(machine.board.peek_byte(0x0000), 0x00);
});
