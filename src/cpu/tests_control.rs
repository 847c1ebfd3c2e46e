//! Loads, stores, stack and control transfer

use super::test_utils::{create_cpu, run};
use super::*;

#[test]
fn test_mov_and_mvi() {
    // MVI B,42 ; MOV C,B ; MOV A,C
    let (mut cpu, mut bus) = create_cpu(&[0x06, 0x42, 0x48, 0x79]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.b, 0x42);
    assert_eq!(cpu.c, 0x42);
    assert_eq!(cpu.a, 0x42);
    assert_eq!(cpu.pc, 4);
}

#[test]
fn test_mov_memory() {
    // LXI H,9000 ; MVI M,5A ; MOV E,M
    let (mut cpu, mut bus) = create_cpu(&[0x21, 0x00, 0x90, 0x36, 0x5A, 0x5E]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(bus.mem[0x9000], 0x5A);
    assert_eq!(cpu.e, 0x5A);
}

#[test]
fn test_sta_lda() {
    // MVI A,77 ; STA 8123 ; MVI A,0 ; LDA 8123
    let (mut cpu, mut bus) = create_cpu(&[0x3E, 0x77, 0x32, 0x23, 0x81, 0x3E, 0x00, 0x3A, 0x23, 0x81]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(bus.mem[0x8123], 0x77);
    assert_eq!(cpu.a, 0x77);
}

#[test]
fn test_stax_ldax() {
    // LXI D,8800 ; MVI A,33 ; STAX D ; XRA A ; LDAX D
    let (mut cpu, mut bus) = create_cpu(&[0x11, 0x00, 0x88, 0x3E, 0x33, 0x12, 0xAF, 0x1A]);
    run(&mut cpu, &mut bus, 5);
    assert_eq!(bus.mem[0x8800], 0x33);
    assert_eq!(cpu.a, 0x33);
}

#[test]
fn test_shld_lhld() {
    // LXI H,BEEF ; SHLD 8000 ; LXI H,0 ; LHLD 8000
    let (mut cpu, mut bus) = create_cpu(&[0x21, 0xEF, 0xBE, 0x22, 0x00, 0x80, 0x21, 0x00, 0x00, 0x2A, 0x00, 0x80]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(bus.mem[0x8000], 0xEF);
    assert_eq!(bus.mem[0x8001], 0xBE);
    assert_eq!(cpu.hl(), 0xBEEF);
}

#[test]
fn test_push_pop_pairs() {
    // LXI SP,9000 ; LXI B,1234 ; PUSH B ; POP D
    let (mut cpu, mut bus) = create_cpu(&[0x31, 0x00, 0x90, 0x01, 0x34, 0x12, 0xC5, 0xD1]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.de(), 0x1234);
    assert_eq!(cpu.sp, 0x9000);
    assert_eq!(bus.mem[0x8FFE], 0x34);
    assert_eq!(bus.mem[0x8FFF], 0x12);
}

#[test]
fn test_push_psw_layout() {
    // PUSH PSW
    let (mut cpu, mut bus) = create_cpu(&[0xF5]);
    cpu.sp = 0x9000;
    cpu.a = 0xAB;
    cpu.f = 0xFF;
    cpu.step(&mut bus);
    assert_eq!(bus.mem[0x8FFF], 0xAB);
    assert_eq!(bus.mem[0x8FFE], 0xD7);
}

#[test]
fn test_pop_psw_masks_flags() {
    let (mut cpu, mut bus) = create_cpu(&[0xF1]);
    cpu.sp = 0x9000;
    bus.mem[0x9000] = 0xFF;
    bus.mem[0x9001] = 0x12;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x12);
    assert_eq!(cpu.f, flags::DEFINED);
}

#[test]
fn test_jmp_and_conditional_jumps() {
    let (mut cpu, mut bus) = create_cpu(&[0xC3, 0x00, 0x10]);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x1000);

    // JZ not taken still consumes the operand
    let (mut cpu, mut bus) = create_cpu(&[0xCA, 0x00, 0x10]);
    cpu.f = 0;
    assert_eq!(cpu.step(&mut bus), 10);
    assert_eq!(cpu.pc, 3);

    let (mut cpu, mut bus) = create_cpu(&[0xCA, 0x00, 0x10]);
    cpu.f = flags::ZERO;
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x1000);
}

#[test]
fn test_all_conditions() {
    let cases = [
        (0xC2, 0, true),
        (0xC2, flags::ZERO, false),
        (0xD2, 0, true),
        (0xDA, flags::CARRY, true),
        (0xE2, 0, true),
        (0xEA, flags::PARITY, true),
        (0xF2, flags::SIGN, false),
        (0xFA, flags::SIGN, true),
    ];
    for (op, f, taken) in cases {
        let (mut cpu, mut bus) = create_cpu(&[op, 0x34, 0x12]);
        cpu.f = f;
        cpu.step(&mut bus);
        assert_eq!(cpu.pc == 0x1234, taken, "opcode {:02X}", op);
    }
}

#[test]
fn test_call_and_ret() {
    let mut program = vec![0x31, 0x00, 0x90, 0xCD, 0x00, 0x20];
    program.resize(0x2001, 0);
    program[0x2000] = 0xC9;
    let (mut cpu, mut bus) = create_cpu(&program);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.pc, 0x2000);
    assert_eq!(cpu.sp, 0x8FFE);
    assert_eq!(bus.mem[0x8FFE], 0x06);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x0006);
    assert_eq!(cpu.sp, 0x9000);
}

#[test]
fn test_conditional_call_and_return_cycles() {
    let (mut cpu, mut bus) = create_cpu(&[0xC4, 0x00, 0x20]);
    cpu.sp = 0x9000;
    cpu.f = flags::ZERO;
    assert_eq!(cpu.step(&mut bus), 11);
    assert_eq!(cpu.pc, 3);

    let (mut cpu, mut bus) = create_cpu(&[0xC4, 0x00, 0x20]);
    cpu.sp = 0x9000;
    cpu.f = 0;
    assert_eq!(cpu.step(&mut bus), 17);
    assert_eq!(cpu.pc, 0x2000);

    let (mut cpu, mut bus) = create_cpu(&[0xC8]);
    cpu.f = 0;
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(cpu.pc, 1);

    let (mut cpu, mut bus) = create_cpu(&[0xC8]);
    cpu.sp = 0x9000;
    bus.mem[0x9000] = 0x34;
    bus.mem[0x9001] = 0x12;
    cpu.f = flags::ZERO;
    assert_eq!(cpu.step(&mut bus), 11);
    assert_eq!(cpu.pc, 0x1234);
}

#[test]
fn test_rst() {
    let mut program = vec![0u8; 0x101];
    program[0x100] = 0xEF; // RST 5
    let (mut cpu, mut bus) = create_cpu(&program);
    cpu.pc = 0x100;
    cpu.sp = 0x9000;
    assert_eq!(cpu.step(&mut bus), 11);
    assert_eq!(cpu.pc, 0x28);
    assert_eq!(bus.mem[0x8FFE], 0x01);
    assert_eq!(bus.mem[0x8FFF], 0x01);
}

#[test]
fn test_pchl_sphl_xchg_xthl() {
    let (mut cpu, mut bus) = create_cpu(&[0xE9]);
    cpu.set_hl(0x4321);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x4321);

    let (mut cpu, mut bus) = create_cpu(&[0xF9]);
    cpu.set_hl(0x8800);
    cpu.step(&mut bus);
    assert_eq!(cpu.sp, 0x8800);

    let (mut cpu, mut bus) = create_cpu(&[0xEB]);
    cpu.set_hl(0x1111);
    cpu.set_de(0x2222);
    cpu.step(&mut bus);
    assert_eq!(cpu.hl(), 0x2222);
    assert_eq!(cpu.de(), 0x1111);

    let (mut cpu, mut bus) = create_cpu(&[0xE3]);
    cpu.sp = 0x9000;
    cpu.set_hl(0xAAAA);
    bus.mem[0x9000] = 0x55;
    bus.mem[0x9001] = 0x66;
    assert_eq!(cpu.step(&mut bus), 18);
    assert_eq!(cpu.hl(), 0x6655);
    assert_eq!(bus.mem[0x9000], 0xAA);
    assert_eq!(bus.mem[0x9001], 0xAA);
}

#[test]
fn test_in_out() {
    // MVI A,5A ; OUT 06 ; IN 42
    let (mut cpu, mut bus) = create_cpu(&[0x3E, 0x5A, 0xD3, 0x06, 0xDB, 0x42]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(bus.written_ports, vec![(0x06, 0x5A)]);
    // the test bus echoes unmapped ports
    assert_eq!(cpu.a, 0x42);
}

#[test]
fn test_hlt_idles() {
    let (mut cpu, mut bus) = create_cpu(&[0x76, 0x3C]);
    assert_eq!(cpu.step(&mut bus), 7);
    assert!(cpu.halted);
    assert_eq!(cpu.step(&mut bus), HALT_IDLE_CYCLES);
    assert_eq!(cpu.step(&mut bus), HALT_IDLE_CYCLES);
    assert_eq!(cpu.pc, 1);
    assert_eq!(cpu.a, 0);
}

#[test]
fn test_illegal_opcode_halts() {
    for op in [0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38, 0xCB, 0xD9, 0xDD, 0xED, 0xFD] {
        let (mut cpu, mut bus) = create_cpu(&[op, 0x3C]);
        assert_eq!(cpu.step(&mut bus), 4);
        assert!(cpu.halted, "opcode {:02X}", op);
        cpu.step(&mut bus);
        assert_eq!(cpu.a, 0, "opcode {:02X}", op);
    }
}

#[test]
fn test_reset_clears_state() {
    let (mut cpu, _) = create_cpu(&[]);
    cpu.a = 1;
    cpu.pc = 0x1234;
    cpu.sp = 0x4000;
    cpu.inte = true;
    cpu.halted = true;
    cpu.reset();
    assert_eq!(cpu.a, 0);
    assert_eq!(cpu.pc, 0);
    assert_eq!(cpu.sp, 0);
    assert!(!cpu.inte);
    assert!(!cpu.halted);
}

#[test]
fn test_state_roundtrip_through_debugger() {
    let (mut cpu, _) = create_cpu(&[]);
    cpu.set_bc(0x1234);
    cpu.pc = 0x5678;
    let state = cpu.read_state();
    let mut other = I8080::new();
    other.write_state(&state);
    assert_eq!(other.bc(), 0x1234);
    assert_eq!(other.pc, 0x5678);
}
