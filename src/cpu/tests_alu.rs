//! 8080 ALU and flag tests

use super::test_utils::create_cpu;
use super::*;

fn exec(program: &[u8], setup: impl FnOnce(&mut I8080)) -> I8080 {
    let (mut cpu, mut bus) = create_cpu(program);
    setup(&mut cpu);
    cpu.step(&mut bus);
    cpu
}

// ============ INR / DCR ============

#[test]
fn inr_a_wraps_to_zero() {
    let c = exec(&[0x3C], |c| c.a = 0xFF);
    assert_eq!(c.a, 0x00);
    assert!(c.get_flag(flags::ZERO));
    assert!(!c.get_flag(flags::SIGN));
    assert!(c.get_flag(flags::PARITY));
    assert!(c.get_flag(flags::HALF_CARRY));
    assert!(!c.get_flag(flags::CARRY));
}

#[test]
fn inr_preserves_carry() {
    let c = exec(&[0x3C], |c| {
        c.a = 0xFF;
        c.set_flag(flags::CARRY, true);
    });
    assert!(c.get_flag(flags::CARRY));
}

#[test] fn inr_b() { let c = exec(&[0x04], |c| c.b = 0x7F); assert_eq!(c.b, 0x80); assert!(c.get_flag(flags::SIGN)); assert!(c.get_flag(flags::HALF_CARRY)); }
#[test] fn inr_c_no_half() { let c = exec(&[0x0C], |c| c.c = 0x10); assert_eq!(c.c, 0x11); assert!(!c.get_flag(flags::HALF_CARRY)); }
#[test] fn dcr_d_to_zero() { let c = exec(&[0x15], |c| c.d = 0x01); assert_eq!(c.d, 0); assert!(c.get_flag(flags::ZERO)); assert!(!c.get_flag(flags::HALF_CARRY)); }
#[test] fn dcr_e_borrow() { let c = exec(&[0x1D], |c| c.e = 0x10); assert_eq!(c.e, 0x0F); assert!(c.get_flag(flags::HALF_CARRY)); }
#[test] fn dcr_wraps_keeps_carry_clear() { let c = exec(&[0x3D], |c| c.a = 0x00); assert_eq!(c.a, 0xFF); assert!(!c.get_flag(flags::CARRY)); assert!(c.get_flag(flags::SIGN)); }

#[test]
fn inr_m_touches_memory() {
    let (mut cpu, mut bus) = create_cpu(&[0x34]);
    cpu.set_hl(0x9000);
    bus.mem[0x9000] = 0x41;
    assert_eq!(cpu.step(&mut bus), 10);
    assert_eq!(bus.mem[0x9000], 0x42);
}

// ============ ADD / ADC ============

#[test] fn add_b() { let c = exec(&[0x80], |c| { c.a = 0x12; c.b = 0x34; }); assert_eq!(c.a, 0x46); assert!(!c.get_flag(flags::CARRY)); }
#[test] fn add_carry_out() { let c = exec(&[0x80], |c| { c.a = 0xF0; c.b = 0x20; }); assert_eq!(c.a, 0x10); assert!(c.get_flag(flags::CARRY)); }
#[test] fn add_half_carry() { let c = exec(&[0x80], |c| { c.a = 0x0F; c.b = 0x01; }); assert!(c.get_flag(flags::HALF_CARRY)); }
#[test] fn add_zero_result() { let c = exec(&[0x87], |c| c.a = 0x80); assert_eq!(c.a, 0); assert!(c.get_flag(flags::ZERO)); assert!(c.get_flag(flags::CARRY)); }
#[test] fn adc_uses_carry() { let c = exec(&[0x88], |c| { c.a = 0x10; c.b = 0x01; c.set_flag(flags::CARRY, true); }); assert_eq!(c.a, 0x12); }
#[test] fn adc_ff_plus_carry() { let c = exec(&[0x88], |c| { c.a = 0x01; c.b = 0xFF; c.set_flag(flags::CARRY, true); }); assert_eq!(c.a, 0x01); assert!(c.get_flag(flags::CARRY)); assert!(c.get_flag(flags::HALF_CARRY)); }
#[test] fn adi() { let c = exec(&[0xC6, 0x05], |c| c.a = 0x03); assert_eq!(c.a, 0x08); assert_eq!(c.pc, 2); }
#[test] fn aci() { let c = exec(&[0xCE, 0x05], |c| { c.a = 0x03; c.set_flag(flags::CARRY, true); }); assert_eq!(c.a, 0x09); }

// ============ SUB / SBB / CMP ============

#[test] fn sub_c() { let c = exec(&[0x91], |c| { c.a = 0x30; c.c = 0x10; }); assert_eq!(c.a, 0x20); assert!(!c.get_flag(flags::CARRY)); }
#[test] fn sub_borrow() { let c = exec(&[0x91], |c| { c.a = 0x10; c.c = 0x20; }); assert_eq!(c.a, 0xF0); assert!(c.get_flag(flags::CARRY)); assert!(c.get_flag(flags::SIGN)); }
#[test] fn sub_a_self_zero() { let c = exec(&[0x97], |c| c.a = 0x5A); assert_eq!(c.a, 0); assert!(c.get_flag(flags::ZERO)); assert!(!c.get_flag(flags::CARRY)); }
#[test] fn sbb_with_borrow() { let c = exec(&[0x98], |c| { c.a = 0x10; c.b = 0x0F; c.set_flag(flags::CARRY, true); }); assert_eq!(c.a, 0x00); assert!(c.get_flag(flags::ZERO)); }
#[test] fn sbb_ff_plus_borrow() { let c = exec(&[0x98], |c| { c.a = 0x00; c.b = 0xFF; c.set_flag(flags::CARRY, true); }); assert_eq!(c.a, 0x00); assert!(c.get_flag(flags::CARRY)); }
#[test] fn sui() { let c = exec(&[0xD6, 0x01], |c| c.a = 0x00); assert_eq!(c.a, 0xFF); assert!(c.get_flag(flags::CARRY)); }
#[test] fn cmp_equal() { let c = exec(&[0xB8], |c| { c.a = 0x42; c.b = 0x42; }); assert_eq!(c.a, 0x42); assert!(c.get_flag(flags::ZERO)); assert!(!c.get_flag(flags::CARRY)); }
#[test] fn cmp_less() { let c = exec(&[0xB8], |c| { c.a = 0x10; c.b = 0x42; }); assert_eq!(c.a, 0x10); assert!(c.get_flag(flags::CARRY)); }
#[test] fn cpi_greater() { let c = exec(&[0xFE, 0x05], |c| c.a = 0x10); assert!(!c.get_flag(flags::CARRY)); assert!(!c.get_flag(flags::ZERO)); }

// ============ Logic ============

#[test]
fn ana_clears_half_and_carry() {
    let c = exec(&[0xA0], |c| {
        c.a = 0xFF;
        c.b = 0x0F;
        c.f = flags::CARRY | flags::HALF_CARRY;
    });
    assert_eq!(c.a, 0x0F);
    assert!(!c.get_flag(flags::CARRY));
    assert!(!c.get_flag(flags::HALF_CARRY));
    assert!(c.get_flag(flags::PARITY));
}

#[test] fn xra_a_clears() { let c = exec(&[0xAF], |c| { c.a = 0x77; c.f = flags::CARRY; }); assert_eq!(c.a, 0); assert!(c.get_flag(flags::ZERO)); assert!(c.get_flag(flags::PARITY)); assert!(!c.get_flag(flags::CARRY)); }
#[test] fn ora_sets_sign() { let c = exec(&[0xB1], |c| { c.a = 0x01; c.c = 0x80; }); assert_eq!(c.a, 0x81); assert!(c.get_flag(flags::SIGN)); assert!(c.get_flag(flags::PARITY)); }
#[test] fn ora_even_parity() { let c = exec(&[0xB1], |c| { c.a = 0x01; c.c = 0x02; }); assert_eq!(c.a, 0x03); assert!(c.get_flag(flags::PARITY)); }
#[test] fn ani() { let c = exec(&[0xE6, 0x0F], |c| c.a = 0x3C); assert_eq!(c.a, 0x0C); }
#[test] fn xri() { let c = exec(&[0xEE, 0xFF], |c| c.a = 0x0F); assert_eq!(c.a, 0xF0); }
#[test] fn ori() { let c = exec(&[0xF6, 0x01], |c| c.a = 0x00); assert_eq!(c.a, 0x01); assert!(!c.get_flag(flags::PARITY)); }

// ============ Rotates and misc accumulator ============

#[test] fn rlc() { let c = exec(&[0x07], |c| c.a = 0x81); assert_eq!(c.a, 0x03); assert!(c.get_flag(flags::CARRY)); }
#[test] fn rrc() { let c = exec(&[0x0F], |c| c.a = 0x01); assert_eq!(c.a, 0x80); assert!(c.get_flag(flags::CARRY)); }
#[test] fn ral_through_carry() { let c = exec(&[0x17], |c| { c.a = 0x80; c.f = 0; }); assert_eq!(c.a, 0x00); assert!(c.get_flag(flags::CARRY)); }
#[test] fn ral_carry_in() { let c = exec(&[0x17], |c| { c.a = 0x01; c.f = flags::CARRY; }); assert_eq!(c.a, 0x03); assert!(!c.get_flag(flags::CARRY)); }
#[test] fn rar_carry_in() { let c = exec(&[0x1F], |c| { c.a = 0x02; c.f = flags::CARRY; }); assert_eq!(c.a, 0x81); assert!(!c.get_flag(flags::CARRY)); }
#[test] fn rotates_leave_zero_flag() { let c = exec(&[0x07], |c| { c.a = 0x00; c.f = flags::ZERO; }); assert!(c.get_flag(flags::ZERO)); }
#[test] fn cma() { let c = exec(&[0x2F], |c| { c.a = 0x51; c.f = 0; }); assert_eq!(c.a, 0xAE); assert_eq!(c.f, 0); }
#[test] fn stc() { let c = exec(&[0x37], |c| c.f = 0); assert!(c.get_flag(flags::CARRY)); }
#[test] fn cmc() { let c = exec(&[0x3F], |c| c.f = flags::CARRY); assert!(!c.get_flag(flags::CARRY)); }

// ============ 16-bit ============

#[test] fn dad_b() { let c = exec(&[0x09], |c| { c.set_hl(0x1234); c.set_bc(0x1111); }); assert_eq!(c.hl(), 0x2345); assert!(!c.get_flag(flags::CARRY)); }
#[test] fn dad_carry() { let c = exec(&[0x29], |c| c.set_hl(0x8000)); assert_eq!(c.hl(), 0x0000); assert!(c.get_flag(flags::CARRY)); }
#[test] fn dad_leaves_zero() { let c = exec(&[0x29], |c| { c.set_hl(0x8000); c.f = 0; }); assert!(!c.get_flag(flags::ZERO)); }
#[test] fn inx_wraps() { let c = exec(&[0x33], |c| c.sp = 0xFFFF); assert_eq!(c.sp, 0); }
#[test] fn dcx_no_flags() { let c = exec(&[0x1B], |c| { c.set_de(0); c.f = 0; }); assert_eq!(c.de(), 0xFFFF); assert_eq!(c.f, 0); }
