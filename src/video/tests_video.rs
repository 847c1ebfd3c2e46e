use super::*;

const CPU_FREQ: u64 = 1_996_800;

#[test]
fn test_scroll_register_wraps() {
    let mut crtc = Smc5027::new(CPU_FREQ);
    assert_eq!(crtc.first_display_row(), 1);
    crtc.write(0x6, 30);
    crtc.write(CMD_SCROLL, 0x00);
    assert_eq!(crtc.read(0x6), 31);
    assert_eq!(crtc.first_display_row(), 0);
    crtc.write(CMD_SCROLL, 0x00);
    assert_eq!(crtc.read(0x6), 0);
}

#[test]
fn test_cursor_loads() {
    let mut crtc = Smc5027::new(CPU_FREQ);
    crtc.write(CMD_LOAD_CURSOR_X, 63);
    crtc.write(CMD_LOAD_CURSOR_Y, 0xFF);
    assert_eq!(crtc.cursor_x(), 63);
    assert_eq!(crtc.cursor_y(), 0x3F);
    assert_eq!(crtc.read(0x9), 63);
    assert_eq!(crtc.read(0x8), 0x3F);
}

#[test]
fn test_command_registers_read_zero() {
    let mut crtc = Smc5027::new(CPU_FREQ);
    for reg in [0x7, 0xA, 0xE, 0xF] {
        crtc.write(reg, 0x55);
        assert_eq!(crtc.read(reg), 0, "reg {:X}", reg);
    }
    crtc.write(0x2, 0x55);
    assert_eq!(crtc.read(0x2), 0x55);
}

#[test]
fn test_reset_clears_registers() {
    let mut crtc = Smc5027::new(CPU_FREQ);
    crtc.write(CMD_LOAD_CURSOR_X, 5);
    crtc.write(CMD_SCROLL, 0);
    crtc.reset();
    assert_eq!(crtc.cursor_x(), 0);
    assert_eq!(crtc.first_display_row(), 1);
}

#[test]
fn test_hblank_durations() {
    let crtc = Smc5027::new(CPU_FREQ);
    assert_eq!(crtc.blank_ticks, 9);
    assert_eq!(crtc.active_ticks, 117);
    assert_eq!(crtc.line_ticks(), 126);
}

#[test]
fn test_hblank_chain_toggles() {
    let mut crtc = Smc5027::new(CPU_FREQ);
    let mut sched: Scheduler<()> = Scheduler::new();
    crtc.start(&mut sched, ());
    let mut edges = Vec::new();
    for _ in 0..260 {
        sched.tick(1, &mut |s: &mut Scheduler<()>, _: ()| {
            crtc.on_hblank(s, ());
            edges.push((s.now(), crtc.in_hblank()));
        });
    }
    assert_eq!(edges, vec![(117, true), (126, false), (243, true), (252, false)]);
    assert_eq!(sched.active_count(), 1);
}

#[test]
fn test_restart_replaces_chain() {
    let mut crtc = Smc5027::new(CPU_FREQ);
    let mut sched: Scheduler<()> = Scheduler::new();
    crtc.start(&mut sched, ());
    crtc.start(&mut sched, ());
    assert_eq!(sched.active_count(), 1);
    assert!(!crtc.in_hblank());
}

#[test]
fn test_state_roundtrip() {
    let mut crtc = Smc5027::new(CPU_FREQ);
    crtc.write(CMD_LOAD_CURSOR_Y, 12);
    let state = crtc.read_state();
    let mut other = Smc5027::new(CPU_FREQ);
    other.write_state(&state);
    assert_eq!(other.cursor_y(), 12);
}

#[test]
fn test_resume_follows_restored_blanking() {
    let mut crtc = Smc5027::new(CPU_FREQ);
    let mut sched: Scheduler<()> = Scheduler::new();
    crtc.start(&mut sched, ());

    // snapshot taken in the middle of a blanking interval
    let mut source = Smc5027::new(CPU_FREQ);
    source.hblank = true;
    crtc.write_state(&source.read_state());
    crtc.resume(&mut sched, ());
    assert_eq!(sched.active_count(), 1);

    let mut edges = Vec::new();
    for _ in 0..130 {
        sched.tick(1, &mut |s: &mut Scheduler<()>, _: ()| {
            crtc.on_hblank(s, ());
            edges.push((s.now(), crtc.in_hblank()));
        });
    }
    assert_eq!(edges, vec![(9, false), (126, true)]);
}
