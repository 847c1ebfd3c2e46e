//! Whole-machine tests: bus decoding, device wiring and resets

use super::board::HBLANK_WAIT_GRANULARITY;
use super::*;
use crate::floppy::image::BITS_PER_TRACK;
use crate::io::autotyper::{LINE_BUFFER, LINE_DONE_FLAG};
use crate::io::{modifier, TypingMode};
use crate::memory::{CpuBus, IoInterface};
use crate::tms5501::{irq, status};
use crate::video::TextScreen;

const CPU_FREQ: u64 = 1_996_800;
const FRAME_TICKS: u64 = CPU_FREQ / 30;

fn machine() -> Machine {
    Machine::new(&Config::default())
}

/// Place `code` in DRAM and point the CPU at it.
fn load_program(m: &mut Machine, at: u16, code: &[u8]) {
    for (i, &b) in code.iter().enumerate() {
        m.board.memory.write_unsafe(at + i as u16, b);
    }
    m.cpu.pc = at;
}

/// Lay a serial frame (start, 8 data bits LSB first, stop) onto a track.
fn put_frame(disk: &mut DiskImage, track: usize, at: usize, byte: u8) {
    let bits = std::iter::once(false)
        .chain((0..8).map(|n| (byte >> n) & 1 != 0))
        .chain(std::iter::once(true));
    for (i, bit) in bits.enumerate() {
        let pos = (at + i) % BITS_PER_TRACK;
        let mask = 1u8 << (pos & 7);
        if bit {
            disk.tracks[track][pos >> 3] |= mask;
        } else {
            disk.tracks[track][pos >> 3] &= !mask;
        }
    }
}

// ============ Memory map ============

#[test]
fn test_rom_is_read_only() {
    let mut m = machine();
    m.load_rom(&[0x3E, 0x42]);
    m.board.write_byte(0x0001, 0x99);
    assert_eq!(m.board.peek_byte(0x0001), 0x42);
}

#[test]
fn test_fast_window_aliases_slow_window() {
    let mut m = machine();
    m.board.write_byte(0x6010, 0x41);
    assert_eq!(m.board.peek_byte(0x7010), 0x41);
    assert_eq!(m.board.video_ram()[0x10], 0x41);
}

#[test]
fn test_fast_window_never_waits() {
    let mut m = machine();
    m.board.read_byte(0x6000);
    m.board.write_byte(0x6000, 0x20);
    assert_eq!(m.now(), 0);
}

#[test]
fn test_slow_window_waits_for_hblank() {
    let mut m = machine();
    assert!(!m.devices().crtc.in_hblank());
    m.board.read_byte(0x7000);
    assert!(m.devices().crtc.in_hblank());
    // active display is 117 ticks, polled every 4
    assert_eq!(m.now(), 120);

    // already blanking: no further wait
    m.board.write_byte(0x7002, 0x20);
    assert_eq!(m.now(), 120);
}

#[test]
fn test_hblank_wait_is_bounded() {
    let config = Config {
        hblank_wait_limit: 3,
        ..Config::default()
    };
    let mut m = Machine::new(&config);
    m.board.read_byte(0x7000);
    assert_eq!(m.now(), 3 * HBLANK_WAIT_GRANULARITY);
}

#[test]
fn test_dram_round_trip() {
    let mut m = machine();
    m.board.write_byte(0xFFFF, 0x5A);
    assert_eq!(m.board.read_byte(0xFFFF), 0x5A);
}

// ============ Ports ============

#[test]
fn test_unmapped_port_reads_port_number() {
    let mut m = machine();
    assert_eq!(m.board.read_port(0x42), 0x42);
    assert_eq!(m.board.read_port(0xFF), 0xFF);
    // the 5027 is write only
    assert_eq!(m.board.read_port(0x66), 0x66);
}

#[test]
fn test_uart_is_mirrored() {
    let mut m = machine();
    m.board.write_port(0x18, 0x5A);
    assert_eq!(m.board.read_port(0x08), 0x5A);
}

#[test]
fn test_crtc_write_through_port() {
    let mut m = machine();
    m.board.write_port(0x69, 12);
    m.board.write_port(0x68, 5);
    assert_eq!(m.devices().crtc.cursor_x(), 12);
    assert_eq!(m.devices().crtc.cursor_y(), 5);
}

#[test]
fn test_keyboard_row_on_parallel_input() {
    let mut m = machine();
    m.keyboard().press(3, 2);
    m.board.write_port(0x07, 0x03);
    assert_eq!(m.board.read_port(0x01), !0x04);
    m.board.write_port(0x07, 0x04);
    assert_eq!(m.board.read_port(0x01), 0xFF);
}

#[test]
fn test_modifier_row_on_parallel_input() {
    let mut m = machine();
    m.keyboard().set_modifiers(modifier::SHIFT, true);
    m.board.write_port(0x07, 0x80);
    assert_eq!(m.board.read_port(0x01), !modifier::SHIFT);
}

#[test]
fn test_unconnected_parallel_input_reads_zero() {
    let mut m = machine();
    m.board.write_port(0x07, 0x30);
    assert_eq!(m.board.read_port(0x01), 0x00);
}

// ============ Interrupts ============

#[test]
fn test_timer_interrupt_vectors_cpu() {
    let mut m = machine();
    let code = [
        0x31, 0x00, 0xFF, // LXI SP,FF00
        0x3E, irq::TIMER1, // MVI A,01
        0xD3, 0x08, // OUT 08 (mask)
        0xD3, 0x09, // OUT 09 (timer 1 = 64us)
        0xFB, // EI
        0xC3, 0x0A, 0x80, // JMP 800A
    ];
    load_program(&mut m, 0x8000, &code);
    m.run_ticks(1000);

    // RST 0 pushed the loop address and ROM (all NOPs) is running
    assert!(m.cpu.pc < 0x6000);
    assert_eq!(m.board.peek_byte(0xFEFE), 0x0A);
    assert_eq!(m.board.peek_byte(0xFEFF), 0x80);
    assert!(!m.cpu.inte);
}

#[test]
fn test_masked_interrupt_not_taken() {
    let mut m = machine();
    let code = [
        0x3E, 0x01, // MVI A,01
        0xD3, 0x09, // OUT 09
        0xFB, // EI
        0xC3, 0x05, 0x80, // JMP 8005
    ];
    load_program(&mut m, 0x8000, &code);
    m.run_ticks(1000);
    assert!(m.cpu.pc >= 0x8000);
}

#[test]
fn test_sensor_pulses_every_sixteen_frames() {
    let mut m = machine();
    m.board.write_port(0x08, irq::SENSOR);
    m.board.tick(FRAME_TICKS * 15);
    assert!(!m.devices().uart.irq_line());
    m.board.tick(FRAME_TICKS);
    assert!(m.devices().uart.irq_line());
    assert_eq!(m.board.acknowledge_interrupt(), 0xD7);
}

#[test]
fn test_acknowledge_with_nothing_pending() {
    let mut m = machine();
    assert_eq!(m.board.acknowledge_interrupt(), 0xFF);
}

// ============ Floppy ============

#[test]
fn test_drive_byte_reaches_uart() {
    let mut m = machine();
    let mut disk = DiskImage::blank();
    put_frame(&mut disk, 0, 100, 0xA5);
    m.insert_disk(0, disk).unwrap();
    m.board.write_port(0x07, 0x10);
    assert!(m.devices().drives[0].is_selected());
    assert!(!m.devices().drives[1].is_selected());

    m.board.tick(110 * 26 + 1);
    let st = m.board.read_port(0x03);
    assert_ne!(st & status::RX_FULL, 0);
    assert_eq!(m.board.read_port(0x00), 0xA5);
    assert_eq!(m.board.read_port(0x03) & status::RX_FULL, 0);
}

#[test]
fn test_drive_status_on_parallel_input() {
    let mut m = machine();
    m.board.write_port(0x07, 0x20);
    assert_eq!(m.board.read_port(0x01), 0x00);
}

#[test]
fn test_deselect_stops_drive() {
    let mut m = machine();
    m.insert_disk(1, DiskImage::blank()).unwrap();
    m.board.write_port(0x07, 0x20);
    assert!(m.devices().drives[1].is_selected());
    m.board.write_port(0x07, 0x00);
    assert!(!m.devices().drives[1].is_selected());
}

#[test]
fn test_insert_bad_text_leaves_drive() {
    let mut m = machine();
    m.insert_disk(0, DiskImage::blank()).unwrap();
    assert!(m.insert_disk_text(0, "not a disk image").is_err());
    assert!(m.devices().drives[0].disk().is_some());
}

#[test]
fn test_eject_and_label() {
    let mut m = machine();
    assert_eq!(m.volume_label(1).as_deref(), Some("--empty--"));
    m.insert_disk(1, DiskImage::blank()).unwrap();
    assert!(m.eject_disk(1).is_some());
    assert!(m.eject_disk(1).is_none());
    assert!(m.save_disk(1).is_none());
}

#[test]
fn test_media_calls_on_missing_drive() {
    let mut m = machine();
    assert_eq!(
        m.insert_disk(2, DiskImage::blank()),
        Err(MediaError::NoSuchDrive(2))
    );
    assert_eq!(m.insert_disk_text(7, "whatever"), Err(MediaError::NoSuchDrive(7)));
    assert!(m.eject_disk(2).is_none());
    assert!(m.save_disk(2).is_none());
    assert!(m.volume_label(2).is_none());
    assert_eq!(
        MediaError::NoSuchDrive(2).to_string(),
        "no drive CD2 (the machine has 2)"
    );
}

#[test]
fn test_misshapen_image_is_refused() {
    let mut m = machine();
    let mut short = DiskImage::blank();
    short.tracks.truncate(12);
    assert_eq!(
        m.insert_disk(0, short),
        Err(MediaError::Image(DiskImageError::WrongTrackCount { found: 12 }))
    );
    let mut ragged = DiskImage::blank();
    ragged.tracks[5].pop();
    assert!(matches!(
        m.insert_disk(0, ragged),
        Err(MediaError::Image(DiskImageError::WrongTrackLength { track: 5, .. }))
    ));
    assert!(m.devices().drives[0].disk().is_none());

    // selecting and stepping the empty drive is still safe
    m.board.write_port(0x07, 0x10);
    m.run_ticks(10_000);
    assert!(m.fault().is_none());
}

// ============ Serial ============

#[test]
fn test_j2_output_is_collected() {
    let mut m = machine();
    m.board.write_port(0x06, b'H');
    m.board.write_port(0x06, b'I');
    assert_eq!(m.serial_output(), b"H".to_vec());

    // 9600 baud, 10 bit frames
    m.board.tick(2079);
    assert!(m.serial_output().is_empty());
    m.board.tick(1);
    assert_eq!(m.serial_output(), b"I".to_vec());
    assert_eq!(m.devices().uart.tx_pending(), 1);
    m.board.tick(2080);
    assert_eq!(m.devices().uart.tx_pending(), 0);
}

#[test]
fn test_unconnected_transmit_is_dropped() {
    let mut m = machine();
    m.board.write_port(0x07, 0x30);
    m.board.write_port(0x06, b'X');
    m.board.tick(2080);
    assert!(m.serial_output().is_empty());
    assert_eq!(m.devices().uart.tx_pending(), 0);
}

#[test]
fn test_serial_receive() {
    let mut m = machine();
    m.serial_receive(0x41);
    assert_ne!(m.board.read_port(0x03) & status::RX_FULL, 0);
    assert_eq!(m.board.read_port(0x00), 0x41);
}

// ============ Autotype ============

fn basic_line(m: &Machine) -> String {
    let bytes: Vec<u8> = (LINE_BUFFER + 1..)
        .map(|a| m.board.peek_byte(a))
        .take_while(|&b| b != 0)
        .collect();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn test_autotype_keys_reach_parallel_input() {
    let config = Config {
        autotype: TypingMode::Keys,
        ..Config::default()
    };
    let mut m = Machine::new(&config);
    m.autotype("A").unwrap();
    m.board.tick(FRAME_TICKS);
    m.board.write_port(0x07, 14);
    assert_eq!(m.board.read_port(0x01), !0x02);
    m.board.write_port(0x07, 0x80);
    assert_eq!(m.board.read_port(0x01), !modifier::SHIFT);

    m.board.tick(FRAME_TICKS);
    assert!(!m.devices().keyboard.any_pressed());
    assert!(!m.is_autotyping());
}

#[test]
fn test_autotype_lines_fill_basic_buffer() {
    let mut m = machine();
    m.autotype("PRINT 1\r\nRUN\r\n").unwrap();
    m.board.tick(FRAME_TICKS);
    assert_eq!(basic_line(&m), "PRINT 1");
    assert_eq!(m.board.peek_byte(LINE_DONE_FLAG), 0x0D);

    m.board.tick(FRAME_TICKS);
    assert_eq!(basic_line(&m), "PRINT 1");
    assert!(m.autotype_progress() < 100.0);

    m.board.write_byte(LINE_DONE_FLAG, 0);
    m.board.tick(FRAME_TICKS);
    assert_eq!(basic_line(&m), "RUN");
    assert!(!m.is_autotyping());
}

#[test]
fn test_reset_marker_cold_starts_and_keeps_typing() {
    let mut m = machine();
    m.board.write_byte(POWER_UP_FLAG, 0x97);
    load_program(&mut m, 0x8000, &[0xC3, 0x00, 0x80]); // JMP 8000
    m.autotype("[[[RESET]]]\nRUN\n").unwrap();
    m.run_ticks(FRAME_TICKS + 100);
    assert_eq!(m.board.peek_byte(POWER_UP_FLAG), 0x00);
    assert!(m.cpu.pc < 0x6000);
    assert!(m.is_autotyping());
}

#[test]
fn test_warm_reset_stops_autotype() {
    let mut m = machine();
    m.autotype("RUN\n").unwrap();
    m.warm_reset();
    assert!(!m.is_autotyping());
}

#[test]
fn test_cancel_autotype_releases_key() {
    let config = Config {
        autotype: TypingMode::Keys,
        ..Config::default()
    };
    let mut m = Machine::new(&config);
    m.autotype("LIST\r").unwrap();
    m.board.tick(FRAME_TICKS);
    assert!(m.devices().keyboard.any_pressed());
    m.cancel_autotype();
    assert!(!m.devices().keyboard.any_pressed());
    m.board.tick(FRAME_TICKS * 3);
    assert!(!m.devices().keyboard.any_pressed());
}

// ============ Resets ============

#[test]
fn test_hard_reset_clears_power_up_flag() {
    let mut m = machine();
    m.board.write_byte(POWER_UP_FLAG, 0x97);
    m.warm_reset();
    assert_eq!(m.board.peek_byte(POWER_UP_FLAG), 0x97);
    m.hard_reset();
    assert_eq!(m.board.peek_byte(POWER_UP_FLAG), 0x00);
    assert_eq!(POWER_UP_FLAG, 0x81B7);
}

#[test]
fn test_warm_reset_clears_chips() {
    let mut m = machine();
    m.cpu.pc = 0x1234;
    m.board.write_port(0x08, 0xFF);
    m.board.write_port(0x07, 0x10);
    m.keyboard().press(0, 0);
    m.board.write_byte(0x9000, 0x77);
    m.warm_reset();
    assert_eq!(m.cpu.pc, 0);
    assert_eq!(m.board.read_port(0x08), 0x00);
    assert!(!m.devices().drives[0].is_selected());
    assert!(!m.devices().keyboard.any_pressed());
    assert_eq!(m.board.peek_byte(0x9000), 0x77);
}

// ============ Running ============

#[test]
fn test_run_ticks_overshoots_by_one_instruction() {
    let mut m = machine();
    let ran = m.run_ticks(1001);
    // ROM is all NOPs at 4 ticks each
    assert_eq!(ran, 1004);
    assert_eq!(m.now(), 1004);
    assert!(m.fault().is_none());
}

#[test]
fn test_run_timeslice() {
    let mut m = machine();
    let ran = m.run_timeslice();
    assert!(ran >= Config::default().slice_ticks());
}

// ============ Display ============

#[test]
fn test_render_text_screen() {
    let mut m = machine();
    m.board.write_byte(0x6000, b'H');
    m.board.write_byte(0x6001, 0x07);
    m.board.write_byte(0x6002, b'I');
    m.board.write_byte(0x6003, 0x07);
    // last display row 31 puts row 0 on top
    m.board.write_port(0x66, 31);
    let mut screen = TextScreen::new();
    m.render(&mut screen);
    assert_eq!(screen.line(0), "HI");
    assert_eq!(m.devices().display.dirty_cells(), 0);
}

#[test]
fn test_render_follows_scroll() {
    let mut m = machine();
    m.board.write_byte(0x6080, b'Z');
    m.board.write_byte(0x6081, 0x07);
    m.board.write_port(0x66, 31);
    let mut screen = TextScreen::new();
    m.render(&mut screen);
    assert_eq!(screen.line(0), "");
    assert_eq!(screen.line(1), "Z");

    // scroll command: row 1 moves to the top
    m.board.write_port(0x6B, 0);
    m.render(&mut screen);
    assert_eq!(screen.line(0), "Z");
}

// ============ State ============

#[test]
fn test_state_round_trip() {
    let mut m = machine();
    m.cpu.pc = 0x8123;
    m.cpu.a = 0x42;
    m.board.write_port(0x08, 0x3C);
    let state = m.read_state();
    assert_eq!(state["ticks"], 0);

    let mut other = machine();
    other.write_state(&state);
    assert_eq!(other.cpu.pc, 0x8123);
    assert_eq!(other.cpu.a, 0x42);
    assert_eq!(other.board.read_port(0x08), 0x3C);
    assert_eq!(other.devices().display.dirty_cells(), 32 * 64);
}

#[test]
fn test_restore_rebuilds_timers() {
    let mut m = machine();
    m.insert_disk(0, DiskImage::blank()).unwrap();
    // select CD0, take the snapshot, then deselect so its motor timer runs
    m.board.write_port(0x07, 0x10);
    let state = m.read_state();
    m.board.write_port(0x07, 0x00);
    let before = m.board.scheduler.active_count();

    m.write_state(&state);
    assert!(m.devices().drives[0].is_selected());
    // motor timer dropped; one hblank chain, vsync and the 5501 prescaler
    assert_eq!(m.board.scheduler.active_count(), before - 1);

    // deselecting after the restore arms a fresh motor timer
    m.board.write_port(0x07, 0x00);
    assert!(!m.devices().drives[0].is_selected());
    assert_eq!(m.board.scheduler.active_count(), before);
}

#[test]
fn test_restore_keeps_hblank_running() {
    let mut m = machine();
    let state = m.read_state();
    m.write_state(&state);
    m.write_state(&state);
    let mut edges = 0;
    let mut was = m.devices().crtc.in_hblank();
    for _ in 0..1000 {
        m.board.tick(1);
        if m.devices().crtc.in_hblank() != was {
            was = !was;
            edges += 1;
        }
    }
    // a single chain: blank at 117 + 126k, visible again at 126k
    assert_eq!(edges, 15);
}
