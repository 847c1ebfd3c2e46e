//! Floppy Drive
//!
//! Each track is a circular array of 15360 bit cells (76800 baud for one
//! 200 ms revolution). The drive has no controller of its own: data is
//! shifted straight through the TMS 5501 serial port, so the model works at
//! the level of serial frames on the track.
//!
//! Nothing is simulated bit by bit in real time:
//!
//! - Reading looks ahead for the next start bit, schedules one event for
//!   when that frame will have passed the head, and decodes it from the
//!   array when the event fires.
//! - Writing remembers when the write gate last went active and fills the
//!   elapsed span with gap (1) bits only when something forces a flush.
//! - A deselected drive keeps spinning until the motor timer runs out;
//!   rotational position is caught up from the timer's age.

pub mod image;

use crate::debugger::Debuggable;
use crate::scheduler::{Scheduler, TimerHandle};
use image::BITS_PER_TRACK;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use image::{DiskImage, DiskImageError};

/// Serial data rate to and from the disk.
pub const BIT_RATE: u64 = 76800;
/// Bits in one serial frame: start, 8 data, stop.
pub const FRAME_BITS: u64 = 10;
/// Spin-down delay after deselect, in hundredths of a second.
pub const MOTOR_TIMEOUT_CENTISECONDS: u64 = 68;
/// Last track position of a three-phase stepper.
pub const MAX_TRACK: u8 = 40;

/// Four-phase half-step winding sequence; forward steps the head in.
const HALF_STEP_SEQUENCE: [u8; 6] = [1, 3, 2, 6, 4, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveEvent {
    ReadByte,
    WriteDone,
    MotorOff,
}

/// A drive timer, tagged with the unit that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveTimer {
    pub unit: usize,
    pub event: DriveEvent,
}

/// What a drive event produced for the 5501.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutput {
    /// A byte passed under the head.
    Received { byte: u8, framing_error: bool },
    /// The last transmitted byte has been shifted out.
    TxDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    In,
    Out,
}

/// Stepper motor wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stepper {
    /// One winding at a time, phases 1, 2, 4
    ThreePhase,
    /// Half-stepping over four windings; two steps per track
    FourPhase,
}

impl Stepper {
    pub fn from_phases(phases: u8) -> Self {
        if phases == 4 {
            Stepper::FourPhase
        } else {
            Stepper::ThreePhase
        }
    }

    fn max_position(self) -> u8 {
        match self {
            Stepper::ThreePhase => MAX_TRACK,
            Stepper::FourPhase => MAX_TRACK * 2,
        }
    }

    /// Winding code the drive settles on. Codes that drive no valid
    /// pattern keep the previous phase.
    fn effective(self, code: u8, previous: u8) -> u8 {
        let valid = match self {
            Stepper::ThreePhase => matches!(code, 1 | 2 | 4),
            Stepper::FourPhase => HALF_STEP_SEQUENCE.contains(&code),
        };
        if valid {
            code
        } else {
            previous
        }
    }

    fn direction(self, from: u8, to: u8) -> Option<Step> {
        match self {
            Stepper::ThreePhase => match (from, to) {
                (1, 2) | (2, 4) | (4, 1) => Some(Step::In),
                (1, 4) | (2, 1) | (4, 2) => Some(Step::Out),
                _ => None,
            },
            Stepper::FourPhase => {
                let n = HALF_STEP_SEQUENCE.len();
                let a = HALF_STEP_SEQUENCE.iter().position(|&p| p == from)?;
                let b = HALF_STEP_SEQUENCE.iter().position(|&p| p == to)?;
                if (a + 1) % n == b {
                    Some(Step::In)
                } else if (b + 1) % n == a {
                    Some(Step::Out)
                } else {
                    None
                }
            }
        }
    }
}

/// Head, motor and write-gate state; what the debugger shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mechanics {
    pub selected: bool,
    pub write_gate: bool,
    pub phase: u8,
    /// Stepper position: the track for three-phase, half-tracks for
    /// four-phase motors
    pub step_position: u8,
    /// Rotational position in bits
    pub position: usize,
    /// Tick at which unwritten gap starts accumulating
    pub write_start: u64,
    /// Sub-bit remainder of the last gap flush, in tick * bit-rate units
    pub write_residue: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingRead {
    handle: TimerHandle,
    /// Bits from `position` to the start bit being read
    offset: usize,
}

pub struct Floppy {
    unit: usize,
    cpu_freq: u64,
    stepper: Stepper,
    disk: Option<DiskImage>,
    mech: Mechanics,
    read_timer: Option<PendingRead>,
    write_timer: Option<TimerHandle>,
    motor_timer: Option<TimerHandle>,
}

impl Floppy {
    pub fn new(unit: usize, cpu_freq: u64, stepper: Stepper) -> Self {
        Self {
            unit,
            cpu_freq,
            stepper,
            disk: None,
            mech: Mechanics {
                selected: false,
                write_gate: false,
                phase: 0,
                step_position: 0,
                position: 0,
                write_start: 0,
                write_residue: 0,
            },
            read_timer: None,
            write_timer: None,
            motor_timer: None,
        }
    }

    pub fn unit(&self) -> usize {
        self.unit
    }

    pub fn mechanics(&self) -> &Mechanics {
        &self.mech
    }

    /// Logical track under the head.
    pub fn track(&self) -> usize {
        match self.stepper {
            Stepper::ThreePhase => self.mech.step_position as usize,
            Stepper::FourPhase => (self.mech.step_position / 2) as usize,
        }
    }

    /// Rotational position in bits.
    pub fn position(&self) -> usize {
        self.mech.position
    }

    pub fn disk(&self) -> Option<&DiskImage> {
        self.disk.as_ref()
    }

    pub fn is_selected(&self) -> bool {
        self.mech.selected
    }

    /// Parallel input while this drive is selected. The drive has no
    /// status lines.
    pub fn status(&self) -> u8 {
        0x00
    }

    pub fn volume_label(&self) -> String {
        match &self.disk {
            Some(disk) => disk.volume_label(),
            None => "--empty--".to_string(),
        }
    }

    fn timer<E: Copy + From<DriveTimer>>(&self, event: DriveEvent) -> E {
        E::from(DriveTimer {
            unit: self.unit,
            event,
        })
    }

    fn bits_to_ticks(&self, bits: u64) -> u64 {
        bits * self.cpu_freq / BIT_RATE
    }

    fn ticks_to_bits(&self, ticks: u64) -> u64 {
        ticks * BIT_RATE / self.cpu_freq
    }

    fn advance(&mut self, bits: u64) {
        let bits = (bits % BITS_PER_TRACK as u64) as usize;
        self.mech.position = (self.mech.position + bits) % BITS_PER_TRACK;
    }

    // ========== Bit access ==========

    fn peek_bit(&self, offset: usize) -> u8 {
        let Some(disk) = &self.disk else { return 1 };
        let pos = (self.mech.position + offset) % BITS_PER_TRACK;
        (disk.tracks[self.track()][pos >> 3] >> (pos & 7)) & 1
    }

    /// Write one bit at the head and move on. A protected disk is left
    /// untouched but the head still moves.
    fn write_bit(&mut self, value: bool) {
        let track = self.track();
        let pos = self.mech.position;
        if let Some(disk) = self.disk.as_mut().filter(|d| !d.write_protected) {
            let mask = 1u8 << (pos & 7);
            if value {
                disk.tracks[track][pos >> 3] |= mask;
            } else {
                disk.tracks[track][pos >> 3] &= !mask;
            }
        }
        self.mech.position = (pos + 1) % BITS_PER_TRACK;
    }

    fn write_gap(&mut self, bits: u64) {
        if bits >= BITS_PER_TRACK as u64 {
            let track = self.track();
            if let Some(disk) = self.disk.as_mut().filter(|d| !d.write_protected) {
                disk.tracks[track].fill(0xFF);
            }
            self.advance(bits);
        } else {
            for _ in 0..bits {
                self.write_bit(true);
            }
        }
    }

    // ========== Read path ==========

    /// Bits from the head to the next 1 -> 0 transition.
    fn find_start_bit(&self) -> Option<usize> {
        let mut prev = self.peek_bit(BITS_PER_TRACK - 1);
        for n in 0..BITS_PER_TRACK {
            let bit = self.peek_bit(n);
            if prev == 1 && bit == 0 {
                return Some(n);
            }
            prev = bit;
        }
        None
    }

    fn schedule_read<E: Copy + From<DriveTimer>>(&mut self, sched: &mut Scheduler<E>) {
        if self.mech.write_gate || self.disk.is_none() {
            return;
        }
        let Some(offset) = self.find_start_bit() else {
            log::debug!("CD{}: no start bit on track {}", self.unit, self.track());
            return;
        };
        let ticks = self.bits_to_ticks(offset as u64 + FRAME_BITS);
        let handle = sched.one_shot(ticks, self.timer(DriveEvent::ReadByte), "CD:readByte");
        self.read_timer = Some(PendingRead { handle, offset });
    }

    /// Stop the read lookahead, folding the time it ran into the position.
    fn cancel_read<E: Copy>(&mut self, sched: &mut Scheduler<E>) {
        if let Some(read) = self.read_timer.take() {
            let age = sched.age(&read.handle);
            sched.cancel(read.handle);
            self.advance(self.ticks_to_bits(age));
        }
    }

    fn read_byte(&mut self, offset: usize) -> DriveOutput {
        self.advance(offset as u64);
        debug_assert_eq!(self.peek_bit(0), 0, "read event without a start bit");
        let mut byte = 0u8;
        for n in 0..8 {
            byte |= self.peek_bit(n + 1) << n;
        }
        let framing_error = self.peek_bit(9) == 0;
        self.advance(FRAME_BITS);
        log::trace!(
            "CD{}: read {:02X} at track {} bit {}",
            self.unit,
            byte,
            self.track(),
            self.mech.position
        );
        DriveOutput::Received {
            byte,
            framing_error,
        }
    }

    // ========== Write path ==========

    /// Fill the time since the last flush with gap bits. Leftover fractions
    /// of a bit carry over to the next flush.
    fn update_write_stream(&mut self, now: u64) {
        if self.disk.is_none() || !self.mech.write_gate || now <= self.mech.write_start {
            return;
        }
        let elapsed = now - self.mech.write_start;
        let total = elapsed * BIT_RATE + self.mech.write_residue;
        let bits = total / self.cpu_freq;
        self.mech.write_residue = total % self.cpu_freq;
        self.mech.write_start = now;
        if bits > 0 {
            log::trace!("CD{}: writing {} gap bits", self.unit, bits);
            self.write_gap(bits);
        }
    }

    /// The 5501 shifted out `value`. Writes the frame when the write gate
    /// is open and schedules the completion notice either way.
    pub fn tx_data<E: Copy + From<DriveTimer>>(&mut self, value: u8, sched: &mut Scheduler<E>) {
        let now = sched.now();
        self.update_write_stream(now);
        if self.mech.write_gate && self.disk.is_some() {
            log::trace!(
                "CD{}: write {:02X} at track {} bit {}",
                self.unit,
                value,
                self.track(),
                self.mech.position
            );
            self.write_bit(false);
            for n in 0..8 {
                self.write_bit((value >> n) & 1 != 0);
            }
            self.write_bit(true);
        }
        let ticks = self.bits_to_ticks(FRAME_BITS);
        self.mech.write_start = now + ticks;
        self.mech.write_residue = 0;
        if let Some(old) = self.write_timer.take() {
            log::warn!("CD{}: transmit before previous byte finished", self.unit);
            sched.cancel(old);
        }
        self.write_timer = Some(sched.one_shot(ticks, self.timer(DriveEvent::WriteDone), "CD:writeByte"));
    }

    // ========== Motor ==========

    fn cancel_motor<E: Copy>(&mut self, sched: &mut Scheduler<E>) {
        if let Some(handle) = self.motor_timer.take() {
            let age = sched.age(&handle);
            sched.cancel(handle);
            self.advance(self.ticks_to_bits(age));
        }
    }

    fn motor_ticks(&self) -> u64 {
        self.cpu_freq * MOTOR_TIMEOUT_CENTISECONDS / 100
    }

    // ========== Controller interface ==========

    /// Apply the parallel port lines: drive select, write gate and the
    /// stepper winding code.
    pub fn select<E: Copy + From<DriveTimer>>(
        &mut self,
        selected: bool,
        write: bool,
        phase_code: u8,
        sched: &mut Scheduler<E>,
    ) {
        let now = sched.now();

        if !selected {
            if self.mech.selected {
                log::debug!("CD{}: deselected", self.unit);
                self.update_write_stream(now);
                self.cancel_read(sched);
                if let Some(stale) = self.motor_timer.take() {
                    log::debug!("CD{}: dropping stale motor timer", self.unit);
                    sched.cancel(stale);
                }
                self.motor_timer =
                    Some(sched.one_shot(self.motor_ticks(), self.timer(DriveEvent::MotorOff), "CD:motor"));
                self.mech.selected = false;
                self.mech.write_gate = false;
            }
            return;
        }

        if !self.mech.selected {
            log::debug!("CD{}: selected", self.unit);
            self.cancel_motor(sched);
            self.mech.selected = true;
        }

        let phase = self.stepper.effective(phase_code & 7, self.mech.phase);
        if let Some(step) = self.stepper.direction(self.mech.phase, phase) {
            self.update_write_stream(now);
            let max = self.stepper.max_position();
            self.mech.step_position = match step {
                Step::In => (self.mech.step_position + 1).min(max),
                Step::Out => self.mech.step_position.saturating_sub(1),
            };
            self.cancel_read(sched);
            log::debug!("CD{}: step {:?} to track {}", self.unit, step, self.track());
        }
        self.mech.phase = phase;

        if self.mech.write_gate && !write {
            self.update_write_stream(now);
        }
        if write && !self.mech.write_gate {
            self.cancel_read(sched);
            self.mech.write_start = now;
            self.mech.write_residue = 0;
            log::debug!("CD{}: write gate on at track {}", self.unit, self.track());
        }
        self.mech.write_gate = write;

        if !write && self.read_timer.is_none() {
            self.schedule_read(sched);
        }
    }

    /// Handle one of this drive's timers.
    pub fn on_event<E: Copy + From<DriveTimer>>(
        &mut self,
        event: DriveEvent,
        sched: &mut Scheduler<E>,
    ) -> Option<DriveOutput> {
        match event {
            DriveEvent::ReadByte => {
                let read = self.read_timer.take()?;
                let out = self.read_byte(read.offset);
                self.schedule_read(sched);
                Some(out)
            }
            DriveEvent::WriteDone => {
                self.write_timer = None;
                Some(DriveOutput::TxDone)
            }
            DriveEvent::MotorOff => {
                let handle = self.motor_timer.take()?;
                let age = sched.age(&handle);
                self.advance(self.ticks_to_bits(age));
                log::debug!("CD{}: motor off", self.unit);
                None
            }
        }
    }

    fn cancel_timers<E: Copy>(&mut self, sched: &mut Scheduler<E>) {
        for handle in [self.motor_timer.take(), self.write_timer.take()].into_iter().flatten() {
            sched.cancel(handle);
        }
        if let Some(read) = self.read_timer.take() {
            sched.cancel(read.handle);
        }
    }

    pub fn reset<E: Copy>(&mut self, sched: &mut Scheduler<E>) {
        self.cancel_timers(sched);
        self.mech.selected = false;
        self.mech.write_gate = false;
        self.mech.step_position = 0;
        self.mech.position = 0;
    }

    // ========== Media ==========

    /// Mount `disk`, replacing whatever was in the drive. An image whose
    /// track table doesn't fit the drive is refused and the drive is left
    /// as it was.
    pub fn insert<E: Copy + From<DriveTimer>>(
        &mut self,
        disk: DiskImage,
        sched: &mut Scheduler<E>,
    ) -> Result<(), DiskImageError> {
        disk.check_geometry()?;
        self.remove(sched);
        log::info!(
            "CD{}: inserted '{}'{}",
            self.unit,
            disk.volume_label(),
            if disk.write_protected { " (write protected)" } else { "" }
        );
        self.disk = Some(disk);
        if self.mech.selected && !self.mech.write_gate {
            self.schedule_read(sched);
        }
        Ok(())
    }

    pub fn remove<E: Copy>(&mut self, sched: &mut Scheduler<E>) -> Option<DiskImage> {
        self.update_write_stream(sched.now());
        self.cancel_read(sched);
        self.cancel_motor(sched);
        let disk = self.disk.take();
        if disk.is_some() {
            log::info!("CD{}: ejected", self.unit);
        }
        disk
    }

    /// Current contents in the text image form, flushing any pending gap.
    pub fn save<E: Copy>(&mut self, sched: &mut Scheduler<E>) -> Option<String> {
        self.update_write_stream(sched.now());
        self.disk.as_ref().map(DiskImage::to_text)
    }

    // ========== Restore ==========

    /// Drop every pending timer and rebuild what the current mechanics
    /// call for: a read lookahead when selected with the gate closed, a
    /// fresh write stream when the gate is open. A deselected drive comes
    /// back with its motor stopped.
    pub fn rearm<E: Copy + From<DriveTimer>>(&mut self, sched: &mut Scheduler<E>) {
        self.cancel_timers(sched);
        self.mech.step_position = self.mech.step_position.min(self.stepper.max_position());
        self.mech.position %= BITS_PER_TRACK;
        self.mech.write_start = sched.now();
        self.mech.write_residue = 0;
        if !self.mech.selected {
            self.mech.write_gate = false;
        } else if !self.mech.write_gate {
            self.schedule_read(sched);
        }
        log::debug!(
            "CD{}: rearmed at track {} bit {}{}",
            self.unit,
            self.track(),
            self.mech.position,
            if self.read_timer.is_some() { ", reading" } else { "" }
        );
    }

    /// Load a mechanics snapshot and bring the timers in line with it.
    pub fn restore_state<E: Copy + From<DriveTimer>>(&mut self, state: &Value, sched: &mut Scheduler<E>) {
        self.write_state(state);
        self.rearm(sched);
    }
}

impl Debuggable for Floppy {
    fn read_state(&self) -> Value {
        serde_json::to_value(&self.mech).unwrap_or(Value::Null)
    }

    fn write_state(&mut self, state: &Value) {
        match serde_json::from_value(state.clone()) {
            Ok(mech) => self.mech = mech,
            Err(e) => log::warn!("CD{}: ignoring bad state: {}", self.unit, e),
        }
    }
}
