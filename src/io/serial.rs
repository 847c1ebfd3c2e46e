//! J-2 serial port
//!
//! Bytes the 5501 shifts out while the keyboard is selected go to the rear
//! RS-232 connector. The port collects them for the host and times each
//! frame at the programmed baud rate so the transmitter sees realistic
//! pacing. With the unused select code the line is undriven: the byte is
//! timed the same way and dropped.

use crate::scheduler::{Scheduler, TimerHandle};

/// Bytes held for the host before the oldest are discarded.
pub const MAX_OUTPUT: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct SerialPort {
    output: Vec<u8>,
    busy: Option<TimerHandle>,
}

/// Ticks to shift one frame of `bits` at `baud`.
pub fn frame_ticks(cpu_freq: u64, baud: u32, bits: u32) -> u64 {
    bits as u64 * cpu_freq / baud.max(1) as u64
}

impl SerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start shifting `byte`; `event` fires when the frame is out.
    pub fn transmit<E: Copy>(
        &mut self,
        byte: u8,
        connected: bool,
        ticks: u64,
        sched: &mut Scheduler<E>,
        event: E,
    ) {
        if let Some(old) = self.busy.take() {
            log::warn!("J-2: transmit before previous byte finished");
            sched.cancel(old);
        }
        if connected {
            log::trace!("J-2: send {:02X}", byte);
            if self.output.len() >= MAX_OUTPUT {
                let discard = MAX_OUTPUT / 4;
                log::warn!("J-2: output not drained, discarding oldest {} bytes", discard);
                self.output.drain(..discard);
            }
            self.output.push(byte);
        } else {
            log::trace!("J-2: dropped {:02X}, no device selected", byte);
        }
        self.busy = Some(sched.one_shot(ticks, event, "J-2:tx"));
    }

    pub fn on_tx_done(&mut self) {
        self.busy = None;
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Drain everything sent so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn reset<E: Copy>(&mut self, sched: &mut Scheduler<E>) {
        if let Some(handle) = self.busy.take() {
            sched.cancel(handle);
        }
    }
}
