//! Real-time pacing
//!
//! Runs the machine one timeslice at a time. In realtime mode the runner
//! sleeps out whatever is left of each slice; either way it keeps a
//! rolling estimate of how much of the host's time emulation consumes.
//! While the autotyper runs, each slice is stretched to soak up the idle
//! host time, and those slices stay out of the estimate.

use super::Machine;
use crate::config::{Config, Pacing};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Slices averaged for the busy estimate.
pub const BUSY_WINDOW: usize = 15;
/// Upper bound on the slice stretch while autotyping.
pub const MAX_AUTOTYPE_BOOST: f64 = 8.0;

pub struct Runner {
    pacing: Pacing,
    slice: Duration,
    history: VecDeque<Duration>,
    busy_fraction: f64,
    deadline: Option<Instant>,
}

impl Runner {
    pub fn new(config: &Config) -> Self {
        Self {
            pacing: config.pacing,
            slice: Duration::from_millis(config.timeslice_ms),
            history: VecDeque::with_capacity(BUSY_WINDOW),
            busy_fraction: 1.0,
            deadline: None,
        }
    }

    /// Portion of wall-clock time spent emulating, averaged over the last
    /// [`BUSY_WINDOW`] slices. Reads 1.0 until the window has filled.
    pub fn busy_fraction(&self) -> f64 {
        self.busy_fraction
    }

    fn record(&mut self, elapsed: Duration) {
        if self.history.len() == BUSY_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(elapsed);
        if self.history.len() == BUSY_WINDOW {
            let total: Duration = self.history.iter().sum();
            self.busy_fraction = total.as_secs_f64() / (self.slice.as_secs_f64() * BUSY_WINDOW as f64);
        }
    }

    /// Run one slice, then wait for its wall-clock end when pacing in
    /// real time. Returns the ticks run.
    pub fn run_slice(&mut self, machine: &mut Machine) -> u64 {
        let start = Instant::now();
        let ticks = if machine.is_autotyping() {
            // the busy estimate reads about half the real load
            let boost = (2.0 / self.busy_fraction).clamp(1.0, MAX_AUTOTYPE_BOOST);
            machine.run_ticks((machine.slice_ticks() as f64 * boost) as u64)
        } else {
            let ticks = machine.run_timeslice();
            self.record(start.elapsed());
            ticks
        };

        if self.pacing == Pacing::Realtime {
            let deadline = self.deadline.unwrap_or(start) + self.slice;
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
                self.deadline = Some(deadline);
            } else {
                // fell behind; don't try to catch up
                log::trace!("runner: slice overran by {:?}", now - deadline);
                self.deadline = Some(now);
            }
        }
        ticks
    }

    /// Run slices until `emulated` worth of machine time has passed.
    pub fn run_for(&mut self, machine: &mut Machine, emulated: Duration) -> u64 {
        let ticks = (emulated.as_secs_f64() * machine.cpu_freq() as f64) as u64;
        let target = machine.now() + ticks;
        let start = machine.now();
        while machine.now() < target {
            self.run_slice(machine);
        }
        machine.now() - start
    }
}
