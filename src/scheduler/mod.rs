//! Tick Scheduler
//!
//! The scheduler owns the machine's tick counter. Devices register one-shot
//! or periodic timers against it; `tick()` advances the clock and delivers
//! every due event to an [`EventSink`] before returning.
//!
//! Timers are stored in a slot table with a free list of reclaimed slots.
//! Each registration also gets a serial number, so a [`TimerHandle`] that
//! outlives its timer can never cancel whatever later reuses the slot.

/// Receives events as their timers come due.
///
/// The sink gets the scheduler back so a callback can register or cancel
/// timers while `tick()` is running.
pub trait EventSink<E> {
    fn on_event(&mut self, sched: &mut Scheduler<E>, event: E);
}

impl<E, F> EventSink<E> for F
where
    F: FnMut(&mut Scheduler<E>, E),
{
    fn on_event(&mut self, sched: &mut Scheduler<E>, event: E) {
        self(sched, event)
    }
}

/// Weak reference to a registered timer.
///
/// The handle does not own the entry; it is only good for cancelling the
/// timer and asking how long ago it was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    slot: usize,
    serial: u64,
    start: u64,
}

impl TimerHandle {
    /// Tick count at registration.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Ticks elapsed since registration, as of `now`.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.start)
    }
}

#[derive(Debug, Clone)]
struct Timer<E> {
    serial: u64,
    start: u64,
    periodic: bool,
    interval: u64,
    phase: u64,
    event: E,
    label: &'static str,
}

#[derive(Debug, Clone)]
pub struct Scheduler<E> {
    now: u64,
    timers: Vec<Option<Timer<E>>>,
    free: Vec<usize>,
    next_serial: u64,
}

impl<E: Copy> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Copy> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: 0,
            timers: Vec::new(),
            free: Vec::new(),
            next_serial: 0,
        }
    }

    /// Current tick count.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Ticks elapsed since `handle` was registered.
    pub fn age(&self, handle: &TimerHandle) -> u64 {
        handle.age(self.now)
    }

    /// Number of live timers.
    pub fn active_count(&self) -> usize {
        self.timers.iter().filter(|t| t.is_some()).count()
    }

    /// Fire `event` once, after `delta` more ticks have been delivered.
    pub fn one_shot(&mut self, delta: u64, event: E, label: &'static str) -> TimerHandle {
        self.insert(false, delta, event, label)
    }

    /// Fire `event` every `interval` ticks. Leftover ticks roll into the
    /// next period.
    pub fn periodic(&mut self, interval: u64, event: E, label: &'static str) -> TimerHandle {
        debug_assert!(interval > 0, "periodic timer '{}' with zero interval", label);
        self.insert(true, interval.max(1), event, label)
    }

    fn insert(&mut self, periodic: bool, interval: u64, event: E, label: &'static str) -> TimerHandle {
        let serial = self.next_serial;
        self.next_serial += 1;
        let timer = Timer {
            serial,
            start: self.now,
            periodic,
            interval,
            phase: 0,
            event,
            label,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.timers[slot] = Some(timer);
                slot
            }
            None => {
                self.timers.push(Some(timer));
                self.timers.len() - 1
            }
        };
        log::trace!(
            "sched: '{}' slot={} serial={} interval={} periodic={}",
            label, slot, serial, interval, periodic
        );
        TimerHandle {
            slot,
            serial,
            start: self.now,
        }
    }

    /// True if `handle` still refers to a live timer.
    pub fn is_active(&self, handle: &TimerHandle) -> bool {
        matches!(self.timers.get(handle.slot), Some(Some(t)) if t.serial == handle.serial)
    }

    /// Remove the timer behind `handle`.
    ///
    /// Returns false when the timer already fired or was cancelled; that
    /// case leaves the table untouched. A slot index that was never issued
    /// is a programming error.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let Some(entry) = self.timers.get_mut(handle.slot) else {
            debug_assert!(false, "cancel of unknown timer slot {}", handle.slot);
            log::error!("sched: cancel of unknown timer slot {}", handle.slot);
            return false;
        };
        match entry {
            Some(t) if t.serial == handle.serial => {
                log::trace!("sched: cancel '{}' slot={}", t.label, handle.slot);
                *entry = None;
                self.free.push(handle.slot);
                true
            }
            _ => {
                log::debug!(
                    "sched: stale cancel slot={} serial={}",
                    handle.slot, handle.serial
                );
                false
            }
        }
    }

    /// Advance the clock by `ticks` and deliver every due event.
    ///
    /// Each timer fires once per interval crossed. Timers registered by a
    /// callback during this call start counting from the new `now` and do
    /// not see any of these ticks.
    pub fn tick<S: EventSink<E> + ?Sized>(&mut self, ticks: u64, sink: &mut S) {
        self.now += ticks;
        let cutoff = self.next_serial;
        let slots = self.timers.len();

        for slot in 0..slots {
            let serial = match &mut self.timers[slot] {
                Some(t) if t.serial < cutoff => {
                    t.phase += ticks;
                    t.serial
                }
                _ => continue,
            };

            loop {
                // the entry may have been cancelled by the previous callback
                let (event, periodic) = match &mut self.timers[slot] {
                    Some(t) if t.serial == serial && t.phase >= t.interval => {
                        t.phase -= t.interval;
                        (t.event, t.periodic)
                    }
                    _ => break,
                };
                if !periodic {
                    self.timers[slot] = None;
                    self.free.push(slot);
                }
                sink.on_event(self, event);
                if !periodic {
                    break;
                }
            }
        }
    }
}
