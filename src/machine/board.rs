//! Compucolor II Bus
//!
//! Routes CPU memory and port accesses to storage and the peripheral
//! chips, and dispatches scheduler events to the devices that own them.
//!
//! ## Memory Map
//!
//! | Address Range  | Size   | Description                              |
//! |:---------------|:-------|:-----------------------------------------|
//! | 0x0000-0x5FFF  | 24 KB  | ROM (writes ignored)                     |
//! | 0x6000-0x6FFF  | 4 KB   | Video RAM, fast window (no wait)         |
//! | 0x7000-0x7FFF  | 4 KB   | Video RAM, slow window (waits for hblank)|
//! | 0x8000-0xFFFF  | 32 KB  | DRAM                                     |
//!
//! ## Ports
//!
//! | Port       | Description                                     |
//! |:-----------|:------------------------------------------------|
//! | 0x00-0x1F  | TMS 5501, register `port & 0x0F`                |
//! | 0x60-0x7F  | SMC 5027, register `port & 0x0F` (write only)   |
//! | others     | unmapped; reads return the port number          |

use super::NUM_DRIVES;
use crate::floppy::{DriveOutput, DriveTimer, Floppy, Stepper};
use crate::io::serial::{frame_ticks, SerialPort};
use crate::io::{Autotyper, Keyboard, TypingMode};
use crate::memory::{CpuBus, IoInterface, Memory, MemoryInterface, Region, SLOW_VIDEO_START};
use crate::scheduler::{EventSink, Scheduler};
use crate::tms5501::{Peripheral, Tms5501, UartAction};
use crate::video::{Display, Smc5027};

/// Ticks per hblank poll while a slow video access waits.
pub const HBLANK_WAIT_GRANULARITY: u64 = 4;

/// Everything the scheduler can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Frame refresh, 30 Hz
    Vsync,
    /// 5501 timer prescaler
    Uart64us,
    /// 5027 horizontal blanking edge
    HBlank,
    /// J-2 finished shifting a byte
    SerialTxDone,
    Drive(DriveTimer),
}

impl From<DriveTimer> for Event {
    fn from(t: DriveTimer) -> Self {
        Event::Drive(t)
    }
}

/// The peripheral chips and what hangs off them.
pub struct Devices {
    pub cpu_freq: u64,
    pub uart: Tms5501,
    pub crtc: Smc5027,
    pub display: Display,
    pub keyboard: Keyboard,
    pub drives: [Floppy; NUM_DRIVES],
    pub serial: SerialPort,
    pub autotyper: Autotyper,
}

impl Devices {
    pub fn new(cpu_freq: u64, stepper: Stepper) -> Self {
        Self {
            cpu_freq,
            uart: Tms5501::new(),
            crtc: Smc5027::new(cpu_freq),
            display: Display::new(),
            keyboard: Keyboard::new(),
            drives: [Floppy::new(0, cpu_freq, stepper), Floppy::new(1, cpu_freq, stepper)],
            serial: SerialPort::new(),
            autotyper: Autotyper::new(TypingMode::default()),
        }
    }

    /// What the 5501 parallel input sees for the current select code.
    pub fn parallel_input(&self) -> u8 {
        match self.uart.selected() {
            Peripheral::Keyboard => self.keyboard.row(self.uart.keyboard_row()),
            Peripheral::Floppy0 => self.drives[0].status(),
            Peripheral::Floppy1 => self.drives[1].status(),
            Peripheral::Unconnected => 0x00,
        }
    }

    /// The output port changed: both drives see select, write gate and
    /// stepper lines.
    fn update_drive_lines(&mut self, sched: &mut Scheduler<Event>) {
        let selected = self.uart.selected().drive();
        let write = self.uart.write_enable();
        let phase = self.uart.stepper();
        for (unit, drive) in self.drives.iter_mut().enumerate() {
            drive.select(selected == Some(unit), write, phase, sched);
        }
    }

    /// Hand a byte leaving the 5501 shifter to whatever is selected.
    fn route_transmit(&mut self, byte: u8, sched: &mut Scheduler<Event>) {
        let selected = self.uart.selected();
        match selected.drive() {
            Some(unit) => self.drives[unit].tx_data(byte, sched),
            None => {
                let ticks = frame_ticks(self.cpu_freq, self.uart.baud_rate(), self.uart.frame_bits());
                let connected = selected == Peripheral::Keyboard;
                self.serial.transmit(byte, connected, ticks, sched, Event::SerialTxDone);
            }
        }
    }

    fn transmit_done(&mut self, sched: &mut Scheduler<Event>) {
        if let Some(byte) = self.uart.tx_serial_ready() {
            self.route_transmit(byte, sched);
        }
    }

    pub fn reset(&mut self, sched: &mut Scheduler<Event>) {
        self.uart.reset();
        self.crtc.reset();
        self.keyboard.reset();
        for drive in self.drives.iter_mut() {
            drive.reset(sched);
        }
        self.serial.reset(sched);
        self.display.refresh_all();
    }
}

/// Scheduler sink: devices plus memory, for the display scan and the
/// autotyper.
struct Dispatch<'a> {
    memory: &'a mut Memory,
    devices: &'a mut Devices,
}

impl EventSink<Event> for Dispatch<'_> {
    fn on_event(&mut self, sched: &mut Scheduler<Event>, event: Event) {
        let dev = &mut *self.devices;
        match event {
            Event::Vsync => {
                if dev.display.vsync(self.memory.video_ram()) {
                    dev.uart.trigger_external_sensor();
                }
                dev.autotyper.poll(self.memory, &mut dev.keyboard);
            }
            Event::Uart64us => dev.uart.tick_64us(),
            Event::HBlank => dev.crtc.on_hblank(sched, Event::HBlank),
            Event::SerialTxDone => {
                dev.serial.on_tx_done();
                dev.transmit_done(sched);
            }
            Event::Drive(timer) => match dev.drives[timer.unit].on_event(timer.event, sched) {
                Some(DriveOutput::Received {
                    byte,
                    framing_error,
                }) => dev.uart.rx_serial(byte, framing_error),
                Some(DriveOutput::TxDone) => dev.transmit_done(sched),
                None => {}
            },
        }
    }
}

/// Memory, clock and devices: everything the CPU talks to.
pub struct Board {
    pub memory: Memory,
    pub scheduler: Scheduler<Event>,
    pub devices: Devices,
    hblank_wait_limit: u32,
}

impl Board {
    pub fn new(cpu_freq: u64, stepper: Stepper, hblank_wait_limit: u32) -> Self {
        let mut board = Self {
            memory: Memory::new(),
            scheduler: Scheduler::new(),
            devices: Devices::new(cpu_freq, stepper),
            hblank_wait_limit,
        };
        board.scheduler.periodic(cpu_freq / 30, Event::Vsync, "display");
        board.scheduler.periodic(cpu_freq * 64 / 1_000_000, Event::Uart64us, "5501");
        board.devices.crtc.start(&mut board.scheduler, Event::HBlank);
        board
    }

    /// Advance the clock, delivering every event that comes due.
    pub fn tick(&mut self, ticks: u64) {
        let mut sink = Dispatch {
            memory: &mut self.memory,
            devices: &mut self.devices,
        };
        self.scheduler.tick(ticks, &mut sink);
    }

    /// Stall until the 5027 is in horizontal blanking, letting time pass.
    fn wait_for_hblank(&mut self) {
        let mut polls = 0;
        while !self.devices.crtc.in_hblank() {
            if polls >= self.hblank_wait_limit {
                log::warn!("bus: gave up waiting for hblank after {} polls", polls);
                return;
            }
            self.tick(HBLANK_WAIT_GRANULARITY);
            polls += 1;
        }
    }

    pub fn video_ram(&self) -> &[u8] {
        self.memory.video_ram()
    }
}

impl MemoryInterface for Board {
    fn read_byte(&mut self, address: u16) -> u8 {
        if Region::of(address) == Region::SlowVideo {
            self.wait_for_hblank();
        }
        self.memory.read(address)
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        let region = Region::of(address);
        if region == Region::SlowVideo {
            self.wait_for_hblank();
        }
        if let Some(storage) = self.memory.write(address, value) {
            if matches!(region, Region::FastVideo | Region::SlowVideo) {
                debug_assert!(storage >= SLOW_VIDEO_START);
                self.devices.display.update_char(storage);
            }
        }
    }

    fn peek_byte(&self, address: u16) -> u8 {
        self.memory.read(address)
    }
}

impl IoInterface for Board {
    fn read_port(&mut self, port: u8) -> u8 {
        match port {
            0x00..=0x1F => {
                let parallel = self.devices.parallel_input();
                self.devices.uart.read(port & 0x0F, parallel)
            }
            // the 5027 is strobed by I/O write only; nothing drives the
            // data bus, which still holds the port number
            _ => port,
        }
    }

    fn write_port(&mut self, port: u8, value: u8) {
        match port {
            0x00..=0x1F => match self.devices.uart.write(port & 0x0F, value) {
                Some(UartAction::Transmit(byte)) => {
                    self.devices.route_transmit(byte, &mut self.scheduler)
                }
                Some(UartAction::Outport(_)) => self.devices.update_drive_lines(&mut self.scheduler),
                None => {}
            },
            0x60..=0x7F => {
                self.devices.crtc.write(port & 0x0F, value);
                self.devices.display.mark_frame();
            }
            _ => log::trace!("bus: write {:02X} to unmapped port {:02X}", value, port),
        }
    }
}

impl CpuBus for Board {
    fn acknowledge_interrupt(&mut self) -> u8 {
        match self.devices.uart.acknowledge() {
            Some(opcode) => opcode,
            None => {
                log::warn!("bus: interrupt acknowledged with nothing pending");
                0xFF
            }
        }
    }
}
