//! Memory and I/O interfaces
//!
//! The 8080 sees a 16-bit address space and a 256-entry port space. The
//! CPU core talks to both through [`CpuBus`]; the machine decides what sits
//! behind each address.

/// Byte-addressable memory as seen by the CPU.
pub trait MemoryInterface {
    fn read_byte(&mut self, address: u16) -> u8;
    fn write_byte(&mut self, address: u16, value: u8);

    /// Read without side effects (no wait states, no device strobes).
    fn peek_byte(&self, address: u16) -> u8;

    fn read_word(&mut self, address: u16) -> u16 {
        let low = self.read_byte(address) as u16;
        let high = self.read_byte(address.wrapping_add(1)) as u16;
        (high << 8) | low
    }

    fn write_word(&mut self, address: u16, value: u16) {
        self.write_byte(address, value as u8);
        self.write_byte(address.wrapping_add(1), (value >> 8) as u8);
    }
}

/// 8080 port space.
pub trait IoInterface {
    fn read_port(&mut self, port: u8) -> u8;
    fn write_port(&mut self, port: u8, value: u8);
}

/// Everything the CPU is wired to.
pub trait CpuBus: MemoryInterface + IoInterface {
    /// Interrupt acknowledge cycle: the controller supplies the one-byte
    /// instruction to execute in place of the next fetch.
    fn acknowledge_interrupt(&mut self) -> u8;
}

/// Start of the fast-refresh video window (aliases `SLOW_VIDEO_START`).
pub const FAST_VIDEO_START: u16 = 0x6000;
/// Start of the slow-refresh video window; CPU access waits for hblank.
pub const SLOW_VIDEO_START: u16 = 0x7000;
/// Start of dynamic RAM.
pub const DRAM_START: u16 = 0x8000;
/// Offset from a fast-window address to its storage location.
pub const FAST_VIDEO_ALIAS: u16 = SLOW_VIDEO_START - FAST_VIDEO_START;

/// Decoded address region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Rom,
    FastVideo,
    SlowVideo,
    Dram,
}

impl Region {
    pub fn of(address: u16) -> Self {
        match address {
            0x0000..=0x5FFF => Region::Rom,
            0x6000..=0x6FFF => Region::FastVideo,
            0x7000..=0x7FFF => Region::SlowVideo,
            _ => Region::Dram,
        }
    }
}

/// Flat 64 KiB backing store.
///
/// All region side effects live in the machine's bus; this is only the
/// storage plus the unchecked write path used to load ROM images.
#[derive(Debug, Clone)]
pub struct Memory {
    pub data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            data: vec![0; 0x10000],
        }
    }

    /// Storage location behind `address`, after video window aliasing.
    pub fn storage_address(address: u16) -> u16 {
        match Region::of(address) {
            Region::FastVideo => address + FAST_VIDEO_ALIAS,
            _ => address,
        }
    }

    /// Read through the video window alias.
    pub fn read(&self, address: u16) -> u8 {
        self.data[Self::storage_address(address) as usize]
    }

    /// Write honouring the memory map: ROM is read-only, the fast window
    /// lands in video RAM. Returns the storage address when something was
    /// written.
    pub fn write(&mut self, address: u16, value: u8) -> Option<u16> {
        if Region::of(address) == Region::Rom {
            return None;
        }
        let storage = Self::storage_address(address);
        self.data[storage as usize] = value;
        Some(storage)
    }

    /// Write anywhere, ROM included, with no aliasing.
    pub fn write_unsafe(&mut self, address: u16, value: u8) {
        self.data[address as usize] = value;
    }

    /// Copy `image` into memory starting at address 0.
    pub fn load_rom(&mut self, image: &[u8]) {
        for (i, &b) in image.iter().take(0x10000).enumerate() {
            self.write_unsafe(i as u16, b);
        }
    }

    /// Video RAM as stored: 32 rows of 64 (char, attribute) pairs.
    pub fn video_ram(&self) -> &[u8] {
        let start = SLOW_VIDEO_START as usize;
        &self.data[start..start + 0x1000]
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
