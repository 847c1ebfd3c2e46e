// SMC 5027 register indices
pub const REG_LAST_DISPLAY_ROW: usize = 0x6;
pub const REG_CURSOR_Y: usize = 0x8;
pub const REG_CURSOR_X: usize = 0x9;

// Write-only command strobes
pub const CMD_SCROLL: u8 = 0xB;
pub const CMD_LOAD_CURSOR_X: u8 = 0xC;
pub const CMD_LOAD_CURSOR_Y: u8 = 0xD;

pub const NUM_REGISTERS: usize = 16;

// Screen geometry
pub const ROWS: usize = 32;
pub const COLUMNS: usize = 64;
pub const BYTES_PER_ROW: usize = COLUMNS * 2;
pub const VIDEO_RAM_SIZE: usize = ROWS * BYTES_PER_ROW;

// Attribute byte: [plot][blink][bg B G R][fg B G R]
pub const ATTR_FG: u8 = 0x07;
pub const ATTR_BG: u8 = 0x38;
pub const ATTR_BLINK: u8 = 0x40;
pub const ATTR_PLOT: u8 = 0x80;

/// Character bit selecting double-height text.
pub const CHAR_TALL: u8 = 0x80;

/// Vsyncs per blink cycle; blink is on for the second half.
pub const BLINK_PERIOD: u8 = 16;
