//! Display bookkeeping
//!
//! Tracks which character cells changed since the last redraw and drives
//! the blink cycle from vsync. Turning cells into pixels is left to a
//! [`Renderer`].

use super::constants::*;
use super::Smc5027;

/// How a cell's character code is to be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    /// Character generator glyph, 7-bit code
    Text(u8),
    /// Upper half of a double-height glyph (even rows)
    TallTop(u8),
    /// Lower half of a double-height glyph (odd rows)
    TallBottom(u8),
    /// 2x4 block graphics, one bit per block
    Plot(u8),
}

impl Glyph {
    pub fn classify(ch: u8, attr: u8, row: usize) -> Self {
        if attr & ATTR_PLOT != 0 {
            Glyph::Plot(ch)
        } else if ch & CHAR_TALL == 0 {
            Glyph::Text(ch)
        } else if row & 1 == 0 {
            Glyph::TallTop(ch & 0x7F)
        } else {
            Glyph::TallBottom(ch & 0x7F)
        }
    }
}

/// Receives redraw requests from [`Display::render`].
pub trait Renderer {
    /// Draw one cell. `attr` already has the foreground blanked when the
    /// cell is blinking and the blink phase is on.
    fn render_glyph(&mut self, row: usize, col: usize, ch: u8, attr: u8, blink_on: bool);

    /// The frame is complete. `first_row` is the video RAM row shown at
    /// the top; the cursor position is in screen rows.
    fn present(&mut self, _first_row: usize, _cursor: Option<(usize, usize)>) {}
}

pub struct Display {
    /// One bit per column, one word per row
    dirty: [u64; ROWS],
    phase: u8,
    frame_dirty: bool,
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl Display {
    pub fn new() -> Self {
        Self {
            dirty: [u64::MAX; ROWS],
            phase: 0,
            frame_dirty: true,
        }
    }

    /// Cell behind a video RAM address, in either window.
    pub fn cell_of(address: u16) -> (usize, usize) {
        let base = address as usize & (VIDEO_RAM_SIZE - 1);
        ((base >> 7) & (ROWS - 1), (base >> 1) & (COLUMNS - 1))
    }

    /// A byte of the cell at `address` changed.
    pub fn update_char(&mut self, address: u16) {
        let (row, col) = Self::cell_of(address);
        self.dirty[row] |= 1u64 << col;
        self.frame_dirty = true;
    }

    pub fn is_dirty(&self, row: usize, col: usize) -> bool {
        self.dirty[row] & (1u64 << col) != 0
    }

    pub fn dirty_cells(&self) -> usize {
        self.dirty.iter().map(|r| r.count_ones() as usize).sum()
    }

    /// Cursor or scroll moved; the frame needs presenting even if no
    /// cell changed.
    pub fn mark_frame(&mut self) {
        self.frame_dirty = true;
    }

    pub fn refresh_all(&mut self) {
        self.dirty = [u64::MAX; ROWS];
        self.frame_dirty = true;
    }

    fn refresh_blinkers(&mut self, vram: &[u8]) {
        for (row, cells) in vram.chunks_exact(BYTES_PER_ROW).enumerate() {
            for (col, pair) in cells.chunks_exact(2).enumerate() {
                if pair[1] & ATTR_BLINK != 0 {
                    self.dirty[row] |= 1u64 << col;
                }
            }
        }
        self.frame_dirty = true;
    }

    pub fn phase(&self) -> u8 {
        self.phase
    }

    pub fn blink_on(&self) -> bool {
        self.phase >= BLINK_PERIOD / 2
    }

    /// Advance the blink cycle by one frame. Returns true when the cycle
    /// wraps, which pulses the 5501 external sensor input.
    pub fn vsync(&mut self, vram: &[u8]) -> bool {
        self.phase = (self.phase + 1) % BLINK_PERIOD;
        if self.phase % (BLINK_PERIOD / 2) == 0 {
            self.refresh_blinkers(vram);
        }
        self.phase == 0
    }

    /// Hand every dirty cell to `renderer`, then present the frame if
    /// anything changed.
    pub fn render(&mut self, vram: &[u8], crtc: &Smc5027, renderer: &mut dyn Renderer) {
        if !self.frame_dirty {
            return;
        }
        let blink_on = self.blink_on();
        for row in 0..ROWS {
            let mut bits = std::mem::take(&mut self.dirty[row]);
            while bits != 0 {
                let col = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                let offset = row * BYTES_PER_ROW + col * 2;
                let ch = vram[offset];
                let mut attr = vram[offset + 1];
                if attr & ATTR_BLINK != 0 && blink_on {
                    attr &= !ATTR_FG;
                }
                renderer.render_glyph(row, col, ch, attr, blink_on);
            }
        }

        let first_row = crtc.first_display_row();
        let (x, y) = (crtc.cursor_x() as usize, crtc.cursor_y() as usize);
        let cursor = (!blink_on && x < COLUMNS && y < ROWS).then(|| (x, (y + ROWS - first_row) % ROWS));
        renderer.present(first_row, cursor);
        self.frame_dirty = false;
    }
}

/// Renderer that keeps the screen as text, in display order.
///
/// Plot and attribute information is dropped; tall glyphs keep their
/// character code.
pub struct TextScreen {
    cells: [[u8; COLUMNS]; ROWS],
    first_row: usize,
    pub cursor: Option<(usize, usize)>,
}

impl Default for TextScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl TextScreen {
    pub fn new() -> Self {
        Self {
            cells: [[b' '; COLUMNS]; ROWS],
            first_row: 0,
            cursor: None,
        }
    }

    /// Screen row `n`, trailing blanks trimmed.
    pub fn line(&self, n: usize) -> String {
        let row = &self.cells[(n + self.first_row) % ROWS];
        let text: String = row.iter().map(|&c| c as char).collect();
        text.trim_end().to_string()
    }

    pub fn lines(&self) -> Vec<String> {
        (0..ROWS).map(|n| self.line(n)).collect()
    }
}

impl Renderer for TextScreen {
    fn render_glyph(&mut self, row: usize, col: usize, ch: u8, attr: u8, _blink_on: bool) {
        self.cells[row][col] = match Glyph::classify(ch, attr, row) {
            Glyph::Plot(_) => b'#',
            Glyph::Text(c) | Glyph::TallTop(c) | Glyph::TallBottom(c) => match c & 0x7F {
                c @ 0x20..=0x7E => c,
                _ => b' ',
            },
        };
    }

    fn present(&mut self, first_row: usize, cursor: Option<(usize, usize)>) {
        self.first_row = first_row;
        self.cursor = cursor;
    }
}
