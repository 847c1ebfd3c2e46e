//! Autotyper
//!
//! Streams a text file into BASIC as though it were typed, one step per
//! frame. Two ways of feeding it:
//!
//! | Mode    | Each frame                                                 |
//! |:--------|:-----------------------------------------------------------|
//! | `lines` | when BASIC's line-done flag is clear, copy the next line   |
//! |         | into its input buffer and set the flag                     |
//! | `keys`  | hold the next character's keys for one frame, release for |
//! |         | one, and idle ten frames after each RETURN                 |
//!
//! Both wait on the line-done flag, so BASIC takes lines at its own pace.
//! A file that begins with `[[[RESET]]]` asks for a cold start first.

use super::Keyboard;
use crate::memory::Memory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// BASIC's line input buffer (LINBF): a zero, the text, a zero.
pub const LINE_BUFFER: u16 = 0x8046;
/// Nonzero while BASIC is processing the last line (THRUFL).
pub const LINE_DONE_FLAG: u16 = 0x81DE;
/// Longest line the input buffer holds.
pub const MAX_LINE: usize = 97;
/// Leading marker that asks for a cold start before typing.
pub const RESET_MARKER: &str = "[[[RESET]]]";
/// Frames to wait after typing RETURN in `keys` mode.
const RETURN_PAUSE_FRAMES: u8 = 10;
/// Text larger than this is probably not a program listing.
const LARGE_TEXT: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypingMode {
    /// Stuff whole lines into the input buffer
    #[default]
    Lines,
    /// Press one key per character through the matrix
    Keys,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutotypeError {
    Empty,
    /// A character no key produces
    Unencodable { line: usize, ch: char },
}

impl fmt::Display for AutotypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "nothing to type"),
            Self::Unencodable { line, ch } => {
                write!(f, "line {}: {:?} cannot be typed", line, ch)
            }
        }
    }
}

impl std::error::Error for AutotypeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyPhase {
    /// Waiting for BASIC to want input
    Ready,
    /// The current character's keys are held
    Down,
    /// Frames left to idle after a RETURN
    Pause(u8),
}

#[derive(Debug)]
pub struct Autotyper {
    mode: TypingMode,
    /// Text with every line ending turned into a carriage return
    text: Vec<u8>,
    /// Next character to send; `None` when idle
    offset: Option<usize>,
    phase: KeyPhase,
    reset_requested: bool,
}

impl Default for Autotyper {
    fn default() -> Self {
        Self::new(TypingMode::default())
    }
}

/// Turn DOS or Unix line endings into carriage returns. Text that already
/// uses carriage returns is left alone.
fn normalize_line_endings(text: &str) -> String {
    let crs = text.matches('\r').count() as f64;
    let lfs = text.matches('\n').count() as f64;
    // stray CRs or LFs shouldn't hide a DOS file
    let crlfs = text.matches("\r\n").count() as f64 * 1.1;
    if crlfs >= crs && crlfs >= lfs {
        text.replace("\r\n", "\r")
    } else if lfs > crs {
        text.replace('\n', "\r")
    } else {
        text.to_string()
    }
}

impl Autotyper {
    pub fn new(mode: TypingMode) -> Self {
        Self {
            mode,
            text: Vec::new(),
            offset: None,
            phase: KeyPhase::Ready,
            reset_requested: false,
        }
    }

    pub fn mode(&self) -> TypingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TypingMode) {
        self.mode = mode;
    }

    /// Queue `text` for typing, replacing anything still queued.
    pub fn start(&mut self, text: &str) -> Result<(), AutotypeError> {
        if text.is_empty() {
            return Err(AutotypeError::Empty);
        }
        if text.len() > LARGE_TEXT {
            log::warn!("autotype: {} bytes is a lot to type", text.len());
        }
        let text = normalize_line_endings(text);

        let mut bytes = Vec::with_capacity(text.len());
        for (n, line) in text.split('\r').enumerate() {
            if line.chars().count() > MAX_LINE {
                log::warn!(
                    "autotype: line {} is {} characters, longer than BASIC's {} character buffer",
                    n + 1,
                    line.chars().count(),
                    MAX_LINE
                );
            }
            if n > 0 {
                bytes.push(b'\r');
            }
            for ch in line.chars() {
                let code = u8::try_from(u32::from(ch))
                    .map_err(|_| AutotypeError::Unencodable { line: n + 1, ch })?;
                bytes.push(code);
            }
        }

        log::info!("autotype: {} bytes queued ({:?} mode)", bytes.len(), self.mode);
        self.text = bytes;
        self.offset = Some(0);
        self.phase = KeyPhase::Ready;
        self.reset_requested = false;
        Ok(())
    }

    pub fn cancel(&mut self) {
        if self.offset.is_some() {
            log::info!("autotype: cancelled");
        }
        self.offset = None;
        self.phase = KeyPhase::Ready;
        self.reset_requested = false;
    }

    pub fn is_running(&self) -> bool {
        self.offset.is_some()
    }

    /// Share of the text already sent, 0 to 100.
    pub fn percent_done(&self) -> f64 {
        match self.offset {
            Some(offset) if !self.text.is_empty() => 100.0 * offset as f64 / self.text.len() as f64,
            _ => 0.0,
        }
    }

    /// True once after the text asked for a cold start.
    pub fn take_reset_request(&mut self) -> bool {
        std::mem::take(&mut self.reset_requested)
    }

    fn finish(&mut self) {
        log::info!("autotype: done");
        self.offset = None;
        self.phase = KeyPhase::Ready;
    }

    /// One frame's worth of typing.
    pub fn poll(&mut self, memory: &mut Memory, keyboard: &mut Keyboard) {
        let Some(offset) = self.offset else { return };

        if offset == 0 && self.text.starts_with(RESET_MARKER.as_bytes()) {
            log::info!("autotype: reset requested");
            self.reset_requested = true;
            // BASIC swallows the first line after a reset
            self.text.drain(..RESET_MARKER.len() - 1);
            self.text[0] = b'\r';
            return;
        }

        match self.mode {
            TypingMode::Lines => self.stuff_line(offset, memory),
            TypingMode::Keys => self.press_next(offset, memory, keyboard),
        }
    }

    fn press_next(&mut self, offset: usize, memory: &Memory, keyboard: &mut Keyboard) {
        let ch = self.text[offset];
        match self.phase {
            KeyPhase::Pause(frames) => {
                self.phase = if frames > 1 {
                    KeyPhase::Pause(frames - 1)
                } else {
                    KeyPhase::Ready
                };
            }
            KeyPhase::Ready => {
                if memory.read(LINE_DONE_FLAG) == 0 {
                    keyboard.type_ascii(ch);
                    self.phase = KeyPhase::Down;
                }
            }
            KeyPhase::Down => {
                keyboard.clear();
                self.phase = if ch == b'\r' {
                    KeyPhase::Pause(RETURN_PAUSE_FRAMES)
                } else {
                    KeyPhase::Ready
                };
                if offset + 1 >= self.text.len() {
                    self.finish();
                } else {
                    self.offset = Some(offset + 1);
                }
            }
        }
    }

    fn stuff_line(&mut self, offset: usize, memory: &mut Memory) {
        if memory.read(LINE_DONE_FLAG) != 0 {
            return;
        }
        let rest = &self.text[offset..];
        let len = rest
            .iter()
            .take(MAX_LINE)
            .take_while(|&&b| b != b'\r')
            .count();

        memory.write(LINE_BUFFER, 0x00);
        for (i, &b) in rest[..len].iter().enumerate() {
            memory.write(LINE_BUFFER + 1 + i as u16, b);
        }
        memory.write(LINE_BUFFER + 1 + len as u16, 0x00);
        memory.write(LINE_DONE_FLAG, 0x0D);
        log::debug!("autotype: line {:?}", String::from_utf8_lossy(&rest[..len]));

        let mut next = offset + len;
        match self.text.get(next).copied() {
            Some(b'\r') => next += 1,
            Some(_) => log::warn!("autotype: line longer than {} characters was split", MAX_LINE),
            None => {}
        }
        if next >= self.text.len() {
            self.finish();
        } else {
            self.offset = Some(next);
        }
    }
}
