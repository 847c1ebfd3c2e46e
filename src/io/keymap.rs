//! Key positions and the ASCII typing table
//!
//! Every non-modifier key sits at one (row, bit) crossing of the matrix.
//! Rows count down from 15 along each bit column:
//!
//! | Bit | Rows 15 .. 0                                                     |
//! |:----|:-----------------------------------------------------------------|
//! | 0   | `0 1 2 3 4 5 6 7 8 9 : ; , - . /`                                |
//! | 1   | `@ A B C D E F G H I J K L M N O`                                |
//! | 2   | `P Q R S T U V W X Y Z [ \ ] ^ _`                                |
//! | 3   | F0 .. F15                                                        |
//! | 4   | BREAK, INS CHAR, DEL LINE, INS LINE, DEL CHAR, AUTO, -, -, HOME, |
//! |     | TAB, cursor down, ERASE LINE, ERASE PAGE, RETURN, A7 ON, BL/A7 OFF |
//! | 5   | BLACK .. WHITE (8 colours), -, cursor right, cursor left, ESC,   |
//! |     | cursor up, FG ON, BG ON, BLINK ON                                |
//! | 6   | space (15), keypad `*` (5), keypad `+` (4), keypad `=` (2)       |
//!
//! The machine's own code table assumes CAPS LOCK is down, so with CAPS
//! LOCK up an upper-case letter is its key plus SHIFT, and the bare key
//! gives the lower-case (graphics) code.

const DIGITS: &[u8; 16] = b"0123456789:;,-./";
const LETTERS_AT: &[u8; 16] = b"@ABCDEFGHIJKLMNO";
const LETTERS_P: &[u8; 16] = b"PQRSTUVWXYZ[\\]^_";

/// A key on the Compucolor II keyboard, modifiers excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A key whose legend is one of the printable characters in the bit 0-2
    /// columns, or space
    Char(u8),
    /// F0 .. F15
    Function(u8),
    Break,
    InsertChar,
    DeleteLine,
    InsertLine,
    DeleteChar,
    Auto,
    Home,
    Tab,
    CursorDown,
    EraseLine,
    ErasePage,
    Return,
    A7On,
    BlinkA7Off,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    CursorRight,
    CursorLeft,
    Escape,
    CursorUp,
    ForegroundOn,
    BackgroundOn,
    BlinkOn,
    PadStar,
    PadPlus,
    PadEquals,
}

impl Key {
    /// Matrix row and bit, or `None` for a character with no key.
    pub fn position(self) -> Option<(usize, u8)> {
        use Key::*;
        let at = |row: usize, bit: u8| Some((row, bit));
        match self {
            Char(b' ') => at(15, 6),
            Char(ch) => [DIGITS, LETTERS_AT, LETTERS_P]
                .iter()
                .enumerate()
                .find_map(|(bit, keys)| {
                    keys.iter().position(|&k| k == ch).map(|i| (15 - i, bit as u8))
                }),
            Function(n) if n < 16 => at(15 - n as usize, 3),
            Function(_) => None,
            Break => at(15, 4),
            InsertChar => at(14, 4),
            DeleteLine => at(13, 4),
            InsertLine => at(12, 4),
            DeleteChar => at(11, 4),
            Auto => at(10, 4),
            Home => at(7, 4),
            Tab => at(6, 4),
            CursorDown => at(5, 4),
            EraseLine => at(4, 4),
            ErasePage => at(3, 4),
            Return => at(2, 4),
            A7On => at(1, 4),
            BlinkA7Off => at(0, 4),
            Black => at(15, 5),
            Red => at(14, 5),
            Green => at(13, 5),
            Yellow => at(12, 5),
            Blue => at(11, 5),
            Magenta => at(10, 5),
            Cyan => at(9, 5),
            White => at(8, 5),
            CursorRight => at(6, 5),
            CursorLeft => at(5, 5),
            Escape => at(4, 5),
            CursorUp => at(3, 5),
            ForegroundOn => at(2, 5),
            BackgroundOn => at(1, 5),
            BlinkOn => at(0, 5),
            PadStar => at(5, 6),
            PadPlus => at(4, 6),
            PadEquals => at(2, 6),
        }
    }
}

/// A key together with the modifiers held while it is struck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub key: Key,
    pub shift: bool,
    pub control: bool,
}

impl KeyStroke {
    fn new(key: Key, shift: bool, control: bool) -> Self {
        Self {
            key,
            shift,
            control,
        }
    }
}

/// The stroke that makes the keyboard routine return code `code`, with
/// CAPS LOCK up. Codes 127 and 159 have no stroke.
pub fn encode_ascii(code: u8) -> Option<KeyStroke> {
    let ch = |table: &[u8], i: u8| Key::Char(table[i as usize]);
    let stroke = match code {
        0..=31 => KeyStroke::new(ch(b"@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_", code), false, true),
        32..=43 => KeyStroke::new(ch(b"0123456789:;", code - 32), true, false),
        44..=59 => KeyStroke::new(ch(b",-./0123456789:;", code - 44), false, false),
        60..=63 => KeyStroke::new(ch(b",-./", code - 60), true, false),
        64 => KeyStroke::new(Key::Char(b'@'), false, false),
        65..=90 => KeyStroke::new(Key::Char(code), true, false),
        91..=95 => KeyStroke::new(Key::Char(code), false, false),
        96 => KeyStroke::new(Key::Char(b'@'), true, false),
        97..=122 => KeyStroke::new(Key::Char(code - 32), false, false),
        123..=126 => KeyStroke::new(Key::Char(code - 32), true, false),
        127 | 159 => return None,
        128..=158 => KeyStroke::new(Key::Char(code - 64), true, true),
        160..=191 => {
            let base = encode_ascii(code - 128)?;
            KeyStroke::new(base.key, base.shift, true)
        }
        192..=255 => KeyStroke::new(
            Key::Function(code % 16),
            (208..=239).contains(&code),
            code % 32 < 16,
        ),
    };
    Some(stroke)
}
