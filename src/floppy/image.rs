//! Compucolor virtual floppy (`.ccvf`) text image.
//!
//! A text file: a magic line, optional `Write Protect` and `Label` lines,
//! then either 41 raw `Track n` blocks of 1920 hex bytes (the bit cells of
//! the track, LSB first) or `Sector n` blocks of 128 hex bytes, which are
//! framed and interleaved into raw tracks at load time.

use std::fmt;

pub const MAGIC: &str = "Compucolor Virtual Floppy Disk Image";
pub const NUM_TRACKS: usize = 41;
pub const BYTES_PER_TRACK: usize = 1920;
pub const BITS_PER_TRACK: usize = BYTES_PER_TRACK * 8;
pub const SECTOR_SIZE: usize = 128;
pub const SECTORS_PER_TRACK: usize = 10;
/// Logical tracks a `Sector` image may address.
pub const ADDRESSABLE_TRACKS: usize = 44;
/// Sector numbers run from 0 to `MAX_SECTORS - 1`.
pub const MAX_SECTORS: usize = ADDRESSABLE_TRACKS * SECTORS_PER_TRACK;
/// Sectors that land on the medium: logical tracks 0-39 (physical 1-40).
pub const STORED_SECTORS: usize = (NUM_TRACKS - 1) * SECTORS_PER_TRACK;

/// Physical order of logical sectors around a track.
pub const INTERLEAVE: [u8; SECTORS_PER_TRACK] = [0, 3, 6, 9, 2, 5, 8, 1, 4, 7];

/// Gap bits written ahead of each sector.
const SECTOR_GAP_BITS: usize = 150;
/// Fill for sectors the image does not supply.
const FILL_BYTE: u8 = 0xE5;
/// Minimum run of ones the decoder accepts as an inter-sector gap.
const MIN_GAP_RUN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskImageError {
    MissingMagic { line: usize },
    UnknownLine { line: usize },
    DataOutsideBlock { line: usize },
    OddHexDigits { line: usize },
    TooMuchData { line: usize, limit: usize },
    ShortBlock { line: usize, limit: usize },
    TrackOutOfSequence { line: usize, found: usize, expected: usize },
    TooManyTracks { line: usize, track: usize },
    SectorOutOfSequence { line: usize, found: usize, expected: usize },
    SectorOutOfRange { line: usize, sector: usize },
    MixedFormats { line: usize },
    NoData { line: usize },
    /// A built image whose track table doesn't fit the drive.
    WrongTrackCount { found: usize },
    WrongTrackLength { track: usize, found: usize },
}

impl fmt::Display for DiskImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMagic { line } => {
                write!(f, "line {}: not a ccvf image, missing magic string", line)
            }
            Self::UnknownLine { line } => write!(f, "line {}: unknown format", line),
            Self::DataOutsideBlock { line } => {
                write!(f, "line {}: hex data before any Track or Sector line", line)
            }
            Self::OddHexDigits { line } => {
                write!(f, "line {}: odd number of hex digits", line)
            }
            Self::TooMuchData { line, limit } => {
                write!(f, "line {}: more than {} bytes of data", line, limit)
            }
            Self::ShortBlock { line, limit } => write!(
                f,
                "line {}: previous block did not supply {} bytes of data",
                line, limit
            ),
            Self::TrackOutOfSequence { line, found, expected } => write!(
                f,
                "line {}: track {} was found, expected track {}",
                line, found, expected
            ),
            Self::TooManyTracks { line, track } => write!(
                f,
                "line {}: track {} was found, but at most {} are allowed",
                line, track, NUM_TRACKS
            ),
            Self::SectorOutOfSequence { line, found, expected } => write!(
                f,
                "line {}: sector {} was found, expected sector {}",
                line, found, expected
            ),
            Self::SectorOutOfRange { line, sector } => write!(
                f,
                "line {}: sector {} is past the last addressable track",
                line, sector
            ),
            Self::MixedFormats { line } => {
                write!(f, "line {}: Track and Sector blocks cannot be mixed", line)
            }
            Self::NoData { line } => write!(f, "line {}: image contains no data", line),
            Self::WrongTrackCount { found } => {
                write!(f, "image has {} tracks, the drive needs {}", found, NUM_TRACKS)
            }
            Self::WrongTrackLength { track, found } => write!(
                f,
                "track {} holds {} bytes, the drive needs {}",
                track, found, BYTES_PER_TRACK
            ),
        }
    }
}

impl std::error::Error for DiskImageError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Track,
    Sector,
}

impl BlockKind {
    fn limit(self) -> usize {
        match self {
            BlockKind::Track => BYTES_PER_TRACK,
            BlockKind::Sector => SECTOR_SIZE,
        }
    }
}

/// Raw bit-level disk contents plus the image metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskImage {
    /// `NUM_TRACKS` tracks of `BYTES_PER_TRACK` bytes, bit cells LSB first
    pub tracks: Vec<Vec<u8>>,
    pub write_protected: bool,
    pub labels: Vec<String>,
}

impl DiskImage {
    /// A disk of all-one (unformatted) tracks.
    pub fn blank() -> Self {
        Self {
            tracks: vec![vec![0xFF; BYTES_PER_TRACK]; NUM_TRACKS],
            write_protected: false,
            labels: Vec::new(),
        }
    }

    /// Parse the text form. Nothing is returned unless the whole file is
    /// well formed.
    pub fn parse(text: &str) -> Result<Self, DiskImageError> {
        let mut magic_seen = false;
        let mut write_protected = false;
        let mut labels = Vec::new();
        let mut kind: Option<BlockKind> = None;
        let mut current: Option<usize> = None;
        let mut bytes: Vec<u8> = Vec::new();
        let mut blocks: Vec<Vec<u8>> = Vec::new();
        let mut line_num = 0;

        for (idx, raw) in text.lines().enumerate() {
            line_num = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let lower = line.to_ascii_lowercase();

            if lower.starts_with("compucolor virtual floppy") {
                magic_seen = true;
                continue;
            }
            if !magic_seen {
                return Err(DiskImageError::MissingMagic { line: line_num });
            }
            if lower == "write protect" {
                write_protected = true;
                continue;
            }
            if lower.starts_with("label ") {
                labels.push(line[6..].to_string());
                continue;
            }

            let header = if let Some(rest) = lower.strip_prefix("track ") {
                Some((BlockKind::Track, rest))
            } else {
                lower.strip_prefix("sector ").map(|rest| (BlockKind::Sector, rest))
            };
            if let Some((new_kind, rest)) = header {
                let digits: String = rest.trim().chars().take_while(char::is_ascii_digit).collect();
                let found: usize = digits
                    .parse()
                    .map_err(|_| DiskImageError::UnknownLine { line: line_num })?;
                if kind.is_some_and(|k| k != new_kind) {
                    return Err(DiskImageError::MixedFormats { line: line_num });
                }
                if current.is_some() && bytes.len() != new_kind.limit() {
                    return Err(DiskImageError::ShortBlock {
                        line: line_num,
                        limit: new_kind.limit(),
                    });
                }
                let expected = current.map_or(0, |c| c + 1);
                if found != expected {
                    return Err(match new_kind {
                        BlockKind::Track => DiskImageError::TrackOutOfSequence {
                            line: line_num,
                            found,
                            expected,
                        },
                        BlockKind::Sector => DiskImageError::SectorOutOfSequence {
                            line: line_num,
                            found,
                            expected,
                        },
                    });
                }
                match new_kind {
                    BlockKind::Track if found >= NUM_TRACKS => {
                        return Err(DiskImageError::TooManyTracks {
                            line: line_num,
                            track: found,
                        });
                    }
                    BlockKind::Sector if found >= MAX_SECTORS => {
                        return Err(DiskImageError::SectorOutOfRange {
                            line: line_num,
                            sector: found,
                        });
                    }
                    _ => {}
                }
                kind = Some(new_kind);
                current = Some(found);
                bytes.clear();
                continue;
            }

            if line.chars().all(|c| c.is_ascii_hexdigit()) {
                let Some(k) = kind else {
                    return Err(DiskImageError::DataOutsideBlock { line: line_num });
                };
                if line.len() % 2 == 1 {
                    return Err(DiskImageError::OddHexDigits { line: line_num });
                }
                let limit = k.limit();
                if bytes.len() + line.len() / 2 > limit {
                    return Err(DiskImageError::TooMuchData {
                        line: line_num,
                        limit,
                    });
                }
                for pair in line.as_bytes().chunks(2) {
                    bytes.push(hex_value(pair[0]) << 4 | hex_value(pair[1]));
                }
                if bytes.len() == limit {
                    blocks.push(bytes.clone());
                }
                continue;
            }

            return Err(DiskImageError::UnknownLine { line: line_num });
        }

        let Some(kind) = kind else {
            return Err(DiskImageError::NoData { line: line_num });
        };
        if bytes.len() != kind.limit() {
            return Err(DiskImageError::ShortBlock {
                line: line_num,
                limit: kind.limit(),
            });
        }

        let tracks = match kind {
            BlockKind::Track => {
                let mut tracks = blocks;
                if tracks.len() < NUM_TRACKS {
                    log::debug!("ccvf: {} tracks supplied, rest left unformatted", tracks.len());
                    tracks.resize(NUM_TRACKS, vec![0xFF; BYTES_PER_TRACK]);
                }
                tracks
            }
            BlockKind::Sector => {
                if blocks.len() > STORED_SECTORS {
                    log::warn!(
                        "ccvf: sectors {}-{} have no physical track, dropped",
                        STORED_SECTORS,
                        blocks.len() - 1
                    );
                }
                synthesize_tracks(&blocks)
            }
        };

        Ok(Self {
            tracks,
            write_protected,
            labels,
        })
    }

    /// Check the track table matches the drive: `NUM_TRACKS` tracks of
    /// `BYTES_PER_TRACK` bytes.
    pub fn check_geometry(&self) -> Result<(), DiskImageError> {
        if self.tracks.len() != NUM_TRACKS {
            return Err(DiskImageError::WrongTrackCount {
                found: self.tracks.len(),
            });
        }
        match self.tracks.iter().position(|t| t.len() != BYTES_PER_TRACK) {
            Some(track) => Err(DiskImageError::WrongTrackLength {
                track,
                found: self.tracks[track].len(),
            }),
            None => Ok(()),
        }
    }

    /// Serialise to the raw `Track` text form.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(MAGIC);
        out.push('\n');
        if self.write_protected {
            out.push_str("Write Protect\n");
        }
        for label in &self.labels {
            out.push_str("Label ");
            out.push_str(label);
            out.push('\n');
        }
        for (n, track) in self.tracks.iter().enumerate() {
            out.push_str(&format!("Track {}\n", n));
            for group in track.chunks(32) {
                for byte in group {
                    out.push_str(&format!("{:02X}", byte));
                }
                out.push('\n');
            }
        }
        out
    }

    fn bit(&self, track: usize, pos: usize) -> u8 {
        let pos = pos % BITS_PER_TRACK;
        (self.tracks[track][pos >> 3] >> (pos & 7)) & 1
    }

    /// Decode logical sector `sec` of logical track `trk` by scanning the
    /// raw bits of physical track `trk + 1`.
    pub fn decode_sector(&self, trk: usize, sec: usize) -> Option<Vec<u8>> {
        let phys = trk + 1;
        if phys >= self.tracks.len() {
            return None;
        }
        let mut scan = BitScanner {
            image: self,
            track: phys,
            ptr: 0,
            limit: BITS_PER_TRACK * 3 / 2,
        };

        while scan.ptr < scan.limit {
            scan.find_gap();
            if scan.next_byte()? != 0x55 {
                continue;
            }
            if scan.next_byte()? as usize != phys {
                continue;
            }
            if scan.next_byte()? as usize != sec {
                continue;
            }
            // two header CRC bytes (not checked), then the first dummy byte
            scan.next_byte()?;
            scan.next_byte()?;
            scan.next_byte()?;
            let mut mark = false;
            for _ in 0..3 {
                if scan.next_byte()? == 0x5A {
                    mark = true;
                    break;
                }
            }
            if !mark {
                continue;
            }
            let mut data = Vec::with_capacity(SECTOR_SIZE);
            for _ in 0..SECTOR_SIZE {
                data.push(scan.next_byte()?);
            }
            return Some(data);
        }
        None
    }

    /// Volume name from the directory block, or `--occupied--` when the
    /// disk does not carry one.
    pub fn volume_label(&self) -> String {
        match self.decode_sector(0, 0) {
            Some(block) if block[0] == 0x00 && block[2] == 0x41 => block[3..13]
                .iter()
                .filter(|&&b| (32..=90).contains(&b))
                .map(|&b| b as char)
                .collect(),
            _ => "--occupied--".to_string(),
        }
    }
}

/// Walks a raw track the way the ROM's sector reader does.
struct BitScanner<'a> {
    image: &'a DiskImage,
    track: usize,
    ptr: usize,
    limit: usize,
}

impl BitScanner<'_> {
    fn bit_at(&self, offset: isize) -> u8 {
        let pos = (self.ptr as isize + offset).rem_euclid(BITS_PER_TRACK as isize);
        self.image.bit(self.track, pos as usize)
    }

    fn find_gap(&mut self) {
        let mut run = 0;
        while self.ptr < self.limit && run < MIN_GAP_RUN {
            run = if self.bit_at(0) == 1 { run + 1 } else { 0 };
            self.ptr += 1;
        }
    }

    /// Next start-bit framed byte, or `None` once the scan limit is hit.
    fn next_byte(&mut self) -> Option<u8> {
        while !(self.bit_at(-1) == 1 && self.bit_at(0) == 0) {
            self.ptr += 1;
            if self.ptr >= self.limit {
                return None;
            }
        }
        self.ptr += 1;
        let mut value = 0u8;
        for n in 0..8 {
            value |= self.bit_at(0) << n;
            self.ptr += 1;
        }
        // stop bit
        self.ptr += 1;
        Some(value)
    }
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

/// CRC-16, polynomial 0x1021, initial value 0, MSB first.
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |mut crc, &b| {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
        crc
    })
}

/// Appends serial frames (start bit, 8 data bits LSB first, stop bit) to a
/// track buffer.
struct TrackWriter {
    track: Vec<u8>,
    pos: usize,
}

impl TrackWriter {
    fn new() -> Self {
        Self {
            track: vec![0xFF; BYTES_PER_TRACK],
            pos: 0,
        }
    }

    fn bit(&mut self, value: bool) {
        let mask = 1 << (self.pos & 7);
        if value {
            self.track[self.pos >> 3] |= mask;
        } else {
            self.track[self.pos >> 3] &= !mask;
        }
        self.pos += 1;
    }

    fn gap(&mut self, bits: usize) {
        for _ in 0..bits {
            self.bit(true);
        }
    }

    fn byte(&mut self, value: u8) {
        self.bit(false);
        for n in 0..8 {
            self.bit(value >> n & 1 != 0);
        }
        self.bit(true);
    }

    fn bytes(&mut self, values: &[u8]) {
        for &v in values {
            self.byte(v);
        }
    }
}

/// Lay out 128-byte sector blocks as formatted raw tracks.
fn synthesize_tracks(sectors: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let fill = vec![FILL_BYTE; SECTOR_SIZE];
    (0..NUM_TRACKS)
        .map(|phys| {
            let mut w = TrackWriter::new();
            for &sec in &INTERLEAVE {
                let data = phys
                    .checked_sub(1)
                    .and_then(|logical| sectors.get(logical * SECTORS_PER_TRACK + sec as usize))
                    .unwrap_or(&fill);

                let header = [0x55, phys as u8, sec];
                let header_crc = crc16(&header);
                let mut body = Vec::with_capacity(SECTOR_SIZE + 1);
                body.push(0x5A);
                body.extend_from_slice(data);
                let data_crc = crc16(&body);

                w.gap(SECTOR_GAP_BITS);
                w.bytes(&header);
                w.bytes(&[header_crc as u8, (header_crc >> 8) as u8, 0x00, 0x00]);
                w.bytes(&body);
                w.bytes(&[data_crc as u8, (data_crc >> 8) as u8]);
            }
            // the remainder of the track stays gap
            w.track
        })
        .collect()
}

#[cfg(test)]
#[path = "tests_image.rs"]
mod tests_image;
