//! Disk image parsing, serialisation and sector decoding

use super::*;

fn track_image(fill: u8, tracks: usize) -> String {
    let mut text = String::from("Compucolor Virtual Floppy Disk Image\n");
    let line = format!("{:02X}", fill).repeat(32);
    for t in 0..tracks {
        text.push_str(&format!("Track {}\n", t));
        for _ in 0..60 {
            text.push_str(&line);
            text.push('\n');
        }
    }
    text
}

fn sector_image(sectors: &[[u8; SECTOR_SIZE]]) -> String {
    let mut text = String::from("Compucolor Virtual Floppy Disk Image\n");
    for (n, data) in sectors.iter().enumerate() {
        text.push_str(&format!("Sector {}\n", n));
        for chunk in data.chunks(32) {
            for b in chunk {
                text.push_str(&format!("{:02x}", b));
            }
            text.push('\n');
        }
    }
    text
}

fn directory_block(name: &[u8]) -> [u8; SECTOR_SIZE] {
    let mut block = [0u8; SECTOR_SIZE];
    block[2] = 0x41;
    block[3..3 + name.len()].copy_from_slice(name);
    block
}

#[test]
fn test_all_zero_tracks() {
    let image = DiskImage::parse(&track_image(0x00, NUM_TRACKS)).unwrap();
    assert_eq!(image.tracks.len(), NUM_TRACKS);
    assert!(image.tracks.iter().all(|t| t.len() == BYTES_PER_TRACK && t.iter().all(|&b| b == 0)));
    assert!(!image.write_protected);
    assert_eq!(image.volume_label(), "--occupied--");
}

#[test]
fn test_header_lines() {
    let text = "# comment\n\nCOMPUCOLOR VIRTUAL FLOPPY DISK IMAGE\n  write protect  \nLabel My Disk\n// note\nLabel second\n"
        .to_string()
        + &track_image(0xFF, 1)[MAGIC.len() + 1..];
    let image = DiskImage::parse(&text).unwrap();
    assert!(image.write_protected);
    assert_eq!(image.labels, vec!["My Disk".to_string(), "second".to_string()]);
}

#[test]
fn test_missing_tracks_are_unformatted() {
    let image = DiskImage::parse(&track_image(0x00, 3)).unwrap();
    assert_eq!(image.tracks.len(), NUM_TRACKS);
    assert!(image.tracks[3].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_hex_may_wrap_freely() {
    let mut text = String::from("Compucolor Virtual Floppy Disk Image\nTrack 0\n");
    text.push_str(&"AB".repeat(1000));
    text.push('\n');
    text.push_str(&"cd".repeat(920));
    text.push('\n');
    let image = DiskImage::parse(&text).unwrap();
    assert_eq!(image.tracks[0][999], 0xAB);
    assert_eq!(image.tracks[0][1000], 0xCD);
}

// ============ Rejections ============

#[test]
fn test_missing_magic() {
    assert_eq!(
        DiskImage::parse("Track 0\n"),
        Err(DiskImageError::MissingMagic { line: 1 })
    );
}

#[test]
fn test_track_out_of_sequence() {
    let text = track_image(0, 1) + "Track 2\n";
    assert!(matches!(
        DiskImage::parse(&text),
        Err(DiskImageError::TrackOutOfSequence { found: 2, expected: 1, .. })
    ));
}

#[test]
fn test_too_many_tracks() {
    let text = track_image(0, NUM_TRACKS + 1);
    assert!(matches!(
        DiskImage::parse(&text),
        Err(DiskImageError::TooManyTracks { track: 41, .. })
    ));
}

#[test]
fn test_short_track_before_next_header() {
    let text = "Compucolor Virtual Floppy Disk Image\nTrack 0\n00\nTrack 1\n";
    assert_eq!(
        DiskImage::parse(text),
        Err(DiskImageError::ShortBlock { line: 4, limit: BYTES_PER_TRACK })
    );
}

#[test]
fn test_short_track_at_end() {
    let text = "Compucolor Virtual Floppy Disk Image\nTrack 0\n0000\n";
    assert_eq!(
        DiskImage::parse(text),
        Err(DiskImageError::ShortBlock { line: 3, limit: BYTES_PER_TRACK })
    );
}

#[test]
fn test_too_much_data() {
    let text = "Compucolor Virtual Floppy Disk Image\nSector 0\n".to_string() + &"00".repeat(129) + "\n";
    assert_eq!(
        DiskImage::parse(&text),
        Err(DiskImageError::TooMuchData { line: 3, limit: SECTOR_SIZE })
    );
}

#[test]
fn test_odd_hex_digits() {
    let text = "Compucolor Virtual Floppy Disk Image\nTrack 0\n000\n";
    assert_eq!(DiskImage::parse(text), Err(DiskImageError::OddHexDigits { line: 3 }));
}

#[test]
fn test_bad_hex_is_unknown_line() {
    let text = "Compucolor Virtual Floppy Disk Image\nTrack 0\n00GG\n";
    assert_eq!(DiskImage::parse(text), Err(DiskImageError::UnknownLine { line: 3 }));
}

#[test]
fn test_data_before_header() {
    let text = "Compucolor Virtual Floppy Disk Image\n0000\n";
    assert_eq!(DiskImage::parse(text), Err(DiskImageError::DataOutsideBlock { line: 2 }));
}

#[test]
fn test_mixed_formats() {
    let text = sector_image(&[[0; SECTOR_SIZE]]) + "Track 0\n";
    assert!(matches!(DiskImage::parse(&text), Err(DiskImageError::MixedFormats { .. })));
}

#[test]
fn test_sector_out_of_sequence() {
    let text = "Compucolor Virtual Floppy Disk Image\nSector 1\n";
    assert!(matches!(
        DiskImage::parse(text),
        Err(DiskImageError::SectorOutOfSequence { found: 1, expected: 0, .. })
    ));
}

#[test]
fn test_all_addressable_sectors_parse() {
    let mut blocks = vec![[0u8; SECTOR_SIZE]; MAX_SECTORS];
    for (n, block) in blocks.iter_mut().enumerate() {
        block[0] = (n % 256) as u8;
        block[1] = (n / 256) as u8;
    }
    let disk = DiskImage::parse(&sector_image(&blocks)).unwrap();
    assert_eq!(disk.tracks.len(), NUM_TRACKS);

    let last_stored = disk.decode_sector(39, 9).unwrap();
    assert_eq!(&last_stored[..2], &[(399 % 256) as u8, 1]);
    // logical tracks 40-43 have nowhere to go
    assert_eq!(disk.decode_sector(40, 0), None);
    assert_eq!(disk.decode_sector(43, 9), None);
}

#[test]
fn test_sector_past_addressable_range() {
    let blocks = vec![[0u8; SECTOR_SIZE]; MAX_SECTORS + 1];
    assert!(matches!(
        DiskImage::parse(&sector_image(&blocks)),
        Err(DiskImageError::SectorOutOfRange { sector: 440, .. })
    ));
}

#[test]
fn test_empty_image() {
    assert!(matches!(
        DiskImage::parse("Compucolor Virtual Floppy Disk Image\n"),
        Err(DiskImageError::NoData { .. })
    ));
}

#[test]
fn test_error_messages_carry_line() {
    let err = DiskImage::parse("Compucolor Virtual Floppy Disk Image\nhello\n").unwrap_err();
    assert_eq!(err.to_string(), "line 2: unknown format");
}

// ============ Sector form ============

#[test]
fn test_crc16_reference() {
    // CRC-16/XMODEM check value
    assert_eq!(crc16(b"123456789"), 0x31C3);
    assert_eq!(crc16(&[]), 0);
}

#[test]
fn test_sector_form_decodes_back() {
    let mut sectors = Vec::new();
    for n in 0..25u8 {
        let mut data = [0u8; SECTOR_SIZE];
        for (i, b) in data.iter_mut().enumerate() {
            *b = n.wrapping_mul(7).wrapping_add(i as u8);
        }
        sectors.push(data);
    }
    let image = DiskImage::parse(&sector_image(&sectors)).unwrap();
    assert_eq!(image.tracks.len(), NUM_TRACKS);
    for (n, data) in sectors.iter().enumerate() {
        let decoded = image.decode_sector(n / 10, n % 10).unwrap();
        assert_eq!(&decoded[..], &data[..], "sector {}", n);
    }
    // unsupplied sectors read back as fill
    assert_eq!(image.decode_sector(2, 9).unwrap(), vec![0xE5; SECTOR_SIZE]);
    assert_eq!(image.decode_sector(30, 0).unwrap(), vec![0xE5; SECTOR_SIZE]);
}

#[test]
fn test_sector_interleave_order() {
    let image = DiskImage::parse(&sector_image(&[[0x11; SECTOR_SIZE]])).unwrap();
    // first header on physical track 1: gap, then 55 01 00
    let mut w = TrackWriter::new();
    w.gap(SECTOR_GAP_BITS);
    w.bytes(&[0x55, 0x01, INTERLEAVE[0]]);
    assert_eq!(&image.tracks[1][..w.pos / 8], &w.track[..w.pos / 8]);
    // second sector on the track is logical sector 3
    let second = SECTOR_GAP_BITS * 2 + 138 * 10;
    let mut w = TrackWriter::new();
    w.gap(second);
    w.bytes(&[0x55, 0x01, 3]);
    let span = second / 8..w.pos / 8;
    assert_eq!(&image.tracks[1][span.clone()], &w.track[span]);
}

#[test]
fn test_track_tail_is_gap() {
    let image = DiskImage::parse(&sector_image(&[[0; SECTOR_SIZE]])).unwrap();
    // 10 sectors of 1530 bits leave 60 bits, the last 7 whole bytes
    assert!(image.tracks[1][BYTES_PER_TRACK - 7..].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_volume_label() {
    let image = DiskImage::parse(&sector_image(&[directory_block(b"GAMES\x01DISK")])).unwrap();
    assert_eq!(image.volume_label(), "GAMESDISK");
}

#[test]
fn test_volume_label_requires_directory_block() {
    let mut block = directory_block(b"GAMES");
    block[2] = 0x40;
    let image = DiskImage::parse(&sector_image(&[block])).unwrap();
    assert_eq!(image.volume_label(), "--occupied--");
}

#[test]
fn test_blank_disk_has_no_sectors() {
    assert_eq!(DiskImage::blank().decode_sector(0, 0), None);
    assert_eq!(DiskImage::blank().volume_label(), "--occupied--");
}

// ============ Save ============

#[test]
fn test_to_text_layout() {
    let mut image = DiskImage::parse(&track_image(0xA5, NUM_TRACKS)).unwrap();
    image.write_protected = true;
    image.labels.push("vol".to_string());
    let text = image.to_text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], MAGIC);
    assert_eq!(lines[1], "Write Protect");
    assert_eq!(lines[2], "Label vol");
    assert_eq!(lines[3], "Track 0");
    assert_eq!(lines[4], "A5".repeat(32));
    assert_eq!(lines.len(), 3 + NUM_TRACKS * 61);
}

#[test]
fn test_saved_text_parses_to_same_image() {
    let image = DiskImage::parse(&sector_image(&[directory_block(b"SAVE")])).unwrap();
    assert_eq!(DiskImage::parse(&image.to_text()).unwrap(), image);
}
