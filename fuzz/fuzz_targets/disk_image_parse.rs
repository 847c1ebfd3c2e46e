#![no_main]

use compucolor::DiskImage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(image) = DiskImage::parse(text) {
        // anything accepted must survive a save and reload unchanged
        let saved = image.to_text();
        let reloaded = DiskImage::parse(&saved).expect("saved image must parse");
        assert_eq!(reloaded.tracks, image.tracks);
        assert_eq!(reloaded.write_protected, image.write_protected);
        let _ = image.volume_label();
    }
});
