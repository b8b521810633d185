#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Read;

fuzz_target!(|data: &[u8]| {
    let Ok(archive) = zipcodec::ZipArchive::from_seekable(std::io::Cursor::new(data)) else {
        return;
    };

    let mut buf = vec![0u8; 64 * 1024];
    for entry in archive.entries() {
        let _name = entry.sanitized_name();
        let _ = entry.version_needed();
        let Ok(mut reader) = archive.open_read_stream(entry) else {
            continue;
        };

        // at most 16 MiB per entry
        let mut total = 0usize;
        while let Ok(read) = reader.read(&mut buf) {
            total += read;
            if read == 0 || total > 16 * 1024 * 1024 {
                break;
            }
        }
    }

    // the same bytes through the slice path must agree on the entry count
    if let Ok(other) = zipcodec::ZipArchive::from_slice(data) {
        assert_eq!(other.entries().len(), archive.entries().len());
    }
});
