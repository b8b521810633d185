use crate::write_files;
use rstest::rstest;
use zipcodec::{CompressionMethod, ErrorCategory, ErrorKind, ZipArchive, FLAG_UTF8};

/// Test filename UTF-8 flag behavior with various filenames
#[rstest]
#[case("file.txt", false)]
#[case("MixedCase123.TXT", false)]
#[case("with-dashes_and_underscores.txt", false)]
#[case("🦀🔥_rust_file.txt", true)]
#[case("テストファイル.txt", true)]
#[case("café.txt", true)]
#[case("file~backup.txt", true)] // Tilde character - UTF-8 flag (EUC-KR conflict)
#[case("path\\file.txt", false)] // stored as path/file.txt
#[case("normal-file_123.txt", false)]
#[case("test|file.txt", false)]
#[case("test}file.txt", false)]
fn test_filename_utf8_flag(#[case] filename: &str, #[case] should_have_utf8_flag: bool) {
    let output = write_files(&[(filename, b"test content")], CompressionMethod::Deflate, false);

    let flags = extract_flags_from_zip(&output);
    let utf8_flag_present = (flags & FLAG_UTF8) != 0;
    assert_eq!(
        utf8_flag_present, should_have_utf8_flag,
        "UTF-8 flag mismatch for filename '{}': expected {}, got {}",
        filename, should_have_utf8_flag, utf8_flag_present
    );

    // the central directory agrees with the local header
    let archive = ZipArchive::from_slice(&output).unwrap();
    let entry = &archive.entries()[0];
    assert_eq!(entry.is_utf8(), should_have_utf8_flag);
    assert_eq!(entry.name(), filename.replace('\\', "/"));
}

/// Test directory UTF-8 flag behavior with various directory names
#[rstest]
#[case("ascii_dir/", false)]
#[case("🦀🔥/", true)]
#[case("フォルダ/", true)]
#[case("dossier/", false)]
#[case("café_folder/", true)]
#[case("file~backup/", true)]
fn test_directory_utf8_flag(#[case] dirname: &str, #[case] should_have_utf8_flag: bool) {
    let output = write_files(&[(dirname, b"")], CompressionMethod::Store, false);

    let flags = extract_flags_from_zip(&output);
    let utf8_flag_present = (flags & FLAG_UTF8) != 0;
    assert_eq!(
        utf8_flag_present, should_have_utf8_flag,
        "UTF-8 flag mismatch for directory '{}': expected {}, got {}",
        dirname, should_have_utf8_flag, utf8_flag_present
    );

    let archive = ZipArchive::from_slice(&output).unwrap();
    assert_eq!(archive.entries()[0].name(), dirname);
    assert!(archive.entries()[0].is_dir());
}

/// Names without the flag are code page 437
#[test]
fn test_unflagged_name_decodes_as_cp437() {
    let mut output = write_files(&[("cafX.txt", b"menu")], CompressionMethod::Store, false);
    assert_eq!(extract_flags_from_zip(&output) & FLAG_UTF8, 0);

    // 0x82 is é in code page 437
    replace_all(&mut output, b"cafX.txt", b"caf\x82.txt");

    let archive = ZipArchive::from_slice(&output).unwrap();
    let entry = &archive.entries()[0];
    assert!(!entry.is_utf8());
    assert_eq!(entry.name(), "café.txt");
    assert!(archive.get_entry("café.txt").is_some());
    assert_eq!(crate::read_all(&archive).unwrap()[0].1, b"menu");
}

/// Box drawing and greek letters from the upper half of the code page
#[test]
fn test_cp437_upper_half() {
    let mut output = write_files(&[("XXXX", b"")], CompressionMethod::Store, false);
    replace_all(&mut output, b"XXXX", &[0xc9, 0xcd, 0xe0, 0xe1]);

    let archive = ZipArchive::from_slice(&output).unwrap();
    assert_eq!(archive.entries()[0].name(), "╔═αß");
}

/// A flagged name that is not valid UTF-8 fails to open
#[test]
fn test_invalid_utf8_with_flag() {
    let mut output = write_files(&[("café.txt", b"menu")], CompressionMethod::Store, false);
    replace_all(&mut output, "café.txt".as_bytes(), b"caf\xff\xfe.txt");

    let err = ZipArchive::from_slice(&output).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidUtf8(_)), "{:?}", err);
    assert_eq!(err.category(), ErrorCategory::Format);
}

/// Test that UTF-8 names written by the zip crate are decoded
#[test]
fn test_utf8_name_from_zip_crate() {
    use std::io::Write;

    let mut output = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut output);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file("日本語/ファイル.txt", options).unwrap();
        zip.write_all(b"konnichiwa").unwrap();
        zip.finish().unwrap();
    }

    let data = output.into_inner();
    let archive = ZipArchive::from_slice(&data).unwrap();
    let entry = archive.get_entry("日本語/ファイル.txt").unwrap();
    assert!(entry.is_utf8());
    assert_eq!(crate::read_all(&archive).unwrap()[0].1, b"konnichiwa");
}

fn replace_all(data: &mut [u8], needle: &[u8], replacement: &[u8]) {
    assert_eq!(needle.len(), replacement.len());
    let mut found = 0;
    let mut i = 0;
    while i + needle.len() <= data.len() {
        if &data[i..i + needle.len()] == needle {
            data[i..i + needle.len()].copy_from_slice(replacement);
            found += 1;
            i += needle.len();
        } else {
            i += 1;
        }
    }

    // local header and central directory
    assert_eq!(found, 2);
}

/// Helper function to extract the general purpose bit flags from the first local file header
fn extract_flags_from_zip(zip_data: &[u8]) -> u16 {
    let signature = u32::from_le_bytes([zip_data[0], zip_data[1], zip_data[2], zip_data[3]]);
    if signature != 0x04034b50 {
        panic!("Invalid local file header signature: 0x{:x}", signature);
    }

    u16::from_le_bytes([zip_data[6], zip_data[7]])
}
