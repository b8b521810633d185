use crate::{read_all, write_files};
use rstest::rstest;
use std::io::Read;
use zipcodec::{
    extract_archive_to_callback, CompressionMethod, Error, ErrorCategory, ErrorKind, ReaderAt,
    ZipArchive,
};

const FILES: &[(&str, &[u8])] = &[
    ("a.txt", b"The quick brown fox jumps over the lazy dog"),
    ("b.txt", b"Pack my box with five dozen liquor jugs"),
];

fn read_entry<R: ReaderAt>(archive: &ZipArchive<R>, index: usize) -> Result<Vec<u8>, Error> {
    let mut content = Vec::new();
    archive
        .open_read_stream(&archive.entries()[index])?
        .read_to_end(&mut content)?;
    Ok(content)
}

fn central_dir_offset(data: &[u8]) -> usize {
    let archive = ZipArchive::from_slice(data).unwrap();
    archive.end_of_central_directory().central_dir_offset() as usize
}

fn set_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn set_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[rstest]
fn test_flipped_content_byte(#[values(false, true)] seekable: bool) {
    let mut data = write_files(FILES, CompressionMethod::Store, seekable);

    // first content byte follows the 30 byte header and the 5 byte name
    data[35] ^= 0x20;

    let archive = ZipArchive::from_slice(&data).unwrap();
    let err = read_entry(&archive, 0).unwrap_err();
    assert!(
        matches!(err.kind(), ErrorKind::InvalidChecksum { .. }),
        "{:?}",
        err
    );
    assert_eq!(err.category(), ErrorCategory::CorruptEntry);

    // the other entry is still readable
    assert_eq!(read_entry(&archive, 1).unwrap(), FILES[1].1);
}

#[test]
fn test_corrupt_deflate_stream_fails() {
    let mut data = write_files(FILES, CompressionMethod::Deflate, false);
    for byte in &mut data[35..40] {
        *byte = 0xff;
    }

    let archive = ZipArchive::from_slice(&data).unwrap();
    assert!(read_entry(&archive, 0).is_err());
    assert_eq!(read_entry(&archive, 1).unwrap(), FILES[1].1);
}

#[rstest]
#[case::missing_eocd_tail(10)]
#[case::missing_whole_eocd(22)]
#[case::half(200)]
fn test_truncated_input(#[case] cut: usize) {
    let data = write_files(FILES, CompressionMethod::Deflate, false);
    let err = ZipArchive::from_slice(&data[..data.len() - cut]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::TruncatedArchive, "{:?}", err);
}

#[test]
fn test_central_directory_past_end() {
    let mut data = write_files(FILES, CompressionMethod::Store, false);
    let eocd = data.len() - 22;
    let offset = central_dir_offset(&data) as u32;
    set_u32(&mut data, eocd + 16, offset + 1000);

    let err = ZipArchive::from_slice(&data).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::TruncatedArchive);
}

#[rstest]
#[case(1)]
#[case(3)]
fn test_declared_count_mismatch(#[case] declared: u16) {
    let mut data = write_files(FILES, CompressionMethod::Store, false);
    let eocd = data.len() - 22;
    set_u16(&mut data, eocd + 8, declared);
    set_u16(&mut data, eocd + 10, declared);

    let err = ZipArchive::from_slice(&data).unwrap_err();
    assert!(
        matches!(
            err.kind(),
            ErrorKind::EntryCountMismatch { expected, .. } if *expected == u64::from(declared)
        ),
        "{:?}",
        err
    );
    assert_eq!(err.category(), ErrorCategory::CorruptArchive);
}

#[test]
fn test_bad_local_header_signature() {
    let mut data = write_files(FILES, CompressionMethod::Store, true);
    data[0] = b'X';

    // the central directory is intact, so the archive opens
    let archive = ZipArchive::from_slice(&data).unwrap();
    let err = read_entry(&archive, 0).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidSignature { .. }));
    assert_eq!(err.category(), ErrorCategory::Format);
    assert_eq!(read_entry(&archive, 1).unwrap(), FILES[1].1);
}

#[test]
fn test_unsupported_method() {
    let mut data = write_files(FILES, CompressionMethod::Store, true);
    let directory = central_dir_offset(&data);

    // LZMA in both headers
    set_u16(&mut data, 8, 14);
    set_u16(&mut data, directory + 10, 14);

    let archive = ZipArchive::from_slice(&data).unwrap();
    let entry = &archive.entries()[0];
    assert_eq!(entry.method_id(), 14);
    let err = entry.compression_method().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::UnsupportedMethod);

    let err = read_entry(&archive, 0).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnsupportedMethod(14)));
    assert_eq!(read_entry(&archive, 1).unwrap(), FILES[1].1);
}

#[rstest]
#[case::smaller(10)]
#[case::larger(100)]
fn test_wrong_uncompressed_size(#[case] declared: u32) {
    let mut data = write_files(FILES, CompressionMethod::Deflate, true);
    let directory = central_dir_offset(&data);
    set_u32(&mut data, directory + 24, declared);

    let archive = ZipArchive::from_slice(&data).unwrap();
    assert_eq!(archive.entries()[0].uncompressed_size(), u64::from(declared));
    let err = read_entry(&archive, 0).unwrap_err();
    assert!(
        matches!(err.kind(), ErrorKind::InvalidSize { expected, .. } if *expected == u64::from(declared)),
        "{:?}",
        err
    );
    assert_eq!(err.category(), ErrorCategory::CorruptEntry);
}

#[test]
fn test_data_descriptor_crc_mismatch() {
    let mut data = write_files(FILES, CompressionMethod::Store, false);
    let archive = ZipArchive::from_slice(&data).unwrap();
    let entry = archive.entries()[0].clone();
    assert!(entry.has_data_descriptor());
    drop(archive);

    // the descriptor follows the content: signature, then the CRC-32
    let descriptor = 35 + entry.compressed_size() as usize;
    assert_eq!(&data[descriptor..descriptor + 4], &0x08074b50u32.to_le_bytes());
    set_u32(&mut data, descriptor + 4, 0xdeadbeef);

    let archive = ZipArchive::from_slice(&data).unwrap();
    let err = read_entry(&archive, 0).unwrap_err();
    assert!(
        matches!(
            err.kind(),
            ErrorKind::InvalidChecksum { expected: 0xdeadbeef, actual } if *actual == entry.crc32()
        ),
        "{:?}",
        err
    );
}

#[test]
fn test_corruption_stops_bulk_extraction() {
    let mut data = write_files(FILES, CompressionMethod::Store, false);
    data[35] ^= 0x20;

    let archive = ZipArchive::from_slice(&data).unwrap();
    let mut seen = Vec::new();
    let err = extract_archive_to_callback(&archive, |entry, _| {
        seen.push(entry.name().to_string());
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::CorruptEntry);
    assert_eq!(seen, vec!["a.txt"]);
}

#[test]
fn test_intact_archive_reads() {
    let data = write_files(FILES, CompressionMethod::Deflate, false);
    let archive = ZipArchive::from_slice(&data).unwrap();
    let files = read_all(&archive).unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].1, FILES[0].1);
}
