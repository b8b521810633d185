use rstest::rstest;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use zipcodec::{
    crc32, CentralDirectoryHeader, CentralDirectoryHeaderFixed, CompressionMethod,
    EndOfCentralDirectoryRecord, EndOfCentralDirectoryRecordFixed, ErrorKind, LocalFileHeader,
    LocalFileHeaderFixed, ReaderAt, ZipArchive, ZipArchiveWriter, ZipDateTime,
    Zip64EndOfCentralDirectoryLocator, Zip64EndOfCentralDirectoryRecord, Zip64ExtraField,
};

// ZIP64 signatures to check for
const ZIP64_EOCD_SIGNATURE: u32 = 0x06064b50;
const ZIP64_EOCD_LOCATOR_SIGNATURE: u32 = 0x07064b50;

/// Helper function to check if ZIP64 structures are present in the archive
fn contains_zip64_signatures(data: &[u8]) -> bool {
    let zip64_eocd_sig_bytes = ZIP64_EOCD_SIGNATURE.to_le_bytes();
    let zip64_locator_sig_bytes = ZIP64_EOCD_LOCATOR_SIGNATURE.to_le_bytes();

    let has_eocd = data.windows(4).any(|w| w == zip64_eocd_sig_bytes);
    let has_locator = data.windows(4).any(|w| w == zip64_locator_sig_bytes);

    has_eocd && has_locator
}

fn verify_expected_entries(data: &[u8], expected_count: u64) {
    // Verify with slice
    let read_archive = ZipArchive::from_slice(data).unwrap();
    assert_eq!(read_archive.end_of_central_directory().total_entries(), expected_count);
    assert_eq!(read_archive.entries().len(), expected_count as usize);
    let last = format!("file_{:05}.txt", expected_count - 1);
    assert!(read_archive.get_entry(&last).is_some());

    // Verify with reader
    let read_archive = ZipArchive::from_seekable(Cursor::new(data)).unwrap();
    assert_eq!(read_archive.entries().len(), expected_count as usize);
    let entry = read_archive.get_entry(&last).unwrap();
    let mut content = Vec::new();
    read_archive
        .open_read_stream(entry)
        .unwrap()
        .read_to_end(&mut content)
        .unwrap();
    assert_eq!(content, b"x");
}

/// Test ZIP64 threshold behavior with different entry counts
#[rstest]
#[case(65534, false)]
#[case(65535, true)]
#[case(65536, true)]
fn test_zip64_threshold_entries(#[case] entry_count: usize, #[case] should_be_zip64: bool) {
    let mut archive = ZipArchiveWriter::new(Vec::new());

    for i in 0..entry_count {
        let filename = format!("file_{:05}.txt", i);
        let handle = archive
            .add_entry(&filename, ZipDateTime::default(), CompressionMethod::Store)
            .unwrap();
        let mut writer = handle.open_write_stream(&mut archive).unwrap();
        writer.write_all(b"x").unwrap();
        writer.close().unwrap();
    }

    let data = archive.finish().unwrap();

    // Verify ZIP64 signatures presence matches expectation
    let has_zip64 = contains_zip64_signatures(&data);
    assert_eq!(
        has_zip64, should_be_zip64,
        "{} entries expected zip64: {}",
        entry_count, should_be_zip64
    );

    let read_archive = ZipArchive::from_slice(&data).unwrap();
    let eocd = read_archive.end_of_central_directory();
    assert_eq!(eocd.is_zip64(), should_be_zip64);
    if should_be_zip64 {
        assert_eq!(eocd.record().fixed.total_entries, u16::MAX);
        assert_eq!(eocd.record().fixed.entries_on_disk, u16::MAX);
        let zip64 = eocd.zip64().unwrap();
        assert_eq!(zip64.version_needed, 45);
        assert_eq!(zip64.record_size, Zip64EndOfCentralDirectoryRecord::RECORD_SIZE);
    } else {
        assert_eq!(eocd.record().fixed.total_entries, entry_count as u16);
    }

    verify_expected_entries(&data, entry_count as u64);
}

/// An archive whose single entry stores its sizes and offset in a Zip64
/// extra field, with Zip64 end records. `prefix` is prepended verbatim and
/// not accounted for in any offset.
fn zip64_archive(prefix: &[u8], content: &[u8]) -> Vec<u8> {
    let mut out = prefix.to_vec();
    let base = out.len();
    let crc = crc32(content);
    let size = content.len() as u64;

    let mut local_extra = Vec::new();
    Zip64ExtraField {
        uncompressed_size: Some(size),
        compressed_size: Some(size),
        ..Default::default()
    }
    .write_to(&mut local_extra)
    .unwrap();
    LocalFileHeader {
        fixed: LocalFileHeaderFixed {
            version_needed: 45,
            crc32: crc,
            compressed_size: u32::MAX,
            uncompressed_size: u32::MAX,
            ..Default::default()
        },
        file_name: b"big.txt".to_vec(),
        extra_field: local_extra,
    }
    .write_to(&mut out)
    .unwrap();
    out.extend_from_slice(content);

    let directory_offset = (out.len() - base) as u64;
    let mut central_extra = Vec::new();
    Zip64ExtraField {
        uncompressed_size: Some(size),
        compressed_size: Some(size),
        local_header_offset: Some(0),
        disk_start: None,
    }
    .write_to(&mut central_extra)
    .unwrap();
    CentralDirectoryHeader {
        fixed: CentralDirectoryHeaderFixed {
            version_made_by: 45,
            version_needed: 45,
            crc32: crc,
            compressed_size: u32::MAX,
            uncompressed_size: u32::MAX,
            local_header_offset: u32::MAX,
            ..Default::default()
        },
        file_name: b"big.txt".to_vec(),
        extra_field: central_extra,
        file_comment: Vec::new(),
    }
    .write_to(&mut out)
    .unwrap();
    let directory_size = (out.len() - base) as u64 - directory_offset;

    let zip64_offset = (out.len() - base) as u64;
    Zip64EndOfCentralDirectoryRecord {
        record_size: Zip64EndOfCentralDirectoryRecord::RECORD_SIZE,
        version_made_by: 45,
        version_needed: 45,
        entries_on_disk: 1,
        total_entries: 1,
        central_dir_size: directory_size,
        central_dir_offset: directory_offset,
        ..Default::default()
    }
    .write_to(&mut out)
    .unwrap();
    Zip64EndOfCentralDirectoryLocator {
        eocd_disk: 0,
        directory_offset: zip64_offset,
        total_disks: 1,
    }
    .write_to(&mut out)
    .unwrap();
    EndOfCentralDirectoryRecord {
        fixed: EndOfCentralDirectoryRecordFixed {
            entries_on_disk: u16::MAX,
            total_entries: u16::MAX,
            central_dir_size: u32::MAX,
            central_dir_offset: u32::MAX,
            ..Default::default()
        },
        comment: Vec::new(),
    }
    .write_to(&mut out)
    .unwrap();

    out
}

#[test]
fn test_zip64_extra_field_resolves_sizes() {
    let data = zip64_archive(b"", b"hello zip64");
    let archive = ZipArchive::from_slice(&data).unwrap();
    assert!(archive.end_of_central_directory().is_zip64());
    assert_eq!(archive.base_offset(), 0);

    let entry = archive.get_entry("big.txt").unwrap();
    assert_eq!(entry.uncompressed_size(), 11);
    assert_eq!(entry.compressed_size(), 11);
    assert_eq!(entry.local_header_offset(), 0);

    let mut content = Vec::new();
    archive
        .open_read_stream(entry)
        .unwrap()
        .read_to_end(&mut content)
        .unwrap();
    assert_eq!(content, b"hello zip64");
}

/// The locator's offset ignores prepended data, so the record is found
/// right before the locator instead
#[test]
fn test_zip64_with_prepended_data() {
    let prefix = b"#!/bin/sh\necho self extracting\nexit 0\n";
    let data = zip64_archive(prefix, b"payload");

    let archive = ZipArchive::from_slice(&data).unwrap();
    assert!(archive.end_of_central_directory().is_zip64());
    assert_eq!(archive.base_offset(), prefix.len() as u64);
    assert_eq!(crate::read_all(&archive).unwrap()[0].1, b"payload");
}

#[test]
fn test_zip64_missing_locator() {
    let mut data = zip64_archive(b"", b"payload");

    // corrupt the locator signature, 20 bytes before the 22 byte EOCD
    let locator = data.len() - 22 - 20;
    data[locator] ^= 0xff;

    let err = ZipArchive::from_slice(&data).unwrap_err();
    assert!(
        matches!(err.kind(), ErrorKind::MissingZip64EndOfCentralDirectory),
        "{:?}",
        err
    );
}

#[test]
fn test_zip64_missing_record() {
    let mut data = zip64_archive(b"", b"payload");

    // corrupt the zip64 record signature, right before the locator
    let record = data.len() - 22 - 20 - 56;
    data[record] ^= 0xff;

    let err = ZipArchive::from_slice(&data).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::MissingZip64EndOfCentralDirectory
    ));
}

/// Entries below every threshold carry no Zip64 extra field
#[test]
fn test_small_entry_has_no_zip64_extra() {
    let data = crate::write_files(
        &[("small.txt", b"small"), ("dir/", b"")],
        CompressionMethod::Deflate,
        false,
    );
    assert!(!contains_zip64_signatures(&data));

    let archive = ZipArchive::from_slice(&data).unwrap();
    let mut offset = archive.end_of_central_directory().central_dir_offset() as usize;
    let mut versions = Vec::new();
    for _ in archive.entries() {
        let header = CentralDirectoryHeader::parse(&data[offset..]).unwrap();
        assert!(header.extra_field.is_empty());
        versions.push(header.fixed.version_needed);
        offset += header.record_len();
    }
    assert_eq!(versions, vec![20, 20]);
}

/// Some writers add Zip64 end records once the central directory passes
/// 2 GiB but only sentinel the classic record past 4 GiB. The Zip64 records
/// sit between the central directory and an ordinary looking EOCD.
#[test]
fn test_zip64_records_behind_plain_eocd() {
    let original = crate::write_files(&[("a.txt", b"alpha")], CompressionMethod::Store, true);
    let eocd_at = original.len() - EndOfCentralDirectoryRecordFixed::SIZE;
    let eocd = EndOfCentralDirectoryRecord::parse(&original[eocd_at..]).unwrap();
    assert!(!eocd.fixed.is_sentineled());

    let mut data = original[..eocd_at].to_vec();
    let zip64_offset = data.len() as u64;
    Zip64EndOfCentralDirectoryRecord {
        record_size: Zip64EndOfCentralDirectoryRecord::RECORD_SIZE,
        version_made_by: 45,
        version_needed: 45,
        entries_on_disk: 1,
        total_entries: 1,
        central_dir_size: u64::from(eocd.fixed.central_dir_size),
        central_dir_offset: u64::from(eocd.fixed.central_dir_offset),
        ..Default::default()
    }
    .write_to(&mut data)
    .unwrap();
    Zip64EndOfCentralDirectoryLocator {
        eocd_disk: 0,
        directory_offset: zip64_offset,
        total_disks: 1,
    }
    .write_to(&mut data)
    .unwrap();
    data.extend_from_slice(&original[eocd_at..]);

    let archive = ZipArchive::from_slice(&data).unwrap();
    assert!(archive.end_of_central_directory().is_zip64());
    assert_eq!(archive.base_offset(), 0);
    let files = crate::read_all(&archive).unwrap();
    assert_eq!(files, vec![("a.txt".to_string(), b"alpha".to_vec())]);

    // the same layout after a stub
    let mut stubbed = b"MZ stub".to_vec();
    stubbed.extend_from_slice(&data);
    let archive = ZipArchive::from_slice(&stubbed).unwrap();
    assert_eq!(archive.base_offset(), 7);
    assert_eq!(crate::read_all(&archive).unwrap(), files);
}

const HEAD_LEN: u64 = 64 * 1024;
const TAIL_LEN: usize = 1024 * 1024;

/// Output standing in for a multi gigabyte archive whose content is all
/// zeros: only the first and the last bytes written are kept, anything in
/// between reads back as zero.
#[derive(Debug, Default)]
struct SparseSink {
    head: Vec<u8>,
    tail: Vec<u8>,
    tail_start: u64,
    len: u64,
    pos: u64,
}

impl SparseSink {
    fn store(region: &mut Vec<u8>, region_start: u64, pos: u64, data: &[u8]) {
        let end = pos + data.len() as u64;
        let region_end = region_start + region.len() as u64;
        let from = pos.max(region_start);
        let to = end.min(region_end);
        if from < to {
            let dst = (from - region_start) as usize..(to - region_start) as usize;
            let src = (from - pos) as usize..(to - pos) as usize;
            region[dst].copy_from_slice(&data[src]);
        }
    }
}

impl Write for SparseSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let end = self.pos + buf.len() as u64;
        if self.pos < HEAD_LEN {
            let head_end = end.min(HEAD_LEN) as usize;
            if self.head.len() < head_end {
                self.head.resize(head_end, 0);
            }
            Self::store(&mut self.head, 0, self.pos, buf);
        }

        if self.pos == self.len {
            self.tail.extend_from_slice(buf);
            if self.tail.len() > 2 * TAIL_LEN {
                let dropped = self.tail.len() - TAIL_LEN;
                self.tail.drain(..dropped);
                self.tail_start += dropped as u64;
            }
        } else {
            assert!(end <= self.len, "rewrites stay within the output");
            Self::store(&mut self.tail, self.tail_start, self.pos, buf);
        }

        self.pos = end;
        self.len = self.len.max(end);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for SparseSink {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        self.pos = target.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "seek before start")
        })?;
        Ok(self.pos)
    }
}

impl ReaderAt for SparseSink {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }

        let available = usize::try_from(self.len - offset).unwrap_or(usize::MAX);
        let len = buf.len().min(available);
        if offset < self.head.len() as u64 {
            let start = offset as usize;
            let n = len.min(self.head.len() - start);
            buf[..n].copy_from_slice(&self.head[start..start + n]);
            Ok(n)
        } else if offset >= self.tail_start {
            let start = (offset - self.tail_start) as usize;
            buf[..len].copy_from_slice(&self.tail[start..start + len]);
            Ok(len)
        } else {
            let gap = usize::try_from(self.tail_start - offset).unwrap_or(usize::MAX);
            let n = len.min(gap);
            buf[..n].fill(0);
            Ok(n)
        }
    }
}

#[test]
fn test_sparse_sink_reads_back() {
    let mut sink = SparseSink::default();
    let content: Vec<u8> = (0..200u8).collect();
    sink.write_all(&content).unwrap();
    sink.seek(SeekFrom::Start(10)).unwrap();
    sink.write_all(b"xyz").unwrap();
    sink.seek(SeekFrom::End(0)).unwrap();
    sink.write_all(b"end").unwrap();

    let mut expected = content.clone();
    expected[10..13].copy_from_slice(b"xyz");
    expected.extend_from_slice(b"end");
    let mut actual = vec![0u8; expected.len()];
    sink.read_exact_at(&mut actual, 0).unwrap();
    assert_eq!(actual, expected);
}

/// Writes an entry of 4 GiB + 1 zero bytes. Takes a while, run with
/// `cargo test --release -- --ignored`.
#[rstest]
#[ignore]
fn test_write_entry_over_4_gib(#[values(false, true)] seekable: bool) {
    const SIZE: u64 = 0x1_0000_0001;
    let name = "zeros.bin";

    fn write_zeros(stream: &mut dyn Write, size: u64) {
        let chunk = vec![0u8; 1024 * 1024];
        let mut remaining = size;
        while remaining > 0 {
            let n = remaining.min(chunk.len() as u64) as usize;
            stream.write_all(&chunk[..n]).unwrap();
            remaining -= n as u64;
        }
    }

    let (sink, written) = if seekable {
        let mut writer = ZipArchiveWriter::new_seekable(SparseSink::default()).unwrap();
        let handle = writer
            .add_entry(name, ZipDateTime::default(), CompressionMethod::Store)
            .unwrap();
        let mut stream = handle.open_write_stream(&mut writer).unwrap();
        write_zeros(&mut stream, SIZE);
        let written = stream.close().unwrap();
        (writer.finish().unwrap(), written)
    } else {
        let mut writer = ZipArchiveWriter::new(SparseSink::default());
        let handle = writer
            .add_entry(name, ZipDateTime::default(), CompressionMethod::Store)
            .unwrap();
        let mut stream = handle.open_write_stream(&mut writer).unwrap();
        write_zeros(&mut stream, SIZE);
        let written = stream.close().unwrap();
        (writer.finish().unwrap(), written)
    };

    assert_eq!(written.uncompressed_size(), SIZE);
    assert_eq!(written.compressed_size(), SIZE);
    assert!(written.has_data_descriptor());
    assert_eq!(written.version_needed(), 45);

    // the local header never declares sentinels it can't back with a
    // zip64 extra field: crc and sizes are left to the descriptor
    let mut head = vec![0u8; LocalFileHeaderFixed::SIZE + name.len()];
    sink.read_exact_at(&mut head, 0).unwrap();
    let header = LocalFileHeader::parse(&head).unwrap();
    assert_eq!(header.fixed.flags & 0x08, 0x08);
    assert_eq!(header.fixed.crc32, 0);
    assert_eq!(header.fixed.compressed_size, 0);
    assert_eq!(header.fixed.uncompressed_size, 0);
    assert_eq!(header.fixed.extra_field_len, 0);
    let expected_version = if seekable { 45 } else { 10 };
    assert_eq!(header.fixed.version_needed, expected_version);

    // a 24 byte descriptor with 8 byte sizes follows the content
    let descriptor_at = head.len() as u64 + SIZE;
    let mut descriptor = [0u8; 24];
    sink.read_exact_at(&mut descriptor, descriptor_at).unwrap();
    assert_eq!(&descriptor[..4], &0x08074b50u32.to_le_bytes());
    assert_eq!(&descriptor[4..8], &written.crc32().to_le_bytes());
    assert_eq!(&descriptor[8..16], &SIZE.to_le_bytes());
    assert_eq!(&descriptor[16..24], &SIZE.to_le_bytes());

    let len = sink.len;
    let archive = ZipArchive::from_reader_at(&sink, len).unwrap();
    let eocd = archive.end_of_central_directory();
    assert!(eocd.is_zip64());
    assert_eq!(eocd.central_dir_offset(), descriptor_at + 24);
    assert_eq!(eocd.zip64().unwrap().version_needed, 45);

    let entry = &archive.entries()[0];
    assert_eq!(entry, &written);
    assert_eq!(entry.uncompressed_size(), SIZE);

    // the central directory carries the exact sizes in its zip64 extra field
    let mut directory = vec![0u8; eocd.central_dir_size() as usize];
    sink.read_exact_at(&mut directory, eocd.central_dir_offset()).unwrap();
    let central = CentralDirectoryHeader::parse(&directory).unwrap();
    assert_eq!(central.fixed.version_needed, 45);
    assert_eq!(central.fixed.compressed_size, u32::MAX);
    assert_eq!(central.fixed.uncompressed_size, u32::MAX);
    assert_eq!(central.fixed.local_header_offset, 0);
    let extra = zipcodec::find_zip64_extra_field(&central.extra_field).unwrap();
    let zip64 = Zip64ExtraField::parse(extra, true, true, false, false).unwrap();
    assert_eq!(zip64.uncompressed_size, Some(SIZE));
    assert_eq!(zip64.compressed_size, Some(SIZE));
}
