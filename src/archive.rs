use crate::entry::ArchiveEntry;
use crate::errors::{Error, ErrorKind};
use crate::locator::{ZipLocation, ZipLocator};
use crate::method::Decompressor;
use crate::reader_at::{FileReader, MutexReader, RangeReader, ReaderAt};
use crate::records::{
    CentralDirectoryHeader, CentralDirectoryHeaderFixed, DataDescriptor, EndOfCentralDirectory,
    LocalFileHeaderFixed,
};
use crate::tracker::ChecksumTracker;
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::io::{Read, Seek};

/// A parsed archive over a random access container.
///
/// Opening an archive reads the whole central directory up front, so the
/// entry list and name lookups never touch the container again. Only
/// [`ZipArchive::open_read_stream`] reads entry data.
///
/// ```
/// # use zipcodec::{CompressionMethod, ZipArchive, ZipArchiveWriter};
/// # use std::io::{Read, Write};
/// let mut writer = ZipArchiveWriter::builder().build(Vec::new());
/// let handle = writer.add_entry("hello.txt", Default::default(), CompressionMethod::Deflate).unwrap();
/// let mut stream = handle.open_write_stream(&mut writer).unwrap();
/// stream.write_all(b"Hello, world!").unwrap();
/// stream.close().unwrap();
/// let data = writer.finish().unwrap();
///
/// let archive = ZipArchive::from_slice(&data).unwrap();
/// let entry = archive.get_entry("hello.txt").unwrap();
/// let mut content = String::new();
/// archive.open_read_stream(entry).unwrap().read_to_string(&mut content).unwrap();
/// assert_eq!(content, "Hello, world!");
/// ```
#[derive(Debug)]
pub struct ZipArchive<R> {
    reader: Option<R>,
    eocd: EndOfCentralDirectory,
    base_offset: u64,
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

impl ZipArchive<()> {
    pub fn with_max_search_space(max_search_space: u64) -> ZipLocator {
        ZipLocator::new().max_search_space(max_search_space)
    }

    pub fn from_slice(data: &[u8]) -> Result<ZipArchive<&[u8]>, Error> {
        ZipLocator::new().locate_in_slice(data)
    }

    pub fn from_file(file: std::fs::File) -> Result<ZipArchive<FileReader>, Error> {
        ZipLocator::new().locate_in_file(file)
    }

    pub fn from_seekable<R>(reader: R) -> Result<ZipArchive<MutexReader<R>>, Error>
    where
        R: Read + Seek,
    {
        ZipLocator::new().locate_in_seekable(reader)
    }

    /// Opens `len` bytes of any [`ReaderAt`]
    pub fn from_reader_at<R>(reader: R, len: u64) -> Result<ZipArchive<R>, Error>
    where
        R: ReaderAt,
    {
        ZipLocator::new().locate_in_reader(reader, len)
    }
}

impl<R> ZipArchive<R>
where
    R: ReaderAt,
{
    pub(crate) fn from_location(
        reader: R,
        len: u64,
        location: ZipLocation,
    ) -> Result<ZipArchive<R>, Error> {
        let eocd = location.eocd;
        let directory_size = eocd.central_dir_size();
        let directory_offset = eocd.central_dir_offset();
        let declared = eocd.total_entries();

        // Whatever precedes the declared start of the archive is prepended
        // data, e.g. a self-extracting stub
        let base_offset = location
            .directory_end
            .checked_sub(directory_size)
            .and_then(|start| start.checked_sub(directory_offset))
            .ok_or_else(|| Error::from(ErrorKind::Eof))?;
        let directory_start = base_offset + directory_offset;
        if directory_start + directory_size > len {
            return Err(Error::from(ErrorKind::Eof));
        }

        // Each record takes at least its fixed part, so a count that can't fit
        // is caught before allocating for it
        let min_size = declared.saturating_mul(CentralDirectoryHeaderFixed::SIZE as u64);
        if min_size > directory_size {
            return Err(Error::from(ErrorKind::EntryCountMismatch {
                expected: declared,
                actual: directory_size / CentralDirectoryHeaderFixed::SIZE as u64,
            }));
        }

        let directory_len = usize::try_from(directory_size)
            .map_err(|_| Error::malformed("central directory does not fit in memory"))?;
        let mut directory = vec![0u8; directory_len];
        read_exact_at(&reader, &mut directory, directory_start)?;

        let entries = parse_central_directory(&directory, declared)?;
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            trace!(
                "central directory entry {}: {} ({} bytes at {})",
                i,
                entry.name(),
                entry.compressed_size(),
                entry.local_header_offset()
            );
            index.entry(entry.name().to_string()).or_insert(i);
        }

        debug!(
            "opened archive: {} entries, zip64: {}, base offset: {}",
            entries.len(),
            eocd.is_zip64(),
            base_offset
        );

        Ok(ZipArchive {
            reader: Some(reader),
            eocd,
            base_offset,
            entries,
            index,
        })
    }

    /// Opens a decompressing, verifying stream over the content of `entry`.
    ///
    /// The container grants independent cursors, so streams of several
    /// entries may be open at the same time.
    pub fn open_read_stream(&self, entry: &ArchiveEntry) -> Result<ZipEntryReader<'_, R>, Error> {
        let reader = self.reader.as_ref().ok_or(ErrorKind::Closed)?;
        let method = entry.compression_method()?;

        let header_offset = self
            .base_offset
            .checked_add(entry.local_header_offset())
            .ok_or_else(|| Error::malformed("local header offset overflows"))?;
        let mut buffer = [0u8; LocalFileHeaderFixed::SIZE];
        read_exact_at(reader, &mut buffer, header_offset)?;

        // The central directory is the source of truth, the local header is
        // only consulted for its signature and the length to skip
        let header = LocalFileHeaderFixed::parse(&buffer)?;
        let body_offset = header_offset
            + LocalFileHeaderFixed::SIZE as u64
            + header.variable_length() as u64;
        let body_end = body_offset
            .checked_add(entry.compressed_size())
            .ok_or_else(|| Error::malformed("entry extends past addressable range"))?;

        let range = RangeReader::new(reader, body_offset, body_end);
        Ok(ZipEntryReader {
            inner: ChecksumTracker::new(Decompressor::new(method, range)),
            reader,
            name: entry.name().to_string(),
            expected_size: entry.uncompressed_size(),
            expected_crc: entry.crc32(),
            descriptor: entry
                .has_data_descriptor()
                .then_some(entry.sizes_need_zip64()),
            body_end,
            verified: false,
        })
    }

    /// Releases the container. Streams can no longer be opened afterwards,
    /// while the parsed entries remain available.
    pub fn close(&mut self) -> Result<R, Error> {
        self.reader.take().ok_or_else(|| Error::from(ErrorKind::Closed))
    }
}

impl<R> ZipArchive<R> {
    /// Entries in central directory order
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Looks up an entry by its exact, case sensitive name. When a name
    /// occurs more than once the first occurrence wins.
    pub fn get_entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// The archive comment, undecoded
    pub fn comment(&self) -> &[u8] {
        self.eocd.comment()
    }

    /// Number of bytes that precede the archive in the container
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub fn end_of_central_directory(&self) -> &EndOfCentralDirectory {
        &self.eocd
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

fn parse_central_directory(mut data: &[u8], declared: u64) -> Result<Vec<ArchiveEntry>, Error> {
    let capacity = usize::try_from(declared).unwrap_or(usize::MAX);
    let mut entries = Vec::with_capacity(capacity);
    while (entries.len() as u64) < declared {
        // The directory was read in full, so running out of bytes means it
        // holds fewer records than declared
        let header = match CentralDirectoryHeader::parse(data) {
            Ok(header) => header,
            Err(e) if e.is_eof() => {
                return Err(Error::from(ErrorKind::EntryCountMismatch {
                    expected: declared,
                    actual: entries.len() as u64,
                }))
            }
            Err(e) => return Err(e),
        };
        data = &data[header.record_len()..];
        entries.push(ArchiveEntry::from_central_header(&header)?);
    }

    // More records than declared is as much a mismatch as fewer
    let mut extra = 0u64;
    while let Ok(header) = CentralDirectoryHeader::parse(data) {
        data = &data[header.record_len()..];
        extra += 1;
    }

    if extra > 0 {
        return Err(Error::from(ErrorKind::EntryCountMismatch {
            expected: declared,
            actual: declared + extra,
        }));
    }

    Ok(entries)
}

fn read_exact_at<R>(reader: &R, buf: &mut [u8], offset: u64) -> Result<(), Error>
where
    R: ReaderAt + ?Sized,
{
    reader.read_exact_at(buf, offset).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::from(ErrorKind::Eof)
        } else {
            Error::io(e)
        }
    })
}

/// Decompressed content of one entry.
///
/// Reaching the end of the stream checks the size and CRC-32 against the
/// central directory, and against the data descriptor when the entry has
/// one. A mismatch is reported as an `InvalidData` I/O error that converts
/// back into this crate's [`Error`] with `Error::from`.
pub struct ZipEntryReader<'archive, R> {
    inner: ChecksumTracker<Decompressor<RangeReader<&'archive R>>>,
    reader: &'archive R,
    name: String,
    expected_size: u64,
    expected_crc: u32,

    /// Whether a data descriptor follows, and if so whether it has 64-bit
    /// sizes
    descriptor: Option<bool>,
    body_end: u64,
    verified: bool,
}

impl<R> ZipEntryReader<'_, R>
where
    R: ReaderAt,
{
    /// Number of decompressed bytes produced so far
    pub fn position(&self) -> u64 {
        self.inner.count()
    }

    /// Running CRC-32 of the bytes produced so far
    pub fn crc(&self) -> u32 {
        self.inner.crc()
    }

    fn verify(&self) -> Result<(), Error> {
        let actual_size = self.inner.count();
        if actual_size != self.expected_size {
            return Err(Error::from(ErrorKind::InvalidSize {
                expected: self.expected_size,
                actual: actual_size,
            }));
        }

        let actual_crc = self.inner.crc();
        if let Some(zip64) = self.descriptor {
            let mut buffer = [0u8; DataDescriptor::encoded_len(true)];
            let buffer = &mut buffer[..DataDescriptor::encoded_len(zip64)];
            read_exact_at(self.reader, buffer, self.body_end)?;
            let descriptor = DataDescriptor::parse(buffer, zip64)?;
            if descriptor.crc32 != actual_crc {
                return Err(Error::from(ErrorKind::InvalidChecksum {
                    expected: descriptor.crc32,
                    actual: actual_crc,
                }));
            }
        }

        if actual_crc != self.expected_crc {
            return Err(Error::from(ErrorKind::InvalidChecksum {
                expected: self.expected_crc,
                actual: actual_crc,
            }));
        }

        Ok(())
    }

    fn fail(&self, err: Error) -> std::io::Error {
        warn!("entry {} failed verification: {}", self.name, err);
        err.into_io()
    }
}

impl<R> Read for ZipEntryReader<'_, R>
where
    R: ReaderAt,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.verified || buf.is_empty() {
            return Ok(0);
        }

        let read = self.inner.read(buf)?;
        if self.inner.count() > self.expected_size {
            return Err(self.fail(Error::from(ErrorKind::InvalidSize {
                expected: self.expected_size,
                actual: self.inner.count(),
            })));
        }

        if read == 0 {
            if let Err(err) = self.verify() {
                return Err(self.fail(err));
            }
            self.verified = true;
        }

        Ok(read)
    }
}
