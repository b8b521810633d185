use crate::entry::{
    ArchiveEntry, DOS_DIRECTORY_ATTRIBUTE, FLAG_DATA_DESCRIPTOR, FLAG_UTF8, VERSION_MADE_BY,
};
use crate::errors::{Error, ErrorKind};
use crate::method::{archive_version_needed, CompressionMethod, Compressor};
use crate::path::{needs_utf8_encoding, validate_entry_name};
use crate::records::{
    DataDescriptor, EndOfCentralDirectoryRecord, EndOfCentralDirectoryRecordFixed,
    LocalFileHeaderFixed, Zip64EndOfCentralDirectoryLocator, Zip64EndOfCentralDirectoryRecord,
    ZIP64_SENTINEL_U16, ZIP64_SENTINEL_U32,
};
use crate::time::{DosDateTime, ZipDateTime};
use crate::tracker::ChecksumTracker;
use log::{debug, trace};
use std::collections::HashSet;
use std::io::{self, Seek, SeekFrom, Write};

const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Output of a [`ZipArchiveWriter`].
///
/// A sink that can overwrite bytes it already received lets the writer
/// patch each local header with the final CRC and sizes. Otherwise every
/// entry is followed by a data descriptor.
pub trait ZipSink: Write {
    /// What the sink hands back once the archive is finished
    type Inner;

    fn supports_patching(&self) -> bool;

    /// Overwrites `data` at `offset` bytes from where the archive started,
    /// leaving the write position at the end.
    fn patch(&mut self, offset: u64, data: &[u8]) -> io::Result<()>;

    fn into_inner(self) -> Self::Inner;
}

/// Forward only output. Entries carry data descriptors.
#[derive(Debug)]
pub struct StreamingSink<W>(W);

impl<W: Write> Write for StreamingSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write> ZipSink for StreamingSink<W> {
    type Inner = W;

    fn supports_patching(&self) -> bool {
        false
    }

    fn patch(&mut self, _offset: u64, _data: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "streaming sink cannot rewrite output",
        ))
    }

    fn into_inner(self) -> W {
        self.0
    }
}

/// Output that local headers are patched in, so no data descriptors are
/// written.
#[derive(Debug)]
pub struct SeekableSink<W> {
    inner: W,

    /// Position of the archive start within `inner`
    base: u64,
}

impl<W: Write + Seek> Write for SeekableSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Seek> ZipSink for SeekableSink<W> {
    type Inner = W;

    fn supports_patching(&self) -> bool {
        true
    }

    fn patch(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        let end = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(self.base + offset))?;
        self.inner.write_all(data)?;
        self.inner.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    fn into_inner(self) -> W {
        self.inner
    }
}

#[derive(Debug)]
struct CountWriter<W> {
    writer: W,
    count: u64,
}

impl<W> CountWriter<W> {
    fn new(writer: W) -> Self {
        CountWriter { writer, count: 0 }
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl<W: Write> Write for CountWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bytes_written = self.writer.write(buf)?;
        self.count += bytes_written as u64;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Configures a [`ZipArchiveWriter`].
#[derive(Debug, Clone)]
pub struct ZipArchiveWriterBuilder {
    compression_level: u32,
    comment: Vec<u8>,
    default_method: CompressionMethod,
}

impl ZipArchiveWriterBuilder {
    pub fn new() -> Self {
        ZipArchiveWriterBuilder {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            comment: Vec::new(),
            default_method: CompressionMethod::default(),
        }
    }

    /// Deflate level from 0 (fastest) to 9 (smallest). Defaults to 6.
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Archive comment written after the end of central directory record.
    /// Comments over 65535 bytes fail the archive close.
    pub fn comment(mut self, comment: impl Into<Vec<u8>>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Method used when the caller does not pick one, as in
    /// [`crate::create_archive_from_paths`]
    pub fn default_method(mut self, method: CompressionMethod) -> Self {
        self.default_method = method;
        self
    }

    /// Builds a writer for forward only output
    pub fn build<W>(&self, writer: W) -> ZipArchiveWriter<StreamingSink<W>>
    where
        W: Write,
    {
        self.build_with(StreamingSink(writer))
    }

    /// Builds a writer that patches local headers in place. The archive
    /// starts at the current position of `writer`.
    pub fn build_seekable<W>(&self, mut writer: W) -> Result<ZipArchiveWriter<SeekableSink<W>>, Error>
    where
        W: Write + Seek,
    {
        let base = writer.stream_position()?;
        Ok(self.build_with(SeekableSink {
            inner: writer,
            base,
        }))
    }

    fn build_with<S>(&self, sink: S) -> ZipArchiveWriter<S> {
        ZipArchiveWriter {
            sink: CountWriter::new(sink),
            entries: Vec::new(),
            names: HashSet::new(),
            state: WriterState::Building,
            pending: None,
            compression_level: self.compression_level,
            comment: self.comment.clone(),
            default_method: self.default_method,
        }
    }
}

impl Default for ZipArchiveWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Building,
    Finalizing,
    Closed,
}

/// The entry whose content is being written
#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    index: usize,
    stream_opened: bool,
}

/// Builds a new archive in a single forward pass.
///
/// Each entry is added with [`add_entry`](ZipArchiveWriter::add_entry), its
/// content written through the stream opened from the returned handle, and
/// the stream closed before the next entry. Closing the archive writes the
/// central directory and end records.
///
/// ```
/// use std::io::Write;
/// use zipcodec::{CompressionMethod, ZipArchiveWriter, ZipDateTime};
///
/// let mut writer = ZipArchiveWriter::builder()
///     .comment("greetings")
///     .build_seekable(std::io::Cursor::new(Vec::new()))?;
/// writer.add_directory("docs/", ZipDateTime::default())?;
/// let handle = writer.add_entry("docs/hello.txt", ZipDateTime::default(), CompressionMethod::Store)?;
/// let mut stream = handle.open_write_stream(&mut writer)?;
/// stream.write_all(b"Hello, world!")?;
/// let entry = stream.close()?;
/// assert_eq!(entry.uncompressed_size(), 13);
/// let output = writer.finish()?;
/// # assert!(!output.into_inner().is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct ZipArchiveWriter<S> {
    sink: CountWriter<S>,
    entries: Vec<ArchiveEntry>,
    names: HashSet<String>,
    state: WriterState,
    pending: Option<PendingEntry>,
    compression_level: u32,
    comment: Vec<u8>,
    default_method: CompressionMethod,
}

impl ZipArchiveWriter<()> {
    pub fn builder() -> ZipArchiveWriterBuilder {
        ZipArchiveWriterBuilder::new()
    }
}

impl<W: Write> ZipArchiveWriter<StreamingSink<W>> {
    /// A writer with default settings for forward only output
    pub fn new(writer: W) -> Self {
        ZipArchiveWriterBuilder::new().build(writer)
    }
}

impl<W: Write + Seek> ZipArchiveWriter<SeekableSink<W>> {
    /// A writer with default settings that patches local headers in place
    pub fn new_seekable(writer: W) -> Result<Self, Error> {
        ZipArchiveWriterBuilder::new().build_seekable(writer)
    }
}

impl<S> ZipArchiveWriter<S> {
    /// Entries added so far, in add order
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn default_method(&self) -> CompressionMethod {
        self.default_method
    }

    pub fn is_closed(&self) -> bool {
        self.state == WriterState::Closed
    }

    fn check_building(&self) -> Result<(), Error> {
        if self.state != WriterState::Building {
            return Err(Error::from(ErrorKind::Closed));
        }

        if self.pending.is_some() {
            return Err(Error::out_of_sequence(
                "the previous entry's write stream has not been closed",
            ));
        }

        Ok(())
    }
}

impl<S> ZipArchiveWriter<S>
where
    S: ZipSink,
{
    /// Starts a file entry and writes its local header.
    ///
    /// The content is written through
    /// [`ZipEntryHandle::open_write_stream`], and that stream must be closed
    /// before another entry is added or the archive is closed.
    pub fn add_entry(
        &mut self,
        name: &str,
        last_modified: ZipDateTime,
        method: CompressionMethod,
    ) -> Result<ZipEntryHandle, Error> {
        self.check_building()?;
        let name = validate_entry_name(name)?;
        if name.ends_with('/') {
            return Err(Error::invalid_path(
                &name,
                "directory entries are added with add_directory",
            ));
        }

        let mut flags = 0;
        if !self.sink.writer.supports_patching() {
            flags |= FLAG_DATA_DESCRIPTOR;
        }

        let index = self.start_entry(name, last_modified, method, flags, 0)?;
        self.pending = Some(PendingEntry {
            index,
            stream_opened: false,
        });

        Ok(ZipEntryHandle {
            index,
            name: self.entries[index].name().to_string(),
        })
    }

    /// Adds an empty directory placeholder. A trailing slash is appended to
    /// `name` when missing.
    pub fn add_directory(&mut self, name: &str, last_modified: ZipDateTime) -> Result<(), Error> {
        self.check_building()?;
        let mut name = validate_entry_name(name)?;
        if !name.ends_with('/') {
            name.push('/');
        }

        self.start_entry(
            name,
            last_modified,
            CompressionMethod::Store,
            0,
            DOS_DIRECTORY_ATTRIBUTE,
        )?;
        Ok(())
    }

    fn start_entry(
        &mut self,
        name: String,
        last_modified: ZipDateTime,
        method: CompressionMethod,
        mut flags: u16,
        external_attributes: u32,
    ) -> Result<usize, Error> {
        if self.names.contains(&name) {
            return Err(Error::from(ErrorKind::DuplicateEntry(name)));
        }

        if name.len() > usize::from(u16::MAX) {
            return Err(Error::invalid_path(&name, "name exceeds 65535 bytes"));
        }

        if needs_utf8_encoding(&name) {
            flags |= FLAG_UTF8;
        }

        let mut entry = ArchiveEntry::new(
            name,
            method,
            DosDateTime::from(&last_modified),
            flags,
            self.sink.count(),
        );
        entry.set_external_attributes(external_attributes);

        let mut buffer = Vec::new();
        entry.to_local_header().write_to(&mut buffer)?;
        self.sink.write_all(&buffer)?;

        trace!(
            "added entry {} at offset {}",
            entry.name(),
            entry.local_header_offset()
        );
        self.names.insert(entry.name().to_string());
        self.entries.push(entry);
        Ok(self.entries.len() - 1)
    }

    /// Opens the content stream of the entry behind `handle`. Allowed once
    /// per entry.
    pub fn open_write_stream(
        &mut self,
        handle: &ZipEntryHandle,
    ) -> Result<ZipEntryWriter<'_, S>, Error> {
        if self.state != WriterState::Building {
            return Err(Error::from(ErrorKind::Closed));
        }

        match self.pending {
            Some(PendingEntry {
                index,
                stream_opened: false,
            }) if index == handle.index => {}
            _ => {
                return Err(Error::out_of_sequence(
                    "entry is not awaiting its write stream",
                ))
            }
        }

        self.pending = Some(PendingEntry {
            index: handle.index,
            stream_opened: true,
        });

        let method = self.entries[handle.index].compression_method()?;
        let level = self.compression_level;
        let sink = EntrySink {
            archive: self,
            written: 0,
        };

        Ok(ZipEntryWriter {
            inner: ChecksumTracker::new(Compressor::new(method, sink, level)),
        })
    }

    fn finish_entry(
        &mut self,
        crc32: u32,
        compressed_size: u64,
        uncompressed_size: u64,
    ) -> Result<ArchiveEntry, Error> {
        let index = match self.pending {
            Some(pending) => pending.index,
            None => return Err(Error::out_of_sequence("no entry is being written")),
        };

        let entry = &mut self.entries[index];
        entry.set_result(crc32, compressed_size, uncompressed_size);

        let mut buffer = Vec::new();
        if self.sink.writer.supports_patching() {
            // A local header can't grow a zip64 extra field after the fact,
            // so oversized entries fall back to a zip64 data descriptor. The
            // header then keeps its crc and sizes zeroed, as with streaming.
            let zip64 = entry.sizes_need_zip64();
            if zip64 {
                entry.set_flags(entry.flags() | FLAG_DATA_DESCRIPTOR);
            }

            let mut header = entry.to_local_header();
            header.fixed.version_needed = entry.version_needed();
            if !zip64 {
                header.fixed.crc32 = crc32;
                header.fixed.compressed_size = clamp_u32(compressed_size);
                header.fixed.uncompressed_size = clamp_u32(uncompressed_size);
            }
            header.write_to(&mut buffer)?;
            self.sink
                .writer
                .patch(entry.local_header_offset(), &buffer[..LocalFileHeaderFixed::SIZE])?;

            if zip64 {
                buffer.clear();
                descriptor(entry).write_to(&mut buffer, true)?;
                self.sink.write_all(&buffer)?;
            }
        } else {
            descriptor(entry).write_to(&mut buffer, entry.sizes_need_zip64())?;
            self.sink.write_all(&buffer)?;
        }

        trace!(
            "closed entry {}: {} bytes, {} compressed, crc {:08x}",
            entry.name(),
            uncompressed_size,
            compressed_size,
            crc32
        );
        let entry = entry.clone();
        self.pending = None;
        Ok(entry)
    }

    /// Writes the central directory, the Zip64 end records when needed and
    /// the end of central directory record, then flushes the sink.
    pub fn close(&mut self) -> Result<(), Error> {
        self.check_building()?;
        self.state = WriterState::Finalizing;

        let directory_offset = self.sink.count();
        let mut buffer = Vec::new();
        for entry in &self.entries {
            buffer.clear();
            entry.to_central_header()?.write_to(&mut buffer)?;
            self.sink.write_all(&buffer)?;
        }

        let directory_end = self.sink.count();
        let directory_size = directory_end - directory_offset;
        let total_entries = self.entries.len() as u64;

        let needs_zip64 = total_entries >= u64::from(ZIP64_SENTINEL_U16)
            || directory_offset >= u64::from(ZIP64_SENTINEL_U32)
            || directory_size >= u64::from(ZIP64_SENTINEL_U32)
            || self.entries.iter().any(ArchiveEntry::needs_zip64);

        buffer.clear();
        if needs_zip64 {
            let version_needed =
                archive_version_needed(self.entries.iter().map(ArchiveEntry::version_needed), true);
            let record = Zip64EndOfCentralDirectoryRecord {
                record_size: Zip64EndOfCentralDirectoryRecord::RECORD_SIZE,
                version_made_by: VERSION_MADE_BY,
                version_needed,
                disk_number: 0,
                cd_disk: 0,
                entries_on_disk: total_entries,
                total_entries,
                central_dir_size: directory_size,
                central_dir_offset: directory_offset,
            };
            record.write_to(&mut buffer)?;

            let locator = Zip64EndOfCentralDirectoryLocator {
                eocd_disk: 0,
                directory_offset: directory_end,
                total_disks: 1,
            };
            locator.write_to(&mut buffer)?;
        }

        let entries = clamp_u16(total_entries);
        let record = EndOfCentralDirectoryRecord {
            fixed: EndOfCentralDirectoryRecordFixed {
                entries_on_disk: entries,
                total_entries: entries,
                central_dir_size: clamp_u32(directory_size),
                central_dir_offset: clamp_u32(directory_offset),
                ..Default::default()
            },
            comment: self.comment.clone(),
        };
        record.write_to(&mut buffer)?;
        self.sink.write_all(&buffer)?;
        self.sink.flush()?;

        debug!(
            "finalized archive: {} entries, zip64: {}, central directory at {} ({} bytes)",
            total_entries, needs_zip64, directory_offset, directory_size
        );
        self.state = WriterState::Closed;
        Ok(())
    }

    /// Closes the archive, unless [`Self::close`] already did, and returns
    /// the underlying output
    pub fn finish(mut self) -> Result<S::Inner, Error> {
        if self.state != WriterState::Closed {
            self.close()?;
        }
        Ok(self.sink.writer.into_inner())
    }
}

fn descriptor(entry: &ArchiveEntry) -> DataDescriptor {
    DataDescriptor {
        crc32: entry.crc32(),
        compressed_size: entry.compressed_size(),
        uncompressed_size: entry.uncompressed_size(),
    }
}

fn clamp_u16(value: u64) -> u16 {
    u16::try_from(value).unwrap_or(ZIP64_SENTINEL_U16)
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(ZIP64_SENTINEL_U32)
}

/// Identifies an entry started with [`ZipArchiveWriter::add_entry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntryHandle {
    index: usize,
    name: String,
}

impl ZipEntryHandle {
    /// The validated name, with separators normalized
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens the compressing content stream. A second call fails with an
    /// `OutOfSequence` error.
    pub fn open_write_stream<'a, S>(
        &self,
        writer: &'a mut ZipArchiveWriter<S>,
    ) -> Result<ZipEntryWriter<'a, S>, Error>
    where
        S: ZipSink,
    {
        writer.open_write_stream(self)
    }
}

/// Compressed bytes of the current entry on their way into the archive
struct EntrySink<'a, S> {
    archive: &'a mut ZipArchiveWriter<S>,
    written: u64,
}

impl<S> Write for EntrySink<'_, S>
where
    S: ZipSink,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bytes_written = self.archive.sink.write(buf)?;
        self.written += bytes_written as u64;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.archive.sink.flush()
    }
}

/// Compressing content stream of one entry.
///
/// Content is compressed straight into the archive while the CRC-32 and
/// sizes are tracked. [`close`](ZipEntryWriter::close) completes the entry:
/// the local header is patched or a data descriptor written.
pub struct ZipEntryWriter<'a, S>
where
    S: ZipSink,
{
    inner: ChecksumTracker<Compressor<EntrySink<'a, S>>>,
}

impl<S> ZipEntryWriter<'_, S>
where
    S: ZipSink,
{
    /// Uncompressed bytes accepted so far
    pub fn uncompressed_bytes(&self) -> u64 {
        self.inner.count()
    }

    /// Finishes the compressed stream and records the entry's CRC-32 and
    /// sizes. Returns the completed entry.
    pub fn close(self) -> Result<ArchiveEntry, Error> {
        let crc32 = self.inner.crc();
        let uncompressed_size = self.inner.count();
        let sink = self.inner.into_inner().finish()?;
        sink.archive
            .finish_entry(crc32, sink.written, uncompressed_size)
    }
}

impl<S> Write for ZipEntryWriter<'_, S>
where
    S: ZipSink,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
