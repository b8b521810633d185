use crate::archive::ZipArchive;
use crate::errors::{Error, ErrorKind};
use crate::reader_at::{FileReader, MutexReader, ReaderAt};
use crate::records::{
    EndOfCentralDirectory, EndOfCentralDirectoryRecord, EndOfCentralDirectoryRecordFixed,
    Zip64EndOfCentralDirectoryLocator, Zip64EndOfCentralDirectoryRecord,
    END_OF_CENTRAL_DIR_SIGNATURE,
};

const END_OF_CENTRAL_DIR_SIGNATURE_BYTES: [u8; 4] = END_OF_CENTRAL_DIR_SIGNATURE.to_le_bytes();

/// The fixed end of central directory record followed by the longest
/// possible comment
pub const DEFAULT_MAX_SEARCH_SPACE: u64 = EndOfCentralDirectoryRecordFixed::SIZE as u64 + 65535;

const SEARCH_CHUNK_SIZE: usize = 16 * 1024;

/// Finds the end of central directory and opens archives.
///
/// ```
/// # use zipcodec::{ZipArchive, ZipLocator};
/// let data = [b'P', b'K', 5, 6, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
/// let archive = ZipLocator::new().max_search_space(1024).locate_in_slice(&data[..]).unwrap();
/// assert!(archive.entries().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ZipLocator {
    max_search_space: u64,
}

impl Default for ZipLocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the end of central directory was found and what it says
#[derive(Debug, Clone)]
pub(crate) struct ZipLocation {
    pub(crate) eocd: EndOfCentralDirectory,

    /// Offset in the container where the central directory is expected to
    /// end: the Zip64 record when present, otherwise the end of central
    /// directory record.
    pub(crate) directory_end: u64,
}

impl ZipLocator {
    pub fn new() -> Self {
        ZipLocator {
            max_search_space: DEFAULT_MAX_SEARCH_SPACE,
        }
    }

    /// The maximum number of bytes from the end of the container to search
    /// for the end of central directory signature
    pub fn max_search_space(mut self, max_search_space: u64) -> Self {
        self.max_search_space = max_search_space;
        self
    }

    pub fn locate_in_slice<'a>(&self, data: &'a [u8]) -> Result<ZipArchive<&'a [u8]>, Error> {
        let len = data.len() as u64;
        self.locate_in_reader(data, len)
    }

    pub fn locate_in_file(&self, file: std::fs::File) -> Result<ZipArchive<FileReader>, Error> {
        let len = file.metadata()?.len();
        self.locate_in_reader(FileReader::from(file), len)
    }

    /// Opens any `Read + Seek` container. Reads are serialized through a
    /// mutex.
    pub fn locate_in_seekable<R>(
        &self,
        mut reader: R,
    ) -> Result<ZipArchive<MutexReader<R>>, Error>
    where
        R: std::io::Read + std::io::Seek,
    {
        let len = reader.seek(std::io::SeekFrom::End(0))?;
        self.locate_in_reader(MutexReader::new(reader), len)
    }

    /// Opens a container of `len` bytes
    pub fn locate_in_reader<R>(&self, reader: R, len: u64) -> Result<ZipArchive<R>, Error>
    where
        R: ReaderAt,
    {
        let location = self.locate(&reader, len)?;
        ZipArchive::from_location(reader, len, location)
    }

    pub(crate) fn locate<R>(&self, reader: &R, len: u64) -> Result<ZipLocation, Error>
    where
        R: ReaderAt + ?Sized,
    {
        let start = len.saturating_sub(self.max_search_space);
        let window = usize::try_from(len - start).unwrap_or(usize::MAX);
        let mut buffer = vec![0u8; window.clamp(END_OF_CENTRAL_DIR_SIGNATURE_BYTES.len(), SEARCH_CHUNK_SIZE)];

        // A signature can show up inside the comment or trailing data, so
        // keep looking earlier until a candidate fits in the container
        let mut end = len;
        loop {
            let Some(pos) = find_end_of_central_dir(reader, &mut buffer, start, end)? else {
                return Err(Error::from(ErrorKind::MissingEndOfCentralDirectory));
            };

            match read_candidate(reader, pos, len)? {
                Some(record) => return resolve_zip64(reader, pos, record),
                None => end = pos + END_OF_CENTRAL_DIR_SIGNATURE_BYTES.len() as u64 - 1,
            }
        }
    }
}

/// Reads the record at `pos` if it and its comment fit before `len`
fn read_candidate<R>(
    reader: &R,
    pos: u64,
    len: u64,
) -> Result<Option<EndOfCentralDirectoryRecord>, Error>
where
    R: ReaderAt + ?Sized,
{
    let fixed_end = pos + EndOfCentralDirectoryRecordFixed::SIZE as u64;
    if fixed_end > len {
        return Ok(None);
    }

    let mut buffer = [0u8; EndOfCentralDirectoryRecordFixed::SIZE];
    reader.read_exact_at(&mut buffer, pos)?;
    let fixed = EndOfCentralDirectoryRecordFixed::parse(&buffer)?;
    if fixed_end + u64::from(fixed.comment_len) > len {
        return Ok(None);
    }

    let mut comment = vec![0u8; usize::from(fixed.comment_len)];
    reader.read_exact_at(&mut comment, fixed_end)?;
    Ok(Some(EndOfCentralDirectoryRecord { fixed, comment }))
}

/// Follows the Zip64 locator right before the end of central directory
/// record at `pos`.
///
/// Zip64 records are honored whenever they are present, since some writers
/// emit them below the thresholds without sentineling the classic record.
/// They are only required when the classic record is sentineled.
fn resolve_zip64<R>(
    reader: &R,
    pos: u64,
    record: EndOfCentralDirectoryRecord,
) -> Result<ZipLocation, Error>
where
    R: ReaderAt + ?Sized,
{
    let required = record.fixed.is_sentineled();
    match find_zip64_record(reader, pos)? {
        Some((locator, zip64, directory_end)) => Ok(ZipLocation {
            eocd: EndOfCentralDirectory::WithZip64Extension {
                record,
                locator,
                zip64,
            },
            directory_end,
        }),
        None if required => Err(Error::from(ErrorKind::MissingZip64EndOfCentralDirectory)),
        None => Ok(ZipLocation {
            eocd: EndOfCentralDirectory::Plain(record),
            directory_end: pos,
        }),
    }
}

/// Reads the locator ending at `pos` and the Zip64 record it points to,
/// returning them with the record's position.
fn find_zip64_record<R>(
    reader: &R,
    pos: u64,
) -> Result<
    Option<(
        Zip64EndOfCentralDirectoryLocator,
        Zip64EndOfCentralDirectoryRecord,
        u64,
    )>,
    Error,
>
where
    R: ReaderAt + ?Sized,
{
    let Some(locator_pos) = pos.checked_sub(Zip64EndOfCentralDirectoryLocator::SIZE as u64) else {
        return Ok(None);
    };
    let mut buffer = [0u8; Zip64EndOfCentralDirectoryLocator::SIZE];
    reader.read_exact_at(&mut buffer, locator_pos)?;
    let Ok(locator) = Zip64EndOfCentralDirectoryLocator::parse(&buffer) else {
        return Ok(None);
    };

    // The locator's offset does not account for data prepended to the
    // archive, in which case the record sits right before the locator.
    let adjacent = locator_pos.checked_sub(Zip64EndOfCentralDirectoryRecord::SIZE as u64);
    let candidates = [Some(locator.directory_offset), adjacent];
    for offset in candidates.into_iter().flatten() {
        let mut buffer = [0u8; Zip64EndOfCentralDirectoryRecord::SIZE];
        if offset >= locator_pos || reader.read_exact_at(&mut buffer, offset).is_err() {
            continue;
        }

        if let Ok(zip64) = Zip64EndOfCentralDirectoryRecord::parse(&buffer) {
            return Ok(Some((locator, zip64, offset)));
        }
    }

    Ok(None)
}

/// Finds the last end of central directory signature lying entirely within
/// `[start, end)` of the reader, scanning backwards one buffer at a time.
pub(crate) fn find_end_of_central_dir<T>(
    reader: &T,
    buffer: &mut [u8],
    start: u64,
    end: u64,
) -> std::io::Result<Option<u64>>
where
    T: ReaderAt + ?Sized,
{
    if buffer.len() < END_OF_CENTRAL_DIR_SIGNATURE_BYTES.len() || end <= start {
        return Ok(None);
    }

    let mut offset = end;

    // The amount of data that remains to be read
    let mut remaining = end - start;

    // The number of bytes that were translated from the front to the back
    let mut carry_over = 0;
    loop {
        let read_size = (buffer.len() - carry_over).min(usize::try_from(remaining).unwrap_or(usize::MAX));
        offset -= read_size as u64;

        reader.read_exact_at(&mut buffer[..read_size], offset)?;
        remaining -= read_size as u64;

        let haystack = &buffer[..read_size + carry_over];
        if let Some(i) = backwards_find(haystack, &END_OF_CENTRAL_DIR_SIGNATURE_BYTES) {
            return Ok(Some(offset + i as u64));
        }

        if remaining == 0 {
            return Ok(None);
        }

        // The signature may straddle read boundaries, so carry over however
        // much of the start of this read matches the end of the signature
        carry_over = match buffer {
            [b0, b1, b2, ..] if [*b0, *b1, *b2] == END_OF_CENTRAL_DIR_SIGNATURE_BYTES[1..4] => 3,
            [b0, b1, ..] if [*b0, *b1] == END_OF_CENTRAL_DIR_SIGNATURE_BYTES[2..4] => 2,
            [b0, ..] if *b0 == END_OF_CENTRAL_DIR_SIGNATURE_BYTES[3] => 1,
            _ => 0,
        };

        if carry_over > 0 {
            let dest = (buffer.len() - carry_over).min(usize::try_from(remaining).unwrap_or(usize::MAX));
            buffer.copy_within(..carry_over, dest);
        }
    }
}

fn backwards_find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}
