//! Whole-archive helpers for callers that walk a directory tree.
//!
//! Creation consumes `(relative path, content, last modified)` triples and
//! extraction hands each entry with its content stream to a callback. Neither
//! touches the file system.

use crate::archive::ZipArchive;
use crate::entry::ArchiveEntry;
use crate::errors::Error;
use crate::reader_at::ReaderAt;
use crate::time::ZipDateTime;
use crate::writer::{ZipArchiveWriter, ZipSink};
use std::io::{Read, Seek, Write};

/// Writes every item as an entry of a new archive on forward only output
/// and returns the output.
///
/// Paths ending in `/` become directory entries and their content is not
/// read. Files use the default method, Deflate.
///
/// ```
/// use zipcodec::{create_archive_from_paths, ZipArchive, ZipDateTime};
///
/// let items = vec![
///     ("docs/", &b""[..], ZipDateTime::default()),
///     ("docs/readme.txt", &b"read me"[..], ZipDateTime::default()),
/// ];
/// let data = create_archive_from_paths(Vec::new(), items).unwrap();
/// let archive = ZipArchive::from_slice(&data).unwrap();
/// assert_eq!(archive.entries().len(), 2);
/// ```
pub fn create_archive_from_paths<W, I, P, R>(sink: W, items: I) -> Result<W, Error>
where
    W: Write,
    I: IntoIterator<Item = (P, R, ZipDateTime)>,
    P: AsRef<str>,
    R: Read,
{
    write_archive(ZipArchiveWriter::new(sink), items)
}

/// Like [`create_archive_from_paths`], but patches local headers in place
/// instead of writing data descriptors.
pub fn create_seekable_archive_from_paths<W, I, P, R>(sink: W, items: I) -> Result<W, Error>
where
    W: Write + Seek,
    I: IntoIterator<Item = (P, R, ZipDateTime)>,
    P: AsRef<str>,
    R: Read,
{
    write_archive(ZipArchiveWriter::new_seekable(sink)?, items)
}

/// Adds every item to a writer configured by the caller, then finishes it.
pub fn write_archive<S, I, P, R>(mut writer: ZipArchiveWriter<S>, items: I) -> Result<S::Inner, Error>
where
    S: ZipSink,
    I: IntoIterator<Item = (P, R, ZipDateTime)>,
    P: AsRef<str>,
    R: Read,
{
    for (path, mut content, last_modified) in items {
        let path = path.as_ref();
        if path.ends_with('/') {
            writer.add_directory(path, last_modified)?;
            continue;
        }

        let method = writer.default_method();
        let handle = writer.add_entry(path, last_modified, method)?;
        let mut stream = handle.open_write_stream(&mut writer)?;
        std::io::copy(&mut content, &mut stream)?;
        stream.close()?;
    }

    writer.finish()
}

/// Calls `callback` with every entry, in central directory order, and a
/// stream of its decompressed content.
///
/// Whatever the callback leaves unread is drained afterwards, so every
/// entry's CRC-32 and size are verified. The first error stops the
/// extraction.
pub fn extract_archive_to_callback<R, F>(archive: &ZipArchive<R>, mut callback: F) -> Result<(), Error>
where
    R: ReaderAt,
    F: FnMut(&ArchiveEntry, &mut dyn Read) -> Result<(), Error>,
{
    for entry in archive.entries() {
        let mut stream = archive.open_read_stream(entry)?;
        callback(entry, &mut stream)?;
        std::io::copy(&mut stream, &mut std::io::sink())?;
    }

    Ok(())
}
