use crate::errors::{Error, ErrorKind};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Version needed to extract an entry that uses no optional features
pub const VERSION_DEFAULT: u16 = 10;

/// Version needed for Deflate and for explicit directory entries
pub const VERSION_DEFLATE: u16 = 20;

/// Version needed once any Zip64 structure is used
pub const VERSION_ZIP64: u16 = 45;

/// The compression methods this crate can read and write
///
/// Documented under 4.4.5 of the application note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionMethod {
    Store,

    #[default]
    Deflate,
}

impl CompressionMethod {
    /// Resolves a method code found in a header
    pub fn from_id(id: u16) -> Result<CompressionMethod, Error> {
        match id {
            0 => Ok(CompressionMethod::Store),
            8 => Ok(CompressionMethod::Deflate),
            _ => Err(Error::from(ErrorKind::UnsupportedMethod(id))),
        }
    }

    pub fn as_id(&self) -> u16 {
        match self {
            CompressionMethod::Store => 0,
            CompressionMethod::Deflate => 8,
        }
    }
}

/// Version needed to extract a single entry
pub fn version_needed(method: CompressionMethod, is_dir: bool, zip64: bool) -> u16 {
    if zip64 {
        VERSION_ZIP64
    } else if method == CompressionMethod::Deflate || is_dir {
        VERSION_DEFLATE
    } else {
        VERSION_DEFAULT
    }
}

/// Version needed to extract the archive as a whole: the maximum over every
/// entry, raised to the Zip64 level when the end records need it.
pub fn archive_version_needed<I>(entries: I, zip64_end_records: bool) -> u16
where
    I: IntoIterator<Item = u16>,
{
    let floor = if zip64_end_records {
        VERSION_ZIP64
    } else {
        VERSION_DEFAULT
    };
    entries.into_iter().fold(floor, u16::max)
}

/// Decoding side of a [`CompressionMethod`]
pub enum Decompressor<R> {
    Store(R),
    Deflate(DeflateDecoder<R>),
}

impl<R> Decompressor<R>
where
    R: Read,
{
    pub fn new(method: CompressionMethod, inner: R) -> Self {
        match method {
            CompressionMethod::Store => Decompressor::Store(inner),
            CompressionMethod::Deflate => Decompressor::Deflate(DeflateDecoder::new(inner)),
        }
    }
}

impl<R> Read for Decompressor<R>
where
    R: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Decompressor::Store(inner) => inner.read(buf),
            Decompressor::Deflate(decoder) => decoder.read(buf),
        }
    }
}

/// Encoding side of a [`CompressionMethod`]
pub enum Compressor<W>
where
    W: Write,
{
    Store(W),
    Deflate(DeflateEncoder<W>),
}

impl<W> Compressor<W>
where
    W: Write,
{
    /// `level` is clamped to the 0 (fastest) through 9 (smallest) range and
    /// ignored for Store.
    pub fn new(method: CompressionMethod, inner: W, level: u32) -> Self {
        match method {
            CompressionMethod::Store => Compressor::Store(inner),
            CompressionMethod::Deflate => {
                Compressor::Deflate(DeflateEncoder::new(inner, Compression::new(level.min(9))))
            }
        }
    }

    /// Mutable access to the compressed output. Bytes removed from it are not
    /// seen again by the encoder.
    pub fn get_mut(&mut self) -> &mut W {
        match self {
            Compressor::Store(inner) => inner,
            Compressor::Deflate(encoder) => encoder.get_mut(),
        }
    }

    /// Flushes the remaining compressed stream and returns the output
    pub fn finish(self) -> std::io::Result<W> {
        match self {
            Compressor::Store(inner) => Ok(inner),
            Compressor::Deflate(encoder) => encoder.finish(),
        }
    }
}

impl<W> Write for Compressor<W>
where
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Compressor::Store(inner) => inner.write(buf),
            Compressor::Deflate(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Compressor::Store(inner) => inner.flush(),
            Compressor::Deflate(encoder) => encoder.flush(),
        }
    }
}
