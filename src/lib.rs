#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]
#![forbid(unsafe_code)]

mod archive;
mod bulk;
mod crc;
mod entry;
mod errors;
mod locator;
mod method;
pub mod path;
mod reader_at;
mod records;
pub mod time;
mod tracker;
mod writer;

pub use archive::*;
pub use bulk::*;
pub use crc::{crc32, crc32_chunk, Crc32};
pub use entry::{ArchiveEntry, DOS_DIRECTORY_ATTRIBUTE, FLAG_DATA_DESCRIPTOR, FLAG_UTF8};
pub use errors::{Error, ErrorCategory, ErrorKind};
pub use locator::{ZipLocator, DEFAULT_MAX_SEARCH_SPACE};
pub use method::*;
pub use reader_at::{FileReader, MutexReader, RangeReader, ReaderAt};
pub use records::*;
pub use time::{DosDateTime, ZipDateTime};
pub use tracker::ChecksumTracker;
pub use writer::*;
