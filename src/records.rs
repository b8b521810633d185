//! Encoding and decoding of the fixed Zip records.
//!
//! Every function here operates on byte buffers only. Parsers take the bytes
//! starting at a record's signature and return [`ErrorKind::Eof`] when the
//! buffer is too short to hold the record, so callers can fetch more data and
//! retry. Encoders append to a `Vec<u8>` and verify that the bytes they
//! produced agree with the lengths declared inside the record.

use crate::errors::{Error, ErrorKind};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
pub const CENTRAL_HEADER_SIGNATURE: u32 = 0x02014b50;
pub const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x06054b50;
pub const END_OF_CENTRAL_DIR_SIGNATURE64: u32 = 0x06064b50;
pub const END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE: u32 = 0x07064b50;

/// Header id of the Zip64 extended information extra field (4.5.3)
pub const ZIP64_EXTRA_FIELD_ID: u16 = 0x0001;

/// Value stored in a 32-bit size or offset field when the real value lives in
/// a Zip64 structure.
pub const ZIP64_SENTINEL_U32: u32 = u32::MAX;

/// Value stored in a 16-bit count or disk field when the real value lives in
/// a Zip64 structure.
pub const ZIP64_SENTINEL_U16: u16 = u16::MAX;

fn check_signature(actual: u32, expected: u32) -> Result<(), Error> {
    if actual != expected {
        return Err(Error::from(ErrorKind::InvalidSignature { expected, actual }));
    }
    Ok(())
}

fn field_len(data: &[u8], msg: &'static str) -> Result<u16, Error> {
    u16::try_from(data.len()).map_err(|_| Error::malformed(msg))
}

fn verify_written(out: &[u8], start: usize, declared: usize) -> Result<usize, Error> {
    let written = out.len() - start;
    if written != declared {
        return Err(Error::malformed(
            "encoded record length disagrees with its declared lengths",
        ));
    }
    Ok(written)
}

/// The 30 fixed bytes of a local file header (4.3.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalFileHeaderFixed {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_len: u16,
    pub extra_field_len: u16,
}

impl LocalFileHeaderFixed {
    pub const SIZE: usize = 30;

    pub fn parse(data: &[u8]) -> Result<LocalFileHeaderFixed, Error> {
        if data.len() < Self::SIZE {
            return Err(Error::from(ErrorKind::Eof));
        }

        let mut cur = &data[..Self::SIZE];
        check_signature(
            cur.read_u32::<LittleEndian>()?,
            LOCAL_FILE_HEADER_SIGNATURE,
        )?;

        Ok(LocalFileHeaderFixed {
            version_needed: cur.read_u16::<LittleEndian>()?,
            flags: cur.read_u16::<LittleEndian>()?,
            compression_method: cur.read_u16::<LittleEndian>()?,
            last_mod_time: cur.read_u16::<LittleEndian>()?,
            last_mod_date: cur.read_u16::<LittleEndian>()?,
            crc32: cur.read_u32::<LittleEndian>()?,
            compressed_size: cur.read_u32::<LittleEndian>()?,
            uncompressed_size: cur.read_u32::<LittleEndian>()?,
            file_name_len: cur.read_u16::<LittleEndian>()?,
            extra_field_len: cur.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize, Error> {
        let start = out.len();
        out.write_u32::<LittleEndian>(LOCAL_FILE_HEADER_SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method)?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(self.file_name_len)?;
        out.write_u16::<LittleEndian>(self.extra_field_len)?;
        verify_written(out, start, Self::SIZE)
    }

    /// Number of name and extra field bytes that follow the fixed portion
    pub fn variable_length(&self) -> usize {
        self.file_name_len as usize + self.extra_field_len as usize
    }
}

/// A complete local file header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalFileHeader {
    pub fixed: LocalFileHeaderFixed,
    pub file_name: Vec<u8>,
    pub extra_field: Vec<u8>,
}

impl LocalFileHeader {
    pub fn parse(data: &[u8]) -> Result<LocalFileHeader, Error> {
        let fixed = LocalFileHeaderFixed::parse(data)?;
        let rest = &data[LocalFileHeaderFixed::SIZE..];
        if rest.len() < fixed.variable_length() {
            return Err(Error::from(ErrorKind::Eof));
        }

        let (file_name, rest) = rest.split_at(fixed.file_name_len as usize);
        let extra_field = &rest[..fixed.extra_field_len as usize];
        Ok(LocalFileHeader {
            fixed,
            file_name: file_name.to_vec(),
            extra_field: extra_field.to_vec(),
        })
    }

    /// Encodes the header. The name and extra field lengths are taken from
    /// the owned buffers, not from `fixed`.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize, Error> {
        let start = out.len();
        let fixed = LocalFileHeaderFixed {
            file_name_len: field_len(&self.file_name, "file name exceeds 65535 bytes")?,
            extra_field_len: field_len(&self.extra_field, "extra field exceeds 65535 bytes")?,
            ..self.fixed
        };
        fixed.write_to(out)?;
        out.extend_from_slice(&self.file_name);
        out.extend_from_slice(&self.extra_field);
        verify_written(
            out,
            start,
            LocalFileHeaderFixed::SIZE + fixed.variable_length(),
        )
    }
}

/// Trailing record carrying the CRC and sizes of an entry whose local header
/// was written before they were known (4.3.9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl DataDescriptor {
    /// Encoded size including the signature
    pub const fn encoded_len(zip64: bool) -> usize {
        if zip64 {
            24
        } else {
            16
        }
    }

    /// Parses a descriptor whose signature may be absent. In Zip64 mode the
    /// sizes are 8 bytes each.
    pub fn parse(data: &[u8], zip64: bool) -> Result<DataDescriptor, Error> {
        let mut cur = data;
        if cur.len() >= 4 && cur[..4] == DATA_DESCRIPTOR_SIGNATURE.to_le_bytes() {
            cur = &cur[4..];
        }

        let body_len = Self::encoded_len(zip64) - 4;
        if cur.len() < body_len {
            return Err(Error::from(ErrorKind::Eof));
        }

        let crc32 = cur.read_u32::<LittleEndian>()?;
        let (compressed_size, uncompressed_size) = if zip64 {
            (
                cur.read_u64::<LittleEndian>()?,
                cur.read_u64::<LittleEndian>()?,
            )
        } else {
            (
                u64::from(cur.read_u32::<LittleEndian>()?),
                u64::from(cur.read_u32::<LittleEndian>()?),
            )
        };

        Ok(DataDescriptor {
            crc32,
            compressed_size,
            uncompressed_size,
        })
    }

    /// Encodes the descriptor with its signature
    pub fn write_to(&self, out: &mut Vec<u8>, zip64: bool) -> Result<usize, Error> {
        let start = out.len();
        out.write_u32::<LittleEndian>(DATA_DESCRIPTOR_SIGNATURE)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        if zip64 {
            out.write_u64::<LittleEndian>(self.compressed_size)?;
            out.write_u64::<LittleEndian>(self.uncompressed_size)?;
        } else {
            let compressed = u32::try_from(self.compressed_size)
                .map_err(|_| Error::malformed("compressed size requires a zip64 descriptor"))?;
            let uncompressed = u32::try_from(self.uncompressed_size)
                .map_err(|_| Error::malformed("uncompressed size requires a zip64 descriptor"))?;
            out.write_u32::<LittleEndian>(compressed)?;
            out.write_u32::<LittleEndian>(uncompressed)?;
        }
        verify_written(out, start, Self::encoded_len(zip64))
    }
}

/// The 46 fixed bytes of a central directory file header (4.3.12)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CentralDirectoryHeaderFixed {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_len: u16,
    pub extra_field_len: u16,
    pub file_comment_len: u16,
    pub disk_number_start: u16,
    pub internal_file_attrs: u16,
    pub external_file_attrs: u32,
    pub local_header_offset: u32,
}

impl CentralDirectoryHeaderFixed {
    pub const SIZE: usize = 46;

    pub fn parse(data: &[u8]) -> Result<CentralDirectoryHeaderFixed, Error> {
        if data.len() < Self::SIZE {
            return Err(Error::from(ErrorKind::Eof));
        }

        let mut cur = &data[..Self::SIZE];
        check_signature(cur.read_u32::<LittleEndian>()?, CENTRAL_HEADER_SIGNATURE)?;

        Ok(CentralDirectoryHeaderFixed {
            version_made_by: cur.read_u16::<LittleEndian>()?,
            version_needed: cur.read_u16::<LittleEndian>()?,
            flags: cur.read_u16::<LittleEndian>()?,
            compression_method: cur.read_u16::<LittleEndian>()?,
            last_mod_time: cur.read_u16::<LittleEndian>()?,
            last_mod_date: cur.read_u16::<LittleEndian>()?,
            crc32: cur.read_u32::<LittleEndian>()?,
            compressed_size: cur.read_u32::<LittleEndian>()?,
            uncompressed_size: cur.read_u32::<LittleEndian>()?,
            file_name_len: cur.read_u16::<LittleEndian>()?,
            extra_field_len: cur.read_u16::<LittleEndian>()?,
            file_comment_len: cur.read_u16::<LittleEndian>()?,
            disk_number_start: cur.read_u16::<LittleEndian>()?,
            internal_file_attrs: cur.read_u16::<LittleEndian>()?,
            external_file_attrs: cur.read_u32::<LittleEndian>()?,
            local_header_offset: cur.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize, Error> {
        let start = out.len();
        out.write_u32::<LittleEndian>(CENTRAL_HEADER_SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method)?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(self.file_name_len)?;
        out.write_u16::<LittleEndian>(self.extra_field_len)?;
        out.write_u16::<LittleEndian>(self.file_comment_len)?;
        out.write_u16::<LittleEndian>(self.disk_number_start)?;
        out.write_u16::<LittleEndian>(self.internal_file_attrs)?;
        out.write_u32::<LittleEndian>(self.external_file_attrs)?;
        out.write_u32::<LittleEndian>(self.local_header_offset)?;
        verify_written(out, start, Self::SIZE)
    }

    pub fn variable_length(&self) -> usize {
        self.file_name_len as usize
            + self.extra_field_len as usize
            + self.file_comment_len as usize
    }
}

/// A complete central directory file header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CentralDirectoryHeader {
    pub fixed: CentralDirectoryHeaderFixed,
    pub file_name: Vec<u8>,
    pub extra_field: Vec<u8>,
    pub file_comment: Vec<u8>,
}

impl CentralDirectoryHeader {
    pub fn parse(data: &[u8]) -> Result<CentralDirectoryHeader, Error> {
        let fixed = CentralDirectoryHeaderFixed::parse(data)?;
        let rest = &data[CentralDirectoryHeaderFixed::SIZE..];
        if rest.len() < fixed.variable_length() {
            return Err(Error::from(ErrorKind::Eof));
        }

        let (file_name, rest) = rest.split_at(fixed.file_name_len as usize);
        let (extra_field, rest) = rest.split_at(fixed.extra_field_len as usize);
        let file_comment = &rest[..fixed.file_comment_len as usize];
        Ok(CentralDirectoryHeader {
            fixed,
            file_name: file_name.to_vec(),
            extra_field: extra_field.to_vec(),
            file_comment: file_comment.to_vec(),
        })
    }

    /// Total encoded length of the record
    pub fn record_len(&self) -> usize {
        CentralDirectoryHeaderFixed::SIZE
            + self.file_name.len()
            + self.extra_field.len()
            + self.file_comment.len()
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize, Error> {
        let start = out.len();
        let fixed = CentralDirectoryHeaderFixed {
            file_name_len: field_len(&self.file_name, "file name exceeds 65535 bytes")?,
            extra_field_len: field_len(&self.extra_field, "extra field exceeds 65535 bytes")?,
            file_comment_len: field_len(&self.file_comment, "file comment exceeds 65535 bytes")?,
            ..self.fixed
        };
        fixed.write_to(out)?;
        out.extend_from_slice(&self.file_name);
        out.extend_from_slice(&self.extra_field);
        out.extend_from_slice(&self.file_comment);
        verify_written(
            out,
            start,
            CentralDirectoryHeaderFixed::SIZE + fixed.variable_length(),
        )
    }
}

/// The 22 fixed bytes of the end of central directory record (4.3.16)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndOfCentralDirectoryRecordFixed {
    pub disk_number: u16,
    pub cd_disk: u16,
    pub entries_on_disk: u16,
    pub total_entries: u16,
    pub central_dir_size: u32,
    pub central_dir_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectoryRecordFixed {
    pub const SIZE: usize = 22;

    pub fn parse(data: &[u8]) -> Result<EndOfCentralDirectoryRecordFixed, Error> {
        if data.len() < Self::SIZE {
            return Err(Error::from(ErrorKind::Eof));
        }

        let mut cur = &data[..Self::SIZE];
        check_signature(
            cur.read_u32::<LittleEndian>()?,
            END_OF_CENTRAL_DIR_SIGNATURE,
        )?;

        Ok(EndOfCentralDirectoryRecordFixed {
            disk_number: cur.read_u16::<LittleEndian>()?,
            cd_disk: cur.read_u16::<LittleEndian>()?,
            entries_on_disk: cur.read_u16::<LittleEndian>()?,
            total_entries: cur.read_u16::<LittleEndian>()?,
            central_dir_size: cur.read_u32::<LittleEndian>()?,
            central_dir_offset: cur.read_u32::<LittleEndian>()?,
            comment_len: cur.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize, Error> {
        let start = out.len();
        out.write_u32::<LittleEndian>(END_OF_CENTRAL_DIR_SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.cd_disk)?;
        out.write_u16::<LittleEndian>(self.entries_on_disk)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.central_dir_size)?;
        out.write_u32::<LittleEndian>(self.central_dir_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)?;
        verify_written(out, start, Self::SIZE)
    }

    /// Reports if any field holds its sentinel, meaning the real value is in
    /// the Zip64 end of central directory record.
    pub fn is_sentineled(&self) -> bool {
        self.entries_on_disk == ZIP64_SENTINEL_U16
            || self.total_entries == ZIP64_SENTINEL_U16
            || self.central_dir_size == ZIP64_SENTINEL_U32
            || self.central_dir_offset == ZIP64_SENTINEL_U32
    }
}

/// The end of central directory record with its trailing comment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndOfCentralDirectoryRecord {
    pub fixed: EndOfCentralDirectoryRecordFixed,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectoryRecord {
    pub fn parse(data: &[u8]) -> Result<EndOfCentralDirectoryRecord, Error> {
        let fixed = EndOfCentralDirectoryRecordFixed::parse(data)?;
        let rest = &data[EndOfCentralDirectoryRecordFixed::SIZE..];
        let comment = rest
            .get(..fixed.comment_len as usize)
            .ok_or(ErrorKind::Eof)?;
        Ok(EndOfCentralDirectoryRecord {
            fixed,
            comment: comment.to_vec(),
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize, Error> {
        let start = out.len();
        let fixed = EndOfCentralDirectoryRecordFixed {
            comment_len: field_len(&self.comment, "archive comment exceeds 65535 bytes")?,
            ..self.fixed
        };
        fixed.write_to(out)?;
        out.extend_from_slice(&self.comment);
        verify_written(
            out,
            start,
            EndOfCentralDirectoryRecordFixed::SIZE + fixed.comment_len as usize,
        )
    }
}

/// Zip64 end of central directory record (4.3.14). The extensible data
/// sector is neither read nor written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zip64EndOfCentralDirectoryRecord {
    /// Size of the record not counting the leading 12 bytes
    pub record_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub cd_disk: u32,
    pub entries_on_disk: u64,
    pub total_entries: u64,
    pub central_dir_size: u64,
    pub central_dir_offset: u64,
}

impl Zip64EndOfCentralDirectoryRecord {
    pub const SIZE: usize = 56;

    /// `record_size` of a record without an extensible data sector
    pub const RECORD_SIZE: u64 = (Self::SIZE - 12) as u64;

    pub fn parse(data: &[u8]) -> Result<Zip64EndOfCentralDirectoryRecord, Error> {
        if data.len() < Self::SIZE {
            return Err(Error::from(ErrorKind::Eof));
        }

        let mut cur = &data[..Self::SIZE];
        check_signature(
            cur.read_u32::<LittleEndian>()?,
            END_OF_CENTRAL_DIR_SIGNATURE64,
        )?;

        Ok(Zip64EndOfCentralDirectoryRecord {
            record_size: cur.read_u64::<LittleEndian>()?,
            version_made_by: cur.read_u16::<LittleEndian>()?,
            version_needed: cur.read_u16::<LittleEndian>()?,
            disk_number: cur.read_u32::<LittleEndian>()?,
            cd_disk: cur.read_u32::<LittleEndian>()?,
            entries_on_disk: cur.read_u64::<LittleEndian>()?,
            total_entries: cur.read_u64::<LittleEndian>()?,
            central_dir_size: cur.read_u64::<LittleEndian>()?,
            central_dir_offset: cur.read_u64::<LittleEndian>()?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize, Error> {
        if self.record_size != Self::RECORD_SIZE {
            return Err(Error::malformed(
                "zip64 extensible data sector is not supported",
            ));
        }

        let start = out.len();
        out.write_u32::<LittleEndian>(END_OF_CENTRAL_DIR_SIGNATURE64)?;
        out.write_u64::<LittleEndian>(self.record_size)?;
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u32::<LittleEndian>(self.disk_number)?;
        out.write_u32::<LittleEndian>(self.cd_disk)?;
        out.write_u64::<LittleEndian>(self.entries_on_disk)?;
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.central_dir_size)?;
        out.write_u64::<LittleEndian>(self.central_dir_offset)?;
        verify_written(out, start, Self::SIZE)
    }
}

/// Zip64 end of central directory locator (4.3.15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zip64EndOfCentralDirectoryLocator {
    /// number of the disk with the start of the zip64 end of central directory
    pub eocd_disk: u32,

    /// relative offset of the zip64 end of central directory record
    pub directory_offset: u64,

    pub total_disks: u32,
}

impl Zip64EndOfCentralDirectoryLocator {
    pub const SIZE: usize = 20;

    pub fn parse(data: &[u8]) -> Result<Zip64EndOfCentralDirectoryLocator, Error> {
        if data.len() < Self::SIZE {
            return Err(Error::from(ErrorKind::Eof));
        }

        let mut cur = &data[..Self::SIZE];
        check_signature(
            cur.read_u32::<LittleEndian>()?,
            END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE,
        )?;

        Ok(Zip64EndOfCentralDirectoryLocator {
            eocd_disk: cur.read_u32::<LittleEndian>()?,
            directory_offset: cur.read_u64::<LittleEndian>()?,
            total_disks: cur.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize, Error> {
        let start = out.len();
        out.write_u32::<LittleEndian>(END_OF_CENTRAL_DIR_LOCATOR_SIGNATURE)?;
        out.write_u32::<LittleEndian>(self.eocd_disk)?;
        out.write_u64::<LittleEndian>(self.directory_offset)?;
        out.write_u32::<LittleEndian>(self.total_disks)?;
        verify_written(out, start, Self::SIZE)
    }
}

/// The end of central directory as resolved when an archive is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOfCentralDirectory {
    /// Only the classic 32-bit record is present
    Plain(EndOfCentralDirectoryRecord),

    /// A Zip64 record was found through the locator. Its values take
    /// precedence over the classic record, which is usually sentineled.
    WithZip64Extension {
        record: EndOfCentralDirectoryRecord,
        locator: Zip64EndOfCentralDirectoryLocator,
        zip64: Zip64EndOfCentralDirectoryRecord,
    },
}

impl EndOfCentralDirectory {
    pub fn record(&self) -> &EndOfCentralDirectoryRecord {
        match self {
            EndOfCentralDirectory::Plain(record) => record,
            EndOfCentralDirectory::WithZip64Extension { record, .. } => record,
        }
    }

    pub fn zip64(&self) -> Option<&Zip64EndOfCentralDirectoryRecord> {
        match self {
            EndOfCentralDirectory::Plain(_) => None,
            EndOfCentralDirectory::WithZip64Extension { zip64, .. } => Some(zip64),
        }
    }

    pub fn is_zip64(&self) -> bool {
        self.zip64().is_some()
    }

    pub fn total_entries(&self) -> u64 {
        match self {
            EndOfCentralDirectory::Plain(record) => u64::from(record.fixed.total_entries),
            EndOfCentralDirectory::WithZip64Extension { zip64, .. } => zip64.total_entries,
        }
    }

    pub fn central_dir_size(&self) -> u64 {
        match self {
            EndOfCentralDirectory::Plain(record) => u64::from(record.fixed.central_dir_size),
            EndOfCentralDirectory::WithZip64Extension { zip64, .. } => zip64.central_dir_size,
        }
    }

    pub fn central_dir_offset(&self) -> u64 {
        match self {
            EndOfCentralDirectory::Plain(record) => u64::from(record.fixed.central_dir_offset),
            EndOfCentralDirectory::WithZip64Extension { zip64, .. } => zip64.central_dir_offset,
        }
    }

    pub fn comment(&self) -> &[u8] {
        &self.record().comment
    }
}

/// Zip64 extended information extra field (4.5.3). Only the fields whose
/// 32-bit counterpart holds a sentinel are present, always in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zip64ExtraField {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub local_header_offset: Option<u64>,
    pub disk_start: Option<u32>,
}

impl Zip64ExtraField {
    /// Length of the field's data, not counting the 4 byte header
    pub fn data_len(&self) -> usize {
        self.uncompressed_size.map_or(0, |_| 8)
            + self.compressed_size.map_or(0, |_| 8)
            + self.local_header_offset.map_or(0, |_| 8)
            + self.disk_start.map_or(0, |_| 4)
    }

    pub fn is_empty(&self) -> bool {
        self.data_len() == 0
    }

    /// Decodes the field data given which 32-bit fields were sentineled.
    pub fn parse(
        mut data: &[u8],
        uncompressed_size: bool,
        compressed_size: bool,
        local_header_offset: bool,
        disk_start: bool,
    ) -> Result<Zip64ExtraField, Error> {
        let result = Zip64ExtraField {
            uncompressed_size: uncompressed_size.then_some(0),
            compressed_size: compressed_size.then_some(0),
            local_header_offset: local_header_offset.then_some(0),
            disk_start: disk_start.then_some(0),
        };

        if data.len() < result.data_len() {
            return Err(Error::malformed("zip64 extra field is too short"));
        }

        let mut read_u64 = |present: bool| -> Result<Option<u64>, Error> {
            if present {
                Ok(Some(data.read_u64::<LittleEndian>()?))
            } else {
                Ok(None)
            }
        };

        let uncompressed_size = read_u64(uncompressed_size)?;
        let compressed_size = read_u64(compressed_size)?;
        let local_header_offset = read_u64(local_header_offset)?;
        let disk_start = if disk_start {
            Some(data.read_u32::<LittleEndian>()?)
        } else {
            None
        };

        Ok(Zip64ExtraField {
            uncompressed_size,
            compressed_size,
            local_header_offset,
            disk_start,
        })
    }

    /// Appends the field with its header. Nothing is written when empty.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize, Error> {
        if self.is_empty() {
            return Ok(0);
        }

        let start = out.len();
        out.write_u16::<LittleEndian>(ZIP64_EXTRA_FIELD_ID)?;
        out.write_u16::<LittleEndian>(self.data_len() as u16)?;
        for value in [
            self.uncompressed_size,
            self.compressed_size,
            self.local_header_offset,
        ]
        .into_iter()
        .flatten()
        {
            out.write_u64::<LittleEndian>(value)?;
        }
        if let Some(disk) = self.disk_start {
            out.write_u32::<LittleEndian>(disk)?;
        }
        verify_written(out, start, 4 + self.data_len())
    }
}

/// Iterates the `(header id, data)` pairs of an extra field blob. A trailing
/// field whose declared size overruns the blob is clamped to what remains.
#[derive(Debug, Clone)]
pub struct ExtraFields<'a> {
    data: &'a [u8],
}

impl<'a> ExtraFields<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ExtraFields { data }
    }
}

impl<'a> Iterator for ExtraFields<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < 4 {
            return None;
        }

        let id = u16::from_le_bytes([self.data[0], self.data[1]]);
        let size = u16::from_le_bytes([self.data[2], self.data[3]]) as usize;
        let rest = &self.data[4..];
        let (field, rest) = rest.split_at(size.min(rest.len()));
        self.data = rest;
        Some((id, field))
    }
}

/// Data of the first Zip64 extended information field in an extra field blob
pub fn find_zip64_extra_field(extra_field: &[u8]) -> Option<&[u8]> {
    ExtraFields::new(extra_field)
        .find(|(id, _)| *id == ZIP64_EXTRA_FIELD_ID)
        .map(|(_, data)| data)
}
