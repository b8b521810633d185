use crate::errors::Error;
use crate::method::{self, CompressionMethod};
use crate::path::{decode_name, sanitize};
use crate::records::{
    find_zip64_extra_field, CentralDirectoryHeader, CentralDirectoryHeaderFixed,
    LocalFileHeader, LocalFileHeaderFixed, Zip64ExtraField, ZIP64_SENTINEL_U16,
    ZIP64_SENTINEL_U32,
};
use crate::time::{DosDateTime, ZipDateTime};
use std::borrow::Cow;

/// General purpose bit 3: crc and sizes follow the data in a data descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// General purpose bit 11: name and comment are UTF-8
pub const FLAG_UTF8: u16 = 0x0800;

/// MS-DOS directory attribute
pub const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;

/// Version made by: MS-DOS host, application note 4.5
pub(crate) const VERSION_MADE_BY: u16 = 45;

const SENTINEL: u64 = ZIP64_SENTINEL_U32 as u64;

/// Metadata of one file or directory in an archive.
///
/// Entries read from an archive reflect its central directory. Entries
/// produced by the writer are only complete once their write stream is
/// closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    name: String,
    method_id: u16,
    flags: u16,
    compressed_size: u64,
    uncompressed_size: u64,
    crc32: u32,
    modified: DosDateTime,
    local_header_offset: u64,
    external_attributes: u32,
    comment: String,
}

impl ArchiveEntry {
    pub(crate) fn new(
        name: String,
        method: CompressionMethod,
        modified: DosDateTime,
        flags: u16,
        local_header_offset: u64,
    ) -> Self {
        ArchiveEntry {
            name,
            method_id: method.as_id(),
            flags,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            modified,
            local_header_offset,
            external_attributes: 0,
            comment: String::new(),
        }
    }

    /// The name as recorded, decoded from UTF-8 or code page 437
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name rewritten so that it can be joined to an extraction
    /// directory without escaping it. See [`crate::path::sanitize`].
    pub fn sanitized_name(&self) -> Cow<'_, str> {
        sanitize(&self.name)
    }

    /// The compression method or `UnsupportedMethod` for codes other than
    /// Store and Deflate
    pub fn compression_method(&self) -> Result<CompressionMethod, Error> {
        CompressionMethod::from_id(self.method_id)
    }

    /// The raw method code from the header
    pub fn method_id(&self) -> u16 {
        self.method_id
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// CRC-32 of the uncompressed content
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Offset of the local file header, relative to the start of the archive
    /// data (prepended bytes excluded)
    pub fn local_header_offset(&self) -> u64 {
        self.local_header_offset
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn external_attributes(&self) -> u32 {
        self.external_attributes
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Directories are identified by a trailing slash
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Describes if the compressed data is followed by a data descriptor
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    pub fn is_utf8(&self) -> bool {
        self.flags & FLAG_UTF8 != 0
    }

    /// Reports if any size or the offset reaches the 32-bit sentinel and so
    /// must be carried in a Zip64 extra field.
    pub fn needs_zip64(&self) -> bool {
        self.compressed_size >= SENTINEL
            || self.uncompressed_size >= SENTINEL
            || self.local_header_offset >= SENTINEL
    }

    /// Reports if the sizes alone need 64 bits, which decides the layout of
    /// a data descriptor
    pub(crate) fn sizes_need_zip64(&self) -> bool {
        self.compressed_size >= SENTINEL || self.uncompressed_size >= SENTINEL
    }

    /// Minimum version needed to extract this entry
    pub fn version_needed(&self) -> u16 {
        let method = match self.compression_method() {
            Ok(method) => method,
            Err(_) => CompressionMethod::Store,
        };
        method::version_needed(method, self.is_dir(), self.needs_zip64())
    }

    /// The last modification time as written in the header
    pub fn last_modified(&self) -> ZipDateTime {
        ZipDateTime::from_dos(self.modified)
    }

    pub fn dos_last_modified(&self) -> DosDateTime {
        self.modified
    }

    pub(crate) fn set_flags(&mut self, flags: u16) {
        self.flags = flags;
    }

    pub(crate) fn set_external_attributes(&mut self, attributes: u32) {
        self.external_attributes = attributes;
    }

    pub(crate) fn set_result(&mut self, crc32: u32, compressed_size: u64, uncompressed_size: u64) {
        self.crc32 = crc32;
        self.compressed_size = compressed_size;
        self.uncompressed_size = uncompressed_size;
    }

    /// Local file header as written before the content, with the crc and
    /// sizes still unknown
    pub(crate) fn to_local_header(&self) -> LocalFileHeader {
        let (time, date) = self.modified.into_parts();
        let method = match self.compression_method() {
            Ok(method) => method,
            Err(_) => CompressionMethod::Store,
        };
        LocalFileHeader {
            fixed: LocalFileHeaderFixed {
                version_needed: method::version_needed(method, self.is_dir(), false),
                flags: self.flags,
                compression_method: self.method_id,
                last_mod_time: time,
                last_mod_date: date,
                ..Default::default()
            },
            file_name: self.name.as_bytes().to_vec(),
            extra_field: Vec::new(),
        }
    }

    pub(crate) fn to_central_header(&self) -> Result<CentralDirectoryHeader, Error> {
        let zip64 = Zip64ExtraField {
            uncompressed_size: (self.uncompressed_size >= SENTINEL)
                .then_some(self.uncompressed_size),
            compressed_size: (self.compressed_size >= SENTINEL).then_some(self.compressed_size),
            local_header_offset: (self.local_header_offset >= SENTINEL)
                .then_some(self.local_header_offset),
            disk_start: None,
        };

        let mut extra_field = Vec::new();
        zip64.write_to(&mut extra_field)?;

        let (time, date) = self.modified.into_parts();
        Ok(CentralDirectoryHeader {
            fixed: CentralDirectoryHeaderFixed {
                version_made_by: VERSION_MADE_BY,
                version_needed: self.version_needed(),
                flags: self.flags,
                compression_method: self.method_id,
                last_mod_time: time,
                last_mod_date: date,
                crc32: self.crc32,
                compressed_size: clamp_u32(self.compressed_size),
                uncompressed_size: clamp_u32(self.uncompressed_size),
                external_file_attrs: self.external_attributes,
                local_header_offset: clamp_u32(self.local_header_offset),
                ..Default::default()
            },
            file_name: self.name.as_bytes().to_vec(),
            extra_field,
            file_comment: self.comment.as_bytes().to_vec(),
        })
    }

    /// Builds an entry from its central directory record, resolving Zip64
    /// sizes and offsets and decoding the name.
    pub(crate) fn from_central_header(header: &CentralDirectoryHeader) -> Result<Self, Error> {
        let fixed = &header.fixed;
        let utf8 = fixed.flags & FLAG_UTF8 != 0;
        let name = decode_name(&header.file_name, utf8)?;
        if name.is_empty() {
            return Err(Error::malformed("entry name is empty"));
        }
        let comment = decode_name(&header.file_comment, utf8)?;

        let mut entry = ArchiveEntry {
            name,
            method_id: fixed.compression_method,
            flags: fixed.flags,
            compressed_size: u64::from(fixed.compressed_size),
            uncompressed_size: u64::from(fixed.uncompressed_size),
            crc32: fixed.crc32,
            modified: DosDateTime::new(fixed.last_mod_time, fixed.last_mod_date),
            local_header_offset: u64::from(fixed.local_header_offset),
            external_attributes: fixed.external_file_attrs,
            comment,
        };

        let uncompressed = fixed.uncompressed_size == ZIP64_SENTINEL_U32;
        let compressed = fixed.compressed_size == ZIP64_SENTINEL_U32;
        let offset = fixed.local_header_offset == ZIP64_SENTINEL_U32;
        let disk = fixed.disk_number_start == ZIP64_SENTINEL_U16;
        if !(uncompressed || compressed || offset || disk) {
            return Ok(entry);
        }

        let data = find_zip64_extra_field(&header.extra_field)
            .ok_or_else(|| Error::malformed("sentinel value without a zip64 extra field"))?;
        let zip64 = Zip64ExtraField::parse(data, uncompressed, compressed, offset, disk)?;
        if let Some(size) = zip64.uncompressed_size {
            entry.uncompressed_size = size;
        }
        if let Some(size) = zip64.compressed_size {
            entry.compressed_size = size;
        }
        if let Some(offset) = zip64.local_header_offset {
            entry.local_header_offset = offset;
        }

        Ok(entry)
    }
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(ZIP64_SENTINEL_U32)
}
