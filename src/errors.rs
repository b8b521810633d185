/// The error type for every fallible operation in this crate.
///
/// The concrete failure is available through [`Error::kind`], and the coarse
/// grouping callers usually branch on through [`Error::category`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error {
    inner: Box<ErrorKind>,
}

impl Error {
    pub(crate) fn io(err: std::io::Error) -> Error {
        Error::from(ErrorKind::Io(err))
    }

    pub(crate) fn utf8(err: std::str::Utf8Error) -> Error {
        Error::from(ErrorKind::InvalidUtf8(err))
    }

    pub(crate) fn malformed(msg: &'static str) -> Error {
        Error::from(ErrorKind::Malformed { msg })
    }

    pub(crate) fn out_of_sequence(msg: &'static str) -> Error {
        Error::from(ErrorKind::OutOfSequence { msg })
    }

    pub(crate) fn invalid_path(path: &str, reason: &'static str) -> Error {
        Error::from(ErrorKind::InvalidPath {
            path: path.to_string(),
            reason,
        })
    }

    pub(crate) fn is_eof(&self) -> bool {
        matches!(*self.inner, ErrorKind::Eof)
    }

    /// The specific failure
    pub fn kind(&self) -> &ErrorKind {
        &self.inner
    }

    /// Consumes the error and returns the specific failure
    pub fn into_kind(self) -> ErrorKind {
        *self.inner
    }

    /// The broad class of the failure
    pub fn category(&self) -> ErrorCategory {
        match *self.inner {
            ErrorKind::InvalidSignature { .. }
            | ErrorKind::Malformed { .. }
            | ErrorKind::InvalidUtf8(_) => ErrorCategory::Format,
            ErrorKind::MissingEndOfCentralDirectory
            | ErrorKind::MissingZip64EndOfCentralDirectory
            | ErrorKind::Eof => ErrorCategory::TruncatedArchive,
            ErrorKind::EntryCountMismatch { .. } => ErrorCategory::CorruptArchive,
            ErrorKind::InvalidChecksum { .. } | ErrorKind::InvalidSize { .. } => {
                ErrorCategory::CorruptEntry
            }
            ErrorKind::UnsupportedMethod(_) => ErrorCategory::UnsupportedMethod,
            ErrorKind::DuplicateEntry(_) => ErrorCategory::DuplicateEntry,
            ErrorKind::InvalidPath { .. } => ErrorCategory::InvalidPath,
            ErrorKind::OutOfSequence { .. } => ErrorCategory::Sequence,
            ErrorKind::Closed => ErrorCategory::ClosedArchive,
            ErrorKind::Io(_) => ErrorCategory::Io,
        }
    }

    /// Wraps the error so it can travel through `std::io::Read` and
    /// `std::io::Write` implementations.
    pub(crate) fn into_io(self) -> std::io::Error {
        match *self.inner {
            ErrorKind::Io(err) => err,
            _ => std::io::Error::new(std::io::ErrorKind::InvalidData, self),
        }
    }
}

/// Coarse grouping of [`ErrorKind`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A record had a bad signature or could not be decoded
    Format,

    /// The end of central directory or central directory is missing or cut short
    TruncatedArchive,

    /// The central directory disagrees with its own declared entry count
    CorruptArchive,

    /// An entry's content does not match its recorded checksum or size
    CorruptEntry,

    /// The entry is compressed with a method other than Store or Deflate
    UnsupportedMethod,

    /// The writer was asked to add a name it already holds
    DuplicateEntry,

    /// An entry name is absolute, escapes the archive root, or is otherwise unusable
    InvalidPath,

    /// An operation was invoked out of its required order
    Sequence,

    /// The archive handle was already closed
    ClosedArchive,

    /// The underlying container or sink failed
    Io,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    #[error("invalid signature: expected 0x{expected:08x}, got 0x{actual:08x}")]
    InvalidSignature { expected: u32, actual: u32 },

    #[error("malformed record: {msg}")]
    Malformed { msg: &'static str },

    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(std::str::Utf8Error),

    #[error("missing end of central directory")]
    MissingEndOfCentralDirectory,

    #[error("missing zip64 end of central directory")]
    MissingZip64EndOfCentralDirectory,

    #[error("unexpected end of file")]
    Eof,

    #[error("central directory declares {expected} entries but {actual} were found")]
    EntryCountMismatch { expected: u64, actual: u64 },

    #[error("invalid checksum: expected 0x{expected:08x}, got 0x{actual:08x}")]
    InvalidChecksum { expected: u32, actual: u32 },

    #[error("invalid size: expected {expected}, got {actual}")]
    InvalidSize { expected: u64, actual: u64 },

    #[error("unsupported compression method: {0}")]
    UnsupportedMethod(u16),

    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("invalid entry path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("out of sequence: {msg}")]
    OutOfSequence { msg: &'static str },

    #[error("archive is closed")]
    Closed,

    #[error(transparent)]
    Io(std::io::Error),
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Box::new(kind),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Recovers a crate error that was tunneled through an I/O interface,
    /// otherwise wraps the I/O error as is.
    fn from(err: std::io::Error) -> Error {
        let tunneled = err.get_ref().is_some_and(|inner| inner.is::<Error>());
        if !tunneled {
            return Error::io(err);
        }

        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            _ => Error::io(std::io::Error::from(kind)),
        }
    }
}
