#[cfg(unix)]
use std::os::unix::fs::FileExt;
use std::sync::{Mutex, PoisonError};

/// Reads bytes at a given offset without moving a shared cursor
///
/// Since reads take `&self`, an archive can hand out read streams for
/// several entries at once, each tracking its own position. Modelled after
/// Go's [`io.ReaderAt`](https://pkg.go.dev/io#ReaderAt).
pub trait ReaderAt {
    /// Read bytes from the reader at a specific offset
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize>;

    /// Sibling to [`read_exact`](std::io::Read::read_exact), but at an offset
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        let mut read = 0;
        while read < buf.len() {
            let latest = self.read_at(&mut buf[read..], offset + (read as u64))?;
            if latest == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ));
            }
            read += latest;
        }
        Ok(())
    }
}

/// A file that implements [`ReaderAt`] on every platform: positioned reads
/// on unix, a mutex guarded seek and read elsewhere.
#[cfg(not(unix))]
pub struct FileReader(MutexReader<std::fs::File>);

/// A file that implements [`ReaderAt`] on every platform: positioned reads
/// on unix, a mutex guarded seek and read elsewhere.
#[cfg(unix)]
pub struct FileReader(std::fs::File);

impl FileReader {
    pub fn into_inner(self) -> std::fs::File {
        #[cfg(not(unix))]
        return self.0.into_inner();
        #[cfg(unix)]
        return self.0;
    }
}

impl ReaderAt for FileReader {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        self.0.read_at(buf, offset)
    }
}

impl From<std::fs::File> for FileReader {
    #[cfg(not(unix))]
    fn from(file: std::fs::File) -> Self {
        Self(MutexReader::new(file))
    }

    #[cfg(unix)]
    fn from(file: std::fs::File) -> Self {
        Self(file)
    }
}

/// Adapts any `Read + Seek` container into a [`ReaderAt`] by seeking and
/// reading under a mutex, restoring the original position afterwards.
pub struct MutexReader<R>(Mutex<R>);

impl<R> MutexReader<R> {
    pub fn new(inner: R) -> Self {
        Self(Mutex::new(inner))
    }

    pub fn into_inner(self) -> R {
        self.0.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R> ReaderAt for MutexReader<R>
where
    R: std::io::Read + std::io::Seek,
{
    // Same approach as Go's positioned reads on Windows:
    // https://github.com/golang/go/blob/70b603f4d295573197b43ad090d7cad21895144e/src/internal/poll/fd_windows.go#L525
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        use std::io::{Read, Seek};

        let mut lock = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let original_position = lock.stream_position()?;
        lock.seek(std::io::SeekFrom::Start(offset))?;
        let result = lock.read(buf);
        lock.seek(std::io::SeekFrom::Start(original_position))?;
        result
    }
}

impl<T: ReaderAt + ?Sized> ReaderAt for &'_ T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

impl<T: ReaderAt + ?Sized> ReaderAt for std::sync::Arc<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

impl ReaderAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        let skip = usize::try_from(offset).unwrap_or(usize::MAX).min(self.len());
        let data = &self[skip..];
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }
}

impl ReaderAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }
}

impl<R> ReaderAt for std::io::Cursor<R>
where
    R: AsRef<[u8]>,
{
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        self.get_ref().as_ref().read_at(buf, offset)
    }
}

/// Sequential reader over the `[offset, end)` window of a [`ReaderAt`]
#[derive(Debug)]
pub struct RangeReader<R> {
    reader: R,
    offset: u64,
    end: u64,
}

impl<R> RangeReader<R> {
    pub fn new(reader: R, offset: u64, end: u64) -> Self {
        RangeReader {
            reader,
            offset,
            end: end.max(offset),
        }
    }

    /// Bytes left in the window
    pub fn remaining(&self) -> u64 {
        self.end - self.offset
    }

    /// Offset one past the window
    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }
}

impl<R> std::io::Read for RangeReader<R>
where
    R: ReaderAt,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let len = usize::try_from(self.remaining())
            .unwrap_or(usize::MAX)
            .min(buf.len());
        if len == 0 {
            return Ok(0);
        }

        let read = self.reader.read_at(&mut buf[..len], self.offset)?;
        if read == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "entry data extends past the end of the container",
            ));
        }
        self.offset += read as u64;
        Ok(read)
    }
}
