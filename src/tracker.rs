use crate::crc::crc32_chunk;
use std::io::{Read, Write};

/// Observes every byte that passes through a reader or writer and keeps a
/// running CRC-32 and byte count.
///
/// Bytes are only counted once the inner stream accepts or yields them, so a
/// short write or read is tracked exactly.
#[derive(Debug)]
pub struct ChecksumTracker<S> {
    inner: S,
    crc: u32,
    count: u64,
}

impl<S> ChecksumTracker<S> {
    pub fn new(inner: S) -> Self {
        ChecksumTracker {
            inner,
            crc: 0,
            count: 0,
        }
    }

    /// CRC-32 of all bytes observed so far
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// Number of bytes observed so far
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn observe(&mut self, data: &[u8]) {
        self.crc = crc32_chunk(data, self.crc);
        self.count += data.len() as u64;
    }
}

impl<S> Read for ChecksumTracker<S>
where
    S: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.observe(&buf[..read]);
        Ok(read)
    }
}

impl<S> Write for ChecksumTracker<S>
where
    S: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.observe(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
