use std::io::{Read, Seek, SeekFrom};

use super::stream::{resolve_seek, Stream};
use crate::error::IoError;

/// Read-only [`Stream`] over any `std::io` reader, typically a `File`.
///
/// The size is captured once at construction; the reader is not expected to
/// change underneath.
pub struct ReaderStream<R> {
    inner: Option<R>,
    size: u64,
    position: u64,
    identifier: String,
}

impl<R: Read + Seek> ReaderStream<R> {
    /// Wrap a reader, determining its size by seeking to the end.
    pub fn new(mut inner: R, identifier: impl Into<String>) -> Result<Self, IoError> {
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;

        Ok(Self {
            inner: Some(inner),
            size,
            position: 0,
            identifier: identifier.into(),
        })
    }

    fn inner_mut(&mut self) -> Result<&mut R, IoError> {
        match self.inner.as_mut() {
            Some(inner) => Ok(inner),
            None => Err(IoError::Closed(self.identifier.clone())),
        }
    }
}

impl<R: Read + Seek> Stream for ReaderStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        self.inner_mut()?;
        if self.position >= self.size {
            return Ok(0);
        }

        let available = self.size - self.position;
        let want = (buf.len() as u64).min(available) as usize;
        let position = self.position;
        let inner = self.inner_mut()?;
        inner.seek(SeekFrom::Start(position))?;
        let n = inner.read(&mut buf[..want])?;
        self.position += n as u64;
        Ok(n)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize, IoError> {
        Err(IoError::ReadOnly(self.identifier.clone()))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, IoError> {
        self.inner_mut()?;
        self.position = resolve_seek(pos, self.position, self.size)?;
        Ok(self.position)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn close(&mut self) -> Result<(), IoError> {
        self.inner = None;
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
