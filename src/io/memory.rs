use std::io::SeekFrom;

use super::stream::{resolve_seek, Stream};
use crate::error::IoError;

/// Default hard cap on the size of a growable memory stream: 100MB.
pub const DEFAULT_MAX_STREAM_SIZE: u64 = 100 * 1024 * 1024;

/// Minimum number of bytes added beyond the required end when growing.
const MIN_GROWTH: u64 = 1024;

/// In-memory stream over a contiguous buffer.
///
/// Read-only when built from existing bytes, growable when built with
/// [`MemoryStream::new`] or [`MemoryStream::writable_from_vec`]. The backing
/// allocation doubles on demand (at least `MIN_GROWTH` past the write end) and
/// never exceeds `max_size`; a write that would need more fails and leaves the
/// existing content untouched.
///
/// Bytes of the allocation at or beyond the logical size are always zero, so a
/// write past the end zero-fills the gap.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    /// Backing allocation; `data.len()` is the allocated size
    data: Vec<u8>,
    /// Logical end of the stream
    size: u64,
    /// Cursor
    position: u64,
    max_size: u64,
    writable: bool,
    closed: bool,
    identifier: String,
}

impl MemoryStream {
    /// Create an empty, writable stream.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty, writable stream with `capacity` bytes preallocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            size: 0,
            position: 0,
            max_size: DEFAULT_MAX_STREAM_SIZE,
            writable: true,
            closed: false,
            identifier: "mem://buffer".to_string(),
        }
    }

    /// Wrap existing bytes as a read-only stream.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self {
            data,
            size,
            position: 0,
            max_size: size.max(DEFAULT_MAX_STREAM_SIZE),
            writable: false,
            closed: false,
            identifier: "mem://buffer".to_string(),
        }
    }

    /// Wrap existing bytes as a writable stream positioned at the start.
    pub fn writable_from_vec(data: Vec<u8>) -> Self {
        let mut stream = Self::from_vec(data);
        stream.writable = true;
        stream
    }

    /// Set the hard cap on the stream size.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size.max(self.size);
        self
    }

    /// Set the identifier used in log messages.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Allocated size of the backing buffer.
    pub fn allocated(&self) -> usize {
        self.data.len()
    }

    /// The logical contents of the stream.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.size as usize]
    }

    /// Consume the stream and return its logical contents.
    pub fn into_inner(mut self) -> Vec<u8> {
        self.data.truncate(self.size as usize);
        self.data
    }

    /// Grow the allocation so that `required` bytes are addressable.
    fn ensure_allocated(&mut self, required: u64) -> Result<(), IoError> {
        let allocated = self.data.len() as u64;
        if required <= allocated {
            return Ok(());
        }
        if required > self.max_size {
            return Err(IoError::CapacityExceeded {
                required,
                cap: self.max_size,
            });
        }

        let doubled = allocated.saturating_mul(2);
        let target = doubled
            .max(required.saturating_add(MIN_GROWTH))
            .min(self.max_size);
        let target = usize::try_from(target).map_err(|_| IoError::CapacityExceeded {
            required,
            cap: self.max_size,
        })?;

        self.data
            .try_reserve_exact(target - self.data.len())
            .map_err(|_| IoError::CapacityExceeded {
                required,
                cap: self.max_size,
            })?;
        self.data.resize(target, 0);
        Ok(())
    }

    fn check_open(&self) -> Result<(), IoError> {
        if self.closed {
            return Err(IoError::Closed(self.identifier.clone()));
        }
        Ok(())
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        self.check_open()?;
        if self.position >= self.size {
            return Ok(0);
        }

        let available = (self.size - self.position) as usize;
        let n = buf.len().min(available);
        let start = self.position as usize;
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        self.check_open()?;
        if !self.writable {
            return Err(IoError::ReadOnly(self.identifier.clone()));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let end = self
            .position
            .checked_add(buf.len() as u64)
            .ok_or(IoError::CapacityExceeded {
                required: u64::MAX,
                cap: self.max_size,
            })?;
        self.ensure_allocated(end)?;

        let start = self.position as usize;
        self.data[start..start + buf.len()].copy_from_slice(buf);
        self.position = end;
        self.size = self.size.max(end);
        Ok(buf.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, IoError> {
        self.check_open()?;
        self.position = resolve_seek(pos, self.position, self.size)?;
        Ok(self.position)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn close(&mut self) -> Result<(), IoError> {
        self.closed = true;
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
