use std::io::SeekFrom;

use bytes::Bytes;

use crate::error::IoError;

/// Seekable random-access byte channel.
///
/// Everything in the crate reads through this trait, so the directory parser
/// never needs to know whether the bytes live in memory, in a file, or behind a
/// cache. Implementations must clamp every access to their own bounds: a
/// corrupt offset handed down from the parser can produce a short read or an
/// error, never an access outside the owned storage.
pub trait Stream {
    /// Read up to `buf.len()` bytes at the cursor and advance it.
    ///
    /// Returns the number of bytes read; 0 at or beyond the end of the stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError>;

    /// Write `buf` at the cursor, extending the stream if needed.
    ///
    /// Returns the number of bytes accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError>;

    /// Move the cursor and return the resulting absolute position.
    ///
    /// Positions beyond [`size`](Stream::size) are legal; positions before 0 are not.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, IoError>;

    /// Current logical size in bytes.
    fn size(&self) -> u64;

    /// Release the backing resource. Further reads and writes fail.
    fn close(&mut self) -> Result<(), IoError>;

    /// Identifier for logging.
    fn identifier(&self) -> &str;

    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// The range is validated against [`size`](Stream::size) before any buffer is
    /// allocated.
    fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let size = self.size();
        let in_bounds = offset
            .checked_add(len as u64)
            .map_or(false, |end| end <= size);
        if !in_bounds {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            });
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        self.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(IoError::RangeOutOfBounds {
                    offset,
                    requested: len as u64,
                    size: offset + filled as u64,
                });
            }
            filled += n;
        }

        Ok(Bytes::from(buf))
    }

    /// Write all of `data` starting at `offset`.
    fn write_all_at(&mut self, offset: u64, data: &[u8]) -> Result<(), IoError> {
        self.seek(SeekFrom::Start(offset))?;
        let mut written = 0;
        while written < data.len() {
            let n = self.write(&data[written..])?;
            if n == 0 {
                return Err(IoError::CapacityExceeded {
                    required: offset + data.len() as u64,
                    cap: offset + written as u64,
                });
            }
            written += n;
        }
        Ok(())
    }
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        (**self).write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, IoError> {
        (**self).seek(pos)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn close(&mut self) -> Result<(), IoError> {
        (**self).close()
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }

    fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        (**self).read_exact_at(offset, len)
    }
}

/// Resolve a [`SeekFrom`] against a cursor and a logical size.
///
/// Shared by the stream implementations so they agree on negative deltas.
pub fn resolve_seek(pos: SeekFrom, cursor: u64, size: u64) -> Result<u64, IoError> {
    let target: i128 = match pos {
        SeekFrom::Start(offset) => offset as i128,
        SeekFrom::Current(delta) => cursor as i128 + delta as i128,
        SeekFrom::End(delta) => size as i128 + delta as i128,
    };

    if target < 0 {
        return Err(IoError::InvalidSeek(target));
    }
    u64::try_from(target).map_err(|_| IoError::InvalidSeek(target))
}

// =============================================================================
// Endian Helper Functions
// =============================================================================
//
// TIFF streams can be either little-endian or big-endian, determined by the
// magic bytes at the start of the file. Callers must check the slice length
// first; `ByteOrder` and `Decoder` do that before calling in here.

/// Read a little-endian u16 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Read a big-endian u16 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

/// Read a little-endian u32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a big-endian u32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a little-endian u64 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 8 bytes.
#[inline]
pub fn read_u64_le(bytes: &[u8]) -> u64 {
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Read a big-endian u64 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 8 bytes.
#[inline]
pub fn read_u64_be(bytes: &[u8]) -> u64 {
    u64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}
