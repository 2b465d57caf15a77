//! TIFF header and primitive decoding.
//!
//! This module handles parsing of TIFF and BigTIFF file headers and the
//! bounds-checked reading of fixed-width values, which is the foundation for
//! all subsequent parsing operations.
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved (must be 0)
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```

use crate::error::TiffError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le};

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
const VERSION_TIFF: u16 = 42;

/// Version number for BigTIFF
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
///
/// TIFF files declare their byte order in the first two bytes of the header.
/// All multi-byte values in the file must be read respecting this order.
///
/// The `read_*` methods expect a slice of at least the value's width; use
/// [`Decoder`] when the slice comes from untrusted offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// The two magic bytes that open a file in this byte order.
    pub const fn magic(self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => *b"II",
            ByteOrder::BigEndian => *b"MM",
        }
    }

    /// Read a u16 from a byte slice using this byte order.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    /// Read a u32 from a byte slice using this byte order.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    /// Read a u64 from a byte slice using this byte order.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }

    #[inline]
    pub fn read_i16(self, bytes: &[u8]) -> i16 {
        self.read_u16(bytes) as i16
    }

    #[inline]
    pub fn read_i32(self, bytes: &[u8]) -> i32 {
        self.read_u32(bytes) as i32
    }

    #[inline]
    pub fn read_i64(self, bytes: &[u8]) -> i64 {
        self.read_u64(bytes) as i64
    }

    #[inline]
    pub fn read_f32(self, bytes: &[u8]) -> f32 {
        f32::from_bits(self.read_u32(bytes))
    }

    #[inline]
    pub fn read_f64(self, bytes: &[u8]) -> f64 {
        f64::from_bits(self.read_u64(bytes))
    }

    /// Append a u16 in this byte order.
    #[inline]
    pub fn put_u16(self, out: &mut Vec<u8>, value: u16) {
        match self {
            ByteOrder::LittleEndian => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::BigEndian => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    /// Append a u32 in this byte order.
    #[inline]
    pub fn put_u32(self, out: &mut Vec<u8>, value: u32) {
        match self {
            ByteOrder::LittleEndian => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::BigEndian => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    /// Append a u64 in this byte order.
    #[inline]
    pub fn put_u64(self, out: &mut Vec<u8>, value: u64) {
        match self {
            ByteOrder::LittleEndian => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::BigEndian => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    #[inline]
    pub fn put_f32(self, out: &mut Vec<u8>, value: f32) {
        self.put_u32(out, value.to_bits());
    }

    #[inline]
    pub fn put_f64(self, out: &mut Vec<u8>, value: f64) {
        self.put_u64(out, value.to_bits());
    }
}

// =============================================================================
// AddressingMode
// =============================================================================

/// Offset width of a TIFF stream, fixed by the header version.
///
/// Every width-dependent layout decision (entry size, count field, next
/// pointer, inline threshold) goes through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    /// Classic TIFF: 32-bit offsets and counts
    Narrow,
    /// BigTIFF: 64-bit offsets and counts
    Wide,
}

impl AddressingMode {
    /// Header version word for this mode.
    #[inline]
    pub const fn version(self) -> u16 {
        match self {
            AddressingMode::Narrow => VERSION_TIFF,
            AddressingMode::Wide => VERSION_BIGTIFF,
        }
    }

    /// Size of the file header in bytes.
    #[inline]
    pub const fn header_size(self) -> usize {
        match self {
            AddressingMode::Narrow => TIFF_HEADER_SIZE,
            AddressingMode::Wide => BIGTIFF_HEADER_SIZE,
        }
    }

    /// Size of an IFD entry in bytes.
    ///
    /// Classic TIFF: 12 bytes (2 tag + 2 type + 4 count + 4 value/offset)
    /// BigTIFF: 20 bytes (2 tag + 2 type + 8 count + 8 value/offset)
    #[inline]
    pub const fn entry_size(self) -> usize {
        match self {
            AddressingMode::Narrow => 12,
            AddressingMode::Wide => 20,
        }
    }

    /// Size of the entry count field at the start of an IFD (u16 / u64).
    #[inline]
    pub const fn count_size(self) -> usize {
        match self {
            AddressingMode::Narrow => 2,
            AddressingMode::Wide => 8,
        }
    }

    /// Size of an offset, including the next IFD offset at the end of an IFD.
    #[inline]
    pub const fn offset_size(self) -> usize {
        match self {
            AddressingMode::Narrow => 4,
            AddressingMode::Wide => 8,
        }
    }

    /// Maximum number of value bytes stored inline in an entry.
    #[inline]
    pub const fn inline_threshold(self) -> usize {
        self.offset_size()
    }

    /// Largest offset or count representable in this mode.
    #[inline]
    pub const fn max_offset(self) -> u64 {
        match self {
            AddressingMode::Narrow => u32::MAX as u64,
            AddressingMode::Wide => u64::MAX,
        }
    }
}

// =============================================================================
// Decoder
// =============================================================================

/// Bounds-checked reader over a byte window.
///
/// `base` is the absolute stream offset of `bytes[0]`; offsets passed to the
/// `*_at` methods are relative to the window, errors report absolute offsets.
/// Nothing here assumes alignment.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    bytes: &'a [u8],
    order: ByteOrder,
    base: u64,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8], order: ByteOrder, base: u64) -> Self {
        Self { bytes, order, base }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrow `len` bytes at `offset`, or fail with `TruncatedInput`.
    pub fn slice_at(&self, offset: usize, len: usize) -> Result<&'a [u8], TiffError> {
        let end = offset.checked_add(len);
        match end {
            Some(end) if end <= self.bytes.len() => Ok(&self.bytes[offset..end]),
            _ => Err(TiffError::TruncatedInput {
                offset: self.base + offset as u64,
                required: len as u64,
                available: self.bytes.len().saturating_sub(offset) as u64,
            }),
        }
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8, TiffError> {
        Ok(self.slice_at(offset, 1)?[0])
    }

    pub fn i8_at(&self, offset: usize) -> Result<i8, TiffError> {
        Ok(self.u8_at(offset)? as i8)
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16, TiffError> {
        Ok(self.order.read_u16(self.slice_at(offset, 2)?))
    }

    pub fn i16_at(&self, offset: usize) -> Result<i16, TiffError> {
        Ok(self.order.read_i16(self.slice_at(offset, 2)?))
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32, TiffError> {
        Ok(self.order.read_u32(self.slice_at(offset, 4)?))
    }

    pub fn i32_at(&self, offset: usize) -> Result<i32, TiffError> {
        Ok(self.order.read_i32(self.slice_at(offset, 4)?))
    }

    pub fn u64_at(&self, offset: usize) -> Result<u64, TiffError> {
        Ok(self.order.read_u64(self.slice_at(offset, 8)?))
    }

    pub fn i64_at(&self, offset: usize) -> Result<i64, TiffError> {
        Ok(self.order.read_i64(self.slice_at(offset, 8)?))
    }

    pub fn f32_at(&self, offset: usize) -> Result<f32, TiffError> {
        Ok(self.order.read_f32(self.slice_at(offset, 4)?))
    }

    pub fn f64_at(&self, offset: usize) -> Result<f64, TiffError> {
        Ok(self.order.read_f64(self.slice_at(offset, 8)?))
    }

    /// Read an offset-width value (u32 narrow, u64 wide).
    pub fn offset_at(&self, offset: usize, mode: AddressingMode) -> Result<u64, TiffError> {
        match mode {
            AddressingMode::Narrow => self.u32_at(offset).map(u64::from),
            AddressingMode::Wide => self.u64_at(offset),
        }
    }

    /// Read an IFD entry count (u16 narrow, u64 wide).
    pub fn entry_count_at(&self, offset: usize, mode: AddressingMode) -> Result<u64, TiffError> {
        match mode {
            AddressingMode::Narrow => self.u16_at(offset).map(u64::from),
            AddressingMode::Wide => self.u64_at(offset),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
///
/// Contains the essential information needed to begin parsing IFDs:
/// - Byte order for reading all subsequent values
/// - Addressing mode (affects entry sizes and offset widths)
/// - Location of the first IFD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Classic TIFF or BigTIFF
    pub mode: AddressingMode,

    /// Offset to the first IFD in the file (0 = no directories)
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Create a header for writing.
    pub fn new(byte_order: ByteOrder, mode: AddressingMode) -> Self {
        Self {
            byte_order,
            mode,
            first_ifd_offset: 0,
        }
    }

    /// Parse a TIFF header from the first bytes of a stream.
    ///
    /// Pass up to 16 bytes; fewer are fine for classic TIFF. The first IFD
    /// offset is not validated here: the navigator checks it when it parses
    /// the first directory.
    ///
    /// # Errors
    /// - `UnsupportedAddressingMode` if the magic is not II/MM, the version is
    ///   not 42/43, or the BigTIFF offset size is not 8
    /// - `TruncatedInput` if there aren't enough bytes for the header
    pub fn parse(bytes: &[u8]) -> Result<Self, TiffError> {
        // The magic is interpreted before anything else
        if bytes.len() < 2 {
            return Err(TiffError::TruncatedInput {
                offset: 0,
                required: TIFF_HEADER_SIZE as u64,
                available: bytes.len() as u64,
            });
        }

        // Read as little-endian: we're checking for specific byte patterns
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::UnsupportedAddressingMode { magic, version: 0 }),
        };

        let decoder = Decoder::new(bytes, byte_order, 0);
        let version = decoder.u16_at(2)?;

        match version {
            VERSION_TIFF => {
                if bytes.len() < TIFF_HEADER_SIZE {
                    return Err(TiffError::TruncatedInput {
                        offset: 0,
                        required: TIFF_HEADER_SIZE as u64,
                        available: bytes.len() as u64,
                    });
                }

                Ok(TiffHeader {
                    byte_order,
                    mode: AddressingMode::Narrow,
                    first_ifd_offset: decoder.u32_at(4)? as u64,
                })
            }
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::TruncatedInput {
                        offset: 0,
                        required: BIGTIFF_HEADER_SIZE as u64,
                        available: bytes.len() as u64,
                    });
                }

                // Bytes 4-5: offset byte size (must be 8)
                let offset_size = decoder.u16_at(4)?;
                if offset_size != 8 {
                    return Err(TiffError::UnsupportedAddressingMode { magic, version });
                }

                // Bytes 6-7: reserved, zero; only parse_strict insists

                Ok(TiffHeader {
                    byte_order,
                    mode: AddressingMode::Wide,
                    first_ifd_offset: decoder.u64_at(8)?,
                })
            }
            _ => Err(TiffError::UnsupportedAddressingMode { magic, version }),
        }
    }

    /// Like [`parse`](Self::parse), but a BigTIFF header must also have a zero
    /// reserved word.
    ///
    /// # Errors
    /// `UnsupportedAddressingMode` for a non-zero reserved word.
    pub fn parse_strict(bytes: &[u8]) -> Result<Self, TiffError> {
        let header = Self::parse(bytes)?;
        if header.mode == AddressingMode::Wide {
            let reserved = Decoder::new(bytes, header.byte_order, 0).u16_at(6)?;
            if reserved != 0 {
                return Err(TiffError::UnsupportedAddressingMode {
                    magic: u16::from_le_bytes([bytes[0], bytes[1]]),
                    version: VERSION_BIGTIFF,
                });
            }
        }
        Ok(header)
    }

    /// Serialize the header.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.mode.header_size());
        out.extend_from_slice(&self.byte_order.magic());
        self.byte_order.put_u16(&mut out, self.mode.version());
        match self.mode {
            AddressingMode::Narrow => {
                self.byte_order.put_u32(&mut out, self.first_ifd_offset as u32);
            }
            AddressingMode::Wide => {
                self.byte_order.put_u16(&mut out, 8);
                self.byte_order.put_u16(&mut out, 0);
                self.byte_order.put_u64(&mut out, self.first_ifd_offset);
            }
        }
        out
    }

    /// Offset of the first-IFD pointer within the header.
    #[inline]
    pub const fn first_ifd_pointer_offset(&self) -> u64 {
        match self.mode {
            AddressingMode::Narrow => 4,
            AddressingMode::Wide => 8,
        }
    }

    /// Whether this is a BigTIFF file (64-bit offsets).
    #[inline]
    pub const fn is_bigtiff(&self) -> bool {
        matches!(self.mode, AddressingMode::Wide)
    }

    /// Size of an IFD entry in bytes.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        self.mode.entry_size()
    }

    /// Size of the entry count field at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        self.mode.count_size()
    }

    /// Size of the next IFD offset field at the end of an IFD.
    #[inline]
    pub const fn ifd_next_offset_size(&self) -> usize {
        self.mode.offset_size()
    }

    /// Size of the value/offset field in an IFD entry.
    ///
    /// This determines the inline value threshold.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        self.mode.inline_threshold()
    }

    /// Decoder over a window read from absolute offset `base`.
    pub fn decoder<'a>(&self, bytes: &'a [u8], base: u64) -> Decoder<'a> {
        Decoder::new(bytes, self.byte_order, base)
    }
}

// =============================================================================
// Tests
// =============================================================================
