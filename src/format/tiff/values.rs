//! TIFF tag value reading.
//!
//! This module provides functionality to read tag values from TIFF streams.
//! Values can be stored either inline in the IFD entry (for small values)
//! or at an offset in the stream (for larger values like arrays).
//!
//! Indirect reads are checked against the single-allocation limit before any
//! buffer is requested, and against the stream size before any byte is read.

use std::fmt;

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::Stream;

use super::directory::IfdEntry;
use super::limits::Limits;
use super::parser::{ByteOrder, Decoder, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// Value
// =============================================================================

/// Decoded field value, one variant per storage type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(Vec<u8>),
    /// Raw text bytes, NUL terminators included; one or more strings
    Ascii(Vec<u8>),
    Short(Vec<u16>),
    Long(Vec<u32>),
    /// (numerator, denominator) pairs
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Ifd(Vec<u32>),
    Long8(Vec<u64>),
    SLong8(Vec<i64>),
    Ifd8(Vec<u64>),
}

impl Value {
    /// Decode `count` values of `field_type` from `bytes`.
    pub fn decode(
        bytes: &[u8],
        field_type: FieldType,
        count: u64,
        byte_order: ByteOrder,
        base: u64,
    ) -> Result<Self, TiffError> {
        let decoder = Decoder::new(bytes, byte_order, base);
        let n = count as usize;
        let width = field_type.size_in_bytes();
        // Make sure the whole array is present before decoding element-wise
        decoder.slice_at(0, n.saturating_mul(width))?;

        let value = match field_type {
            FieldType::Byte => Value::Byte(bytes[..n].to_vec()),
            FieldType::Undefined => Value::Undefined(bytes[..n].to_vec()),
            FieldType::Ascii => Value::Ascii(bytes[..n].to_vec()),
            FieldType::SByte => Value::SByte(collect(n, |i| decoder.i8_at(i))?),
            FieldType::Short => Value::Short(collect(n, |i| decoder.u16_at(i * 2))?),
            FieldType::SShort => Value::SShort(collect(n, |i| decoder.i16_at(i * 2))?),
            FieldType::Long => Value::Long(collect(n, |i| decoder.u32_at(i * 4))?),
            FieldType::SLong => Value::SLong(collect(n, |i| decoder.i32_at(i * 4))?),
            FieldType::Ifd => Value::Ifd(collect(n, |i| decoder.u32_at(i * 4))?),
            FieldType::Float => Value::Float(collect(n, |i| decoder.f32_at(i * 4))?),
            FieldType::Rational => Value::Rational(collect(n, |i| {
                Ok((decoder.u32_at(i * 8)?, decoder.u32_at(i * 8 + 4)?))
            })?),
            FieldType::SRational => Value::SRational(collect(n, |i| {
                Ok((decoder.i32_at(i * 8)?, decoder.i32_at(i * 8 + 4)?))
            })?),
            FieldType::Double => Value::Double(collect(n, |i| decoder.f64_at(i * 8))?),
            FieldType::Long8 => Value::Long8(collect(n, |i| decoder.u64_at(i * 8))?),
            FieldType::SLong8 => Value::SLong8(collect(n, |i| decoder.i64_at(i * 8))?),
            FieldType::Ifd8 => Value::Ifd8(collect(n, |i| decoder.u64_at(i * 8))?),
        };
        Ok(value)
    }

    /// Storage type of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Byte(_) => FieldType::Byte,
            Value::Ascii(_) => FieldType::Ascii,
            Value::Short(_) => FieldType::Short,
            Value::Long(_) => FieldType::Long,
            Value::Rational(_) => FieldType::Rational,
            Value::SByte(_) => FieldType::SByte,
            Value::Undefined(_) => FieldType::Undefined,
            Value::SShort(_) => FieldType::SShort,
            Value::SLong(_) => FieldType::SLong,
            Value::SRational(_) => FieldType::SRational,
            Value::Float(_) => FieldType::Float,
            Value::Double(_) => FieldType::Double,
            Value::Ifd(_) => FieldType::Ifd,
            Value::Long8(_) => FieldType::Long8,
            Value::SLong8(_) => FieldType::SLong8,
            Value::Ifd8(_) => FieldType::Ifd8,
        }
    }

    /// Single NUL-terminated string.
    pub fn ascii(text: &str) -> Self {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        Value::Ascii(bytes)
    }

    /// Number of stored values.
    pub fn count(&self) -> u64 {
        let n = match self {
            Value::Byte(v) | Value::Undefined(v) | Value::Ascii(v) => v.len(),
            Value::Short(v) => v.len(),
            Value::Long(v) | Value::Ifd(v) => v.len(),
            Value::Rational(v) => v.len(),
            Value::SByte(v) => v.len(),
            Value::SShort(v) => v.len(),
            Value::SLong(v) => v.len(),
            Value::SRational(v) => v.len(),
            Value::Float(v) => v.len(),
            Value::Double(v) => v.len(),
            Value::Long8(v) | Value::Ifd8(v) => v.len(),
            Value::SLong8(v) => v.len(),
        };
        n as u64
    }

    /// Serialize in `byte_order`; the inverse of [`Value::decode`].
    pub fn encode(&self, byte_order: ByteOrder) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Value::Byte(v) | Value::Undefined(v) | Value::Ascii(v) => out.extend_from_slice(v),
            Value::SByte(v) => out.extend(v.iter().map(|&b| b as u8)),
            Value::Short(v) => v.iter().for_each(|&x| byte_order.put_u16(&mut out, x)),
            Value::SShort(v) => v.iter().for_each(|&x| byte_order.put_u16(&mut out, x as u16)),
            Value::Long(v) | Value::Ifd(v) => {
                v.iter().for_each(|&x| byte_order.put_u32(&mut out, x))
            }
            Value::SLong(v) => v.iter().for_each(|&x| byte_order.put_u32(&mut out, x as u32)),
            Value::Rational(v) => v.iter().for_each(|&(n, d)| {
                byte_order.put_u32(&mut out, n);
                byte_order.put_u32(&mut out, d);
            }),
            Value::SRational(v) => v.iter().for_each(|&(n, d)| {
                byte_order.put_u32(&mut out, n as u32);
                byte_order.put_u32(&mut out, d as u32);
            }),
            Value::Float(v) => v.iter().for_each(|&x| byte_order.put_f32(&mut out, x)),
            Value::Double(v) => v.iter().for_each(|&x| byte_order.put_f64(&mut out, x)),
            Value::Long8(v) | Value::Ifd8(v) => {
                v.iter().for_each(|&x| byte_order.put_u64(&mut out, x))
            }
            Value::SLong8(v) => v.iter().for_each(|&x| byte_order.put_u64(&mut out, x as u64)),
        }
        out
    }

    /// Unsigned integer values widened to u64, or `None` for other types.
    pub fn as_u64_vec(&self) -> Option<Vec<u64>> {
        match self {
            Value::Byte(v) => Some(v.iter().map(|&x| x as u64).collect()),
            Value::Short(v) => Some(v.iter().map(|&x| x as u64).collect()),
            Value::Long(v) | Value::Ifd(v) => Some(v.iter().map(|&x| x as u64).collect()),
            Value::Long8(v) | Value::Ifd8(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// First value as u64, for unsigned integer types.
    pub fn first_u64(&self) -> Option<u64> {
        match self {
            Value::Byte(v) => v.first().map(|&x| x as u64),
            Value::Short(v) => v.first().map(|&x| x as u64),
            Value::Long(v) | Value::Ifd(v) => v.first().map(|&x| x as u64),
            Value::Long8(v) | Value::Ifd8(v) => v.first().copied(),
            _ => None,
        }
    }

    /// First string of a text value, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Ascii(bytes) => std::str::from_utf8(split_strings(bytes).next()?).ok(),
            _ => None,
        }
    }

    /// Every NUL-separated string of a text value, invalid UTF-8 replaced.
    pub fn strings(&self) -> Option<Vec<String>> {
        match self {
            Value::Ascii(bytes) => Some(
                split_strings(bytes)
                    .map(|text| String::from_utf8_lossy(text).into_owned())
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Split text on NUL; the empty tail after a final terminator is not a string.
fn split_strings(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    let empty = bytes.is_empty();
    let body = bytes.strip_suffix(&[0u8]).unwrap_or(bytes);
    body.split(|&b| b == 0).filter(move |_| !empty)
}

fn collect<T>(
    n: usize,
    mut read: impl FnMut(usize) -> Result<T, TiffError>,
) -> Result<Vec<T>, TiffError> {
    (0..n).map(&mut read).collect()
}

/// Lists longer than this are elided when displayed.
const DISPLAY_LIMIT: usize = 16;

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    for (i, value) in values.iter().take(DISPLAY_LIMIT).enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{value}")?;
    }
    if values.len() > DISPLAY_LIMIT {
        write!(f, " ... ({} values)", values.len())?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Ascii(_) => {
                let parts: Vec<String> = self
                    .strings()
                    .unwrap_or_default()
                    .iter()
                    .map(|text| format!("{text:?}"))
                    .collect();
                write_list(f, &parts)
            }
            Value::Byte(v) | Value::Undefined(v) => {
                if v.len() > DISPLAY_LIMIT {
                    write!(f, "<{} bytes>", v.len())
                } else {
                    write_list(f, v)
                }
            }
            Value::Short(v) => write_list(f, v),
            Value::Long(v) | Value::Ifd(v) => write_list(f, v),
            Value::SByte(v) => write_list(f, v),
            Value::SShort(v) => write_list(f, v),
            Value::SLong(v) => write_list(f, v),
            Value::Float(v) => write_list(f, v),
            Value::Double(v) => write_list(f, v),
            Value::Long8(v) | Value::Ifd8(v) => write_list(f, v),
            Value::SLong8(v) => write_list(f, v),
            Value::Rational(v) => {
                let parts: Vec<String> = v.iter().map(|(n, d)| format!("{n}/{d}")).collect();
                write_list(f, &parts)
            }
            Value::SRational(v) => {
                let parts: Vec<String> = v.iter().map(|(n, d)| format!("{n}/{d}")).collect();
                write_list(f, &parts)
            }
        }
    }
}

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from a TIFF stream.
///
/// This struct combines a stream with TIFF header information to read
/// values respecting the file's byte order and format.
pub struct ValueReader<'a, S: Stream + ?Sized> {
    stream: &'a mut S,
    header: &'a TiffHeader,
    limits: &'a Limits,
}

impl<'a, S: Stream + ?Sized> ValueReader<'a, S> {
    /// Create a new ValueReader.
    pub fn new(stream: &'a mut S, header: &'a TiffHeader, limits: &'a Limits) -> Self {
        Self {
            stream,
            header,
            limits,
        }
    }

    /// Get the byte order from the header.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Read raw bytes for an IFD entry's value.
    ///
    /// For inline values, returns the bytes from the entry.
    /// For offset values, fetches the bytes from the stream.
    pub fn read_bytes(&mut self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        if let Some(inline) = entry.inline_bytes()? {
            return Ok(Bytes::copy_from_slice(inline));
        }

        let size = entry.value_byte_size();
        self.limits.check_single(size)?;

        let offset = entry.value_offset(self.header.byte_order);
        let stream_size = self.stream.size();
        let in_bounds = offset.checked_add(size).map_or(false, |end| end <= stream_size);
        if !in_bounds {
            return Err(TiffError::OutOfRangeReference {
                offset,
                length: size,
                size: stream_size,
            });
        }

        Ok(self.stream.read_exact_at(offset, size as usize)?)
    }

    /// Read and decode an entry's full value.
    pub fn read_value(&mut self, entry: &IfdEntry) -> Result<Value, TiffError> {
        let bytes = self.read_bytes(entry)?;
        let base = if entry.is_inline {
            0
        } else {
            entry.value_offset(self.header.byte_order)
        };
        Value::decode(&bytes, entry.field_type, entry.count, self.byte_order(), base)
    }

    /// Read the first value of an unsigned integer entry as u64.
    ///
    /// Handles Byte, Short, Long, Long8 and IFD field types, converting as needed.
    /// Only the first element is fetched from the stream.
    pub fn read_u64(&mut self, entry: &IfdEntry) -> Result<u64, TiffError> {
        // Try inline first
        if let Some(value) = entry.inline_u64(self.header.byte_order) {
            return Ok(value);
        }

        let not_unsigned = || TiffError::InvalidTagValue {
            tag: format!("tag {}", entry.tag_id),
            message: format!(
                "expected an unsigned integer, got {} x{}",
                entry.field_type.name(),
                entry.count
            ),
        };
        if !entry.field_type.is_unsigned_integer() || entry.count == 0 {
            return Err(not_unsigned());
        }

        let first = IfdEntry {
            count: 1,
            ..entry.clone()
        };
        self.read_value(&first)?.first_u64().ok_or_else(not_unsigned)
    }

    /// Read an array of u64 values from an entry.
    ///
    /// This is the primary method for reading offset and byte count arrays.
    /// The entire array is fetched in a single read.
    pub fn read_u64_array(&mut self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        if !entry.field_type.is_unsigned_integer() {
            return Err(TiffError::InvalidTagValue {
                tag: format!("tag {}", entry.tag_id),
                message: format!(
                    "expected Short, Long, or Long8 for array, got {}",
                    entry.field_type.name()
                ),
            });
        }

        let count = entry.count as usize;
        if count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry)?;
        Ok(parse_u64_array(
            &bytes,
            count,
            entry.field_type,
            self.header.byte_order,
        ))
    }
}

// =============================================================================
// Convenience functions for reading from bytes directly
// =============================================================================

/// Parse an array of unsigned integers from raw bytes, widening to u64.
///
/// Elements that don't fit in `bytes` are dropped; other field types yield an
/// empty vector.
pub fn parse_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Vec<u64> {
    let width = field_type.size_in_bytes();
    let available = (bytes.len() / width).min(count);

    let read_one = |chunk: &[u8]| -> Option<u64> {
        match field_type {
            FieldType::Byte => Some(chunk[0] as u64),
            FieldType::Short => Some(byte_order.read_u16(chunk) as u64),
            FieldType::Long | FieldType::Ifd => Some(byte_order.read_u32(chunk) as u64),
            FieldType::Long8 | FieldType::Ifd8 => Some(byte_order.read_u64(chunk)),
            _ => None,
        }
    };

    bytes
        .chunks_exact(width)
        .take(available)
        .map_while(read_one)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
