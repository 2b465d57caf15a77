//! Test utilities for integration tests.
//!
//! Two ways to build test files:
//! - [`RawTiff`] places directories at explicit offsets, byte by byte, so
//!   tests can produce cycles, truncation and other malformed layouts
//! - [`strip_image`] and [`tiled_image`] use the library's writer to produce
//!   well-formed images with known unit payloads; [`default_image`] picks the
//!   unit geometry a writer would choose
//!
//! [`TrackingStream`] wraps a stream and records reads and closes.

use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tiffnav::format::tiff::Field;
use tiffnav::{
    default_unit_geometry, AddressingMode, ByteOrder, IoError, MemoryStream, Stream, TiffWriter,
    UnitGeometry, UnitLayout, Value,
};

// =============================================================================
// Raw TIFF Builder
// =============================================================================

/// One raw directory entry.
///
/// `value` is written inline with the type's width when `count` values fit,
/// otherwise it is written as an offset.
#[derive(Debug, Clone, Copy)]
pub struct RawEntry {
    pub tag: u16,
    pub field_type: u16,
    pub count: u64,
    pub value: u64,
}

/// Shorthand for a [`RawEntry`].
pub fn entry(tag: u16, field_type: u16, count: u64, value: u64) -> RawEntry {
    RawEntry {
        tag,
        field_type,
        count,
        value,
    }
}

/// Builder for byte-exact test files.
pub struct RawTiff {
    order: ByteOrder,
    mode: AddressingMode,
    data: Vec<u8>,
}

impl RawTiff {
    /// Classic little-endian file with the first directory at `first`.
    pub fn narrow(first: u64) -> Self {
        Self::new(ByteOrder::LittleEndian, AddressingMode::Narrow, first)
    }

    /// BigTIFF little-endian file with the first directory at `first`.
    pub fn wide(first: u64) -> Self {
        Self::new(ByteOrder::LittleEndian, AddressingMode::Wide, first)
    }

    pub fn new(order: ByteOrder, mode: AddressingMode, first: u64) -> Self {
        let mut data = order.magic().to_vec();
        order.put_u16(&mut data, mode.version());
        match mode {
            AddressingMode::Narrow => order.put_u32(&mut data, first as u32),
            AddressingMode::Wide => {
                order.put_u16(&mut data, 8);
                order.put_u16(&mut data, 0);
                order.put_u64(&mut data, first);
            }
        }
        Self { order, mode, data }
    }

    /// Write a directory at `offset`.
    pub fn directory(mut self, offset: u64, entries: &[RawEntry], next: u64) -> Self {
        let mut table = Vec::new();
        match self.mode {
            AddressingMode::Narrow => self.order.put_u16(&mut table, entries.len() as u16),
            AddressingMode::Wide => self.order.put_u64(&mut table, entries.len() as u64),
        }
        for e in entries {
            self.order.put_u16(&mut table, e.tag);
            self.order.put_u16(&mut table, e.field_type);
            self.put_word(&mut table, e.count);

            let width = field_type_size(e.field_type);
            let inline = (width as u64).saturating_mul(e.count) <= self.mode.inline_threshold() as u64;
            let mut value = Vec::new();
            if inline && e.count == 1 {
                match width {
                    1 => value.push(e.value as u8),
                    2 => self.order.put_u16(&mut value, e.value as u16),
                    4 => self.order.put_u32(&mut value, e.value as u32),
                    _ => self.order.put_u64(&mut value, e.value),
                }
            } else {
                self.put_word(&mut value, e.value);
            }
            value.resize(self.mode.inline_threshold(), 0);
            table.extend_from_slice(&value);
        }
        self.put_word(&mut table, next);
        self.bytes_at(offset, &table)
    }

    /// Write arbitrary bytes at `offset`, growing the file as needed.
    pub fn bytes_at(mut self, offset: u64, bytes: &[u8]) -> Self {
        let start = offset as usize;
        if self.data.len() < start + bytes.len() {
            self.data.resize(start + bytes.len(), 0);
        }
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Write offset-width words at `offset` (4 bytes narrow, 8 wide).
    pub fn words_at(self, offset: u64, words: &[u64]) -> Self {
        let mut bytes = Vec::new();
        for &w in words {
            self.put_word(&mut bytes, w);
        }
        self.bytes_at(offset, &bytes)
    }

    /// Pad the file to `len` bytes.
    pub fn pad_to(mut self, len: usize) -> Self {
        if self.data.len() < len {
            self.data.resize(len, 0);
        }
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    fn put_word(&self, out: &mut Vec<u8>, value: u64) {
        match self.mode {
            AddressingMode::Narrow => self.order.put_u32(out, value as u32),
            AddressingMode::Wide => self.order.put_u64(out, value),
        }
    }
}

fn field_type_size(field_type: u16) -> usize {
    match field_type {
        1 | 2 | 6 | 7 => 1,
        3 | 8 => 2,
        4 | 9 | 11 | 13 => 4,
        5 | 10 | 12 | 16 | 17 | 18 => 8,
        _ => 1,
    }
}

// =============================================================================
// Well-formed Images
// =============================================================================

/// Pixel value at (x, y) of the synthetic test pattern.
pub fn pattern(x: u64, y: u64) -> u8 {
    ((x * 7 + y * 13) % 251) as u8
}

/// 8-bit grayscale image in strips, uncompressed.
pub fn strip_image(mode: AddressingMode, width: u64, height: u64, rows_per_strip: u64) -> Vec<u8> {
    let mut writer = TiffWriter::new(MemoryStream::new(), ByteOrder::LittleEndian, mode).unwrap();

    let mut offsets = Vec::new();
    let mut counts = Vec::new();
    let mut row = 0;
    while row < height {
        let rows = rows_per_strip.min(height - row);
        let strip: Vec<u8> = (row..row + rows)
            .flat_map(|y| (0..width).map(move |x| pattern(x, y)))
            .collect();
        offsets.push(writer.write_blob(&strip).unwrap());
        counts.push(strip.len() as u64);
        row += rows;
    }

    let (offsets, counts) = unit_tables(mode, offsets, counts);
    writer
        .write_directory(&[
            Field::new(256, Value::Long(vec![width as u32])),
            Field::new(257, Value::Long(vec![height as u32])),
            Field::new(258, Value::Short(vec![8])),
            Field::new(259, Value::Short(vec![1])),
            Field::new(262, Value::Short(vec![1])),
            Field::new(273, offsets),
            Field::new(277, Value::Short(vec![1])),
            Field::new(278, Value::Long(vec![rows_per_strip as u32])),
            Field::new(279, counts),
        ])
        .unwrap();
    writer.into_inner().into_inner()
}

/// 8-bit grayscale image in tiles, uncompressed; edge tiles are zero-padded.
pub fn tiled_image(mode: AddressingMode, width: u64, height: u64, tile: u64) -> Vec<u8> {
    let mut writer = TiffWriter::new(MemoryStream::new(), ByteOrder::LittleEndian, mode).unwrap();

    let across = width.div_ceil(tile);
    let down = height.div_ceil(tile);
    let mut offsets = Vec::new();
    let mut counts = Vec::new();
    for ty in 0..down {
        for tx in 0..across {
            let mut data = vec![0u8; (tile * tile) as usize];
            for y in 0..tile {
                for x in 0..tile {
                    let (px, py) = (tx * tile + x, ty * tile + y);
                    if px < width && py < height {
                        data[(y * tile + x) as usize] = pattern(px, py);
                    }
                }
            }
            offsets.push(writer.write_blob(&data).unwrap());
            counts.push(data.len() as u64);
        }
    }

    let (offsets, counts) = unit_tables(mode, offsets, counts);
    writer
        .write_directory(&[
            Field::new(256, Value::Long(vec![width as u32])),
            Field::new(257, Value::Long(vec![height as u32])),
            Field::new(258, Value::Short(vec![8])),
            Field::new(259, Value::Short(vec![1])),
            Field::new(262, Value::Short(vec![1])),
            Field::new(277, Value::Short(vec![1])),
            Field::new(322, Value::Long(vec![tile as u32])),
            Field::new(323, Value::Long(vec![tile as u32])),
            Field::new(324, offsets),
            Field::new(325, counts),
        ])
        .unwrap();
    writer.into_inner().into_inner()
}

/// 8-bit grayscale image with the default strip or tile geometry.
pub fn default_image(mode: AddressingMode, layout: UnitLayout, width: u64, height: u64) -> Vec<u8> {
    match default_unit_geometry(width, height, 1, 8, layout).unwrap() {
        UnitGeometry::Strips { rows_per_strip } => strip_image(mode, width, height, rows_per_strip),
        UnitGeometry::Tiles {
            tile_width,
            tile_length,
        } => {
            assert_eq!(tile_width, tile_length, "tiled_image writes square tiles");
            tiled_image(mode, width, height, tile_width)
        }
    }
}

/// Offset and byte-count values in the width the mode calls for.
fn unit_tables(mode: AddressingMode, offsets: Vec<u64>, counts: Vec<u64>) -> (Value, Value) {
    match mode {
        AddressingMode::Narrow => (
            Value::Long(offsets.into_iter().map(|o| o as u32).collect()),
            Value::Long(counts.into_iter().map(|c| c as u32).collect()),
        ),
        AddressingMode::Wide => (Value::Long8(offsets), Value::Long8(counts)),
    }
}

// =============================================================================
// Tracking Stream
// =============================================================================

/// A stream wrapper that counts reads and records whether it was closed.
pub struct TrackingStream {
    inner: MemoryStream,
    reads: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl TrackingStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            inner: MemoryStream::from_vec(data),
            reads: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared read counter, readable after the stream moved into a navigator.
    pub fn reads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }

    /// Shared close flag.
    pub fn closed(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl Stream for TrackingStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        self.inner.write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, IoError> {
        self.inner.seek(pos)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn close(&mut self) -> Result<(), IoError> {
        self.closed.store(true, Ordering::SeqCst);
        self.inner.close()
    }

    fn identifier(&self) -> &str {
        "tracking"
    }
}
