//! Strip and tile addressing.
//!
//! Image data of a directory is split into units: horizontal strips of
//! `RowsPerStrip` rows, or rectangular (optionally volumetric) tiles. With
//! `PlanarConfiguration = 2` each sample has its own set of units, stored one
//! plane after the other:
//!
//! ```text
//! chunky:   unit i covers all samples
//! separate: unit (plane * units_per_plane + i) covers one sample
//! ```
//!
//! Tiles are numbered row-major within a slice, slices follow each other,
//! and edge tiles extend past the image. Their stored size is still a full
//! tile; [`Addressing::tile_dimensions`] reports the part inside the image.

use tracing::{debug, warn};

use crate::error::TiffError;
use crate::io::Stream;

use super::directory::Directory;
use super::limits::{checked_product, checked_sum, div_ceil};
use super::navigator::Navigator;
use super::parser::AddressingMode;
use super::tags::TiffTag;

/// Target uncompressed size of one default strip.
pub const DEFAULT_STRIP_BYTES: u64 = 8 * 1024;

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u64 = 256;

/// Tile edges are multiples of this many pixels.
pub const TILE_ALIGNMENT: u64 = 16;

// =============================================================================
// Layout
// =============================================================================

/// How image data is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitLayout {
    Strips,
    Tiles,
}

impl UnitLayout {
    pub fn name(self) -> &'static str {
        match self {
            UnitLayout::Strips => "strips",
            UnitLayout::Tiles => "tiles",
        }
    }
}

/// How samples of a pixel are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanarConfig {
    /// All samples of a pixel together
    Chunky,
    /// One plane per sample
    Separate,
}

impl PlanarConfig {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(PlanarConfig::Chunky),
            2 => Some(PlanarConfig::Separate),
            _ => None,
        }
    }
}

/// Unit geometry suggested for writing an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitGeometry {
    Strips { rows_per_strip: u64 },
    Tiles { tile_width: u64, tile_length: u64 },
}

// =============================================================================
// Addressing
// =============================================================================

/// Resolved unit geometry and unit tables of one directory.
///
/// Geometry fields hold raw values with baseline defaults applied. Zero or
/// overflowing dimensions are reported by the methods that need them, so a
/// directory with bad geometry can still be inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addressing {
    pub layout: UnitLayout,
    pub mode: AddressingMode,
    pub planar: PlanarConfig,

    pub width: u64,
    pub height: u64,
    pub depth: u64,
    pub samples_per_pixel: u64,
    pub bits_per_sample: u64,

    /// Clamped to the image height
    pub rows_per_strip: u64,
    pub tile_width: u64,
    pub tile_length: u64,
    pub tile_depth: u64,

    pub compression: u16,
    pub predictor: u16,

    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    stream_size: u64,
    max_cumulative_alloc: u64,
}

impl Addressing {
    /// Read the geometry and unit tables of `directory`.
    ///
    /// The offset and byte-count arrays count against one allocation budget.
    /// A missing array resolves to an empty table; accessing a unit then
    /// fails with `OutOfRangeReference`.
    ///
    /// # Errors
    /// - `MissingTag` for a missing ImageWidth or ImageLength
    /// - `InvalidTagValue` for an unknown PlanarConfiguration
    /// - `AllocationLimitExceeded` if the unit tables exceed the limits
    /// - `MalformedDirectory` in strict mode if a unit table is longer or
    ///   shorter than the unit count
    pub fn resolve<S: Stream>(
        navigator: &mut Navigator<S>,
        directory: &Directory,
    ) -> Result<Self, TiffError> {
        let mode = navigator.mode();
        let limits = navigator.options().limits.clone();
        let strict = navigator.options().strict;

        // Scalar fields: inline values first, then the stream
        let mut field = |tag: TiffTag| -> Result<Option<u64>, TiffError> {
            let Some(entry) = directory.get_tag(tag) else {
                return Ok(None);
            };
            navigator
                .value_reader()
                .read_u64(entry)
                .map(Some)
                .map_err(|err| err.for_tag(format!("{:?}", tag)))
        };
        let defaulted = |value: Option<u64>, tag: TiffTag| value.or(tag.default_value()).unwrap_or(1);

        let width = field(TiffTag::ImageWidth)?.ok_or(TiffError::MissingTag("ImageWidth"))?;
        let height = field(TiffTag::ImageLength)?.ok_or(TiffError::MissingTag("ImageLength"))?;
        let depth = defaulted(field(TiffTag::ImageDepth)?, TiffTag::ImageDepth);
        let samples_per_pixel = defaulted(field(TiffTag::SamplesPerPixel)?, TiffTag::SamplesPerPixel);
        let bits_per_sample = defaulted(field(TiffTag::BitsPerSample)?, TiffTag::BitsPerSample);

        let planar_value = defaulted(field(TiffTag::PlanarConfiguration)?, TiffTag::PlanarConfiguration);
        let planar = u16::try_from(planar_value)
            .ok()
            .and_then(PlanarConfig::from_u16)
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: "PlanarConfiguration".to_string(),
                message: format!("unknown value {}", planar_value),
            })?;

        let compression = defaulted(field(TiffTag::Compression)?, TiffTag::Compression);
        let predictor = defaulted(field(TiffTag::Predictor)?, TiffTag::Predictor);

        let layout = if directory.is_tiled() {
            UnitLayout::Tiles
        } else {
            UnitLayout::Strips
        };

        let (rows_per_strip, tile_width, tile_length, tile_depth) = match layout {
            UnitLayout::Strips => {
                let rows = defaulted(field(TiffTag::RowsPerStrip)?, TiffTag::RowsPerStrip);
                (rows.min(height.max(1)), 0, 0, 1)
            }
            UnitLayout::Tiles => (
                0,
                field(TiffTag::TileWidth)?.unwrap_or(0),
                field(TiffTag::TileLength)?.unwrap_or(0),
                defaulted(field(TiffTag::TileDepth)?, TiffTag::TileDepth),
            ),
        };

        let (offsets_tag, counts_tag) = match layout {
            UnitLayout::Strips => (TiffTag::StripOffsets, TiffTag::StripByteCounts),
            UnitLayout::Tiles => (TiffTag::TileOffsets, TiffTag::TileByteCounts),
        };

        let mut budget = limits.budget();
        let mut table = |tag: TiffTag| -> Result<Vec<u64>, TiffError> {
            let Some(entry) = directory.get_tag(tag) else {
                debug!(offset = directory.offset(), tag = ?tag, "Unit table missing");
                return Ok(Vec::new());
            };
            let values = navigator.value_reader().read_u64_array(entry)?;
            // Held as u64 regardless of the stored width
            budget.reserve(values.len() as u64 * 8)?;
            Ok(values)
        };
        let offsets = table(offsets_tag)?;
        let byte_counts = table(counts_tag)?;

        let addressing = Self {
            layout,
            mode,
            planar,
            width,
            height,
            depth,
            samples_per_pixel,
            bits_per_sample,
            rows_per_strip,
            tile_width,
            tile_length,
            tile_depth,
            compression: u16::try_from(compression).unwrap_or(u16::MAX),
            predictor: u16::try_from(predictor).unwrap_or(u16::MAX),
            offsets,
            byte_counts,
            stream_size: navigator.stream_size(),
            max_cumulative_alloc: limits.max_cumulative_alloc,
        };
        addressing.check_table_lengths(directory.offset(), strict)?;
        Ok(addressing)
    }

    /// Compare present unit tables with the unit count.
    ///
    /// Mismatches fail in strict mode and are logged otherwise. Missing tables
    /// and unaddressable geometry are left to the unit accessors.
    fn check_table_lengths(&self, offset: u64, strict: bool) -> Result<(), TiffError> {
        let Ok(expected) = self.unit_count() else {
            return Ok(());
        };
        let (offsets_name, counts_name) = match self.layout {
            UnitLayout::Strips => ("StripOffsets", "StripByteCounts"),
            UnitLayout::Tiles => ("TileOffsets", "TileByteCounts"),
        };
        for (name, len) in [
            (offsets_name, self.offsets.len() as u64),
            (counts_name, self.byte_counts.len() as u64),
        ] {
            if len == 0 || len == expected {
                continue;
            }
            if strict {
                return Err(TiffError::malformed(
                    offset,
                    format!(
                        "{name} has {len} values, the image has {expected} {}",
                        self.layout.name()
                    ),
                ));
            }
            warn!(
                offset,
                table = name,
                len,
                expected,
                "Unit table length does not match the unit count"
            );
        }
        Ok(())
    }

    pub fn is_tiled(&self) -> bool {
        self.layout == UnitLayout::Tiles
    }

    /// Number of sample planes: 1 for chunky data.
    pub fn planes(&self) -> u64 {
        match self.planar {
            PlanarConfig::Chunky => 1,
            PlanarConfig::Separate => self.samples_per_pixel,
        }
    }

    /// Samples stored in each pixel of one unit.
    fn unit_samples(&self) -> u64 {
        match self.planar {
            PlanarConfig::Chunky => self.samples_per_pixel,
            PlanarConfig::Separate => 1,
        }
    }

    /// Bytes in one sample, rounded up.
    pub fn bytes_per_sample(&self) -> u64 {
        div_ceil(self.bits_per_sample, 8)
    }

    // -------------------------------------------------------------------------
    // Unit counts
    // -------------------------------------------------------------------------

    /// Units along x, y and z for tiles.
    pub fn tiles_across(&self) -> Result<(u64, u64, u64), TiffError> {
        self.check_tile_geometry()?;
        Ok((
            div_ceil(self.width, self.tile_width),
            div_ceil(self.height, self.tile_length),
            div_ceil(self.depth, self.tile_depth),
        ))
    }

    /// Strips in one plane.
    pub fn strips_per_plane(&self) -> Result<u64, TiffError> {
        if self.rows_per_strip == 0 {
            return Err(TiffError::InvalidGeometry("RowsPerStrip is zero".to_string()));
        }
        Ok(div_ceil(self.height, self.rows_per_strip))
    }

    /// Units in one plane.
    pub fn units_per_plane(&self) -> Result<u64, TiffError> {
        match self.layout {
            UnitLayout::Strips => self.strips_per_plane(),
            UnitLayout::Tiles => {
                let (x, y, z) = self.tiles_across()?;
                checked_product(&[x, y, z], "tile count")
            }
        }
    }

    /// Total number of strips or tiles, all planes included.
    ///
    /// # Errors
    /// `InvalidGeometry` for a zero tile dimension or RowsPerStrip, or if the
    /// count overflows.
    pub fn unit_count(&self) -> Result<u64, TiffError> {
        checked_product(&[self.units_per_plane()?, self.planes()], "unit count")
    }

    // -------------------------------------------------------------------------
    // Unit tables
    // -------------------------------------------------------------------------

    /// Offset and byte count of unit `index`, checked against the stream.
    ///
    /// # Errors
    /// `OutOfRangeReference` if `index` is past the unit count or the tables,
    /// if a narrow-mode byte count exceeds 32 bits, or if the unit does not
    /// lie inside the stream.
    pub fn unit_span(&self, index: u64) -> Result<(u64, u64), TiffError> {
        let count = self.unit_count()?;
        let table_len = self.offsets.len().min(self.byte_counts.len()) as u64;
        if index >= count || index >= table_len {
            return Err(index_out_of_range(index, count.min(table_len)));
        }

        let offset = self.offsets[index as usize];
        let length = self.byte_counts[index as usize];

        if self.mode == AddressingMode::Narrow && length > u32::MAX as u64 {
            return Err(TiffError::OutOfRangeReference {
                offset,
                length,
                size: u32::MAX as u64,
            });
        }
        let in_bounds = offset
            .checked_add(length)
            .map_or(false, |end| end <= self.stream_size);
        if !in_bounds {
            return Err(TiffError::OutOfRangeReference {
                offset,
                length,
                size: self.stream_size,
            });
        }
        Ok((offset, length))
    }

    pub fn unit_offset(&self, index: u64) -> Result<u64, TiffError> {
        self.unit_span(index).map(|(offset, _)| offset)
    }

    pub fn unit_byte_count(&self, index: u64) -> Result<u64, TiffError> {
        self.unit_span(index).map(|(_, length)| length)
    }

    /// Stored size of a unit; the same as its byte count.
    pub fn unit_compressed_size(&self, index: u64) -> Result<u64, TiffError> {
        self.unit_byte_count(index)
    }

    /// Decoded size of unit `index`.
    ///
    /// The last strip of a plane may hold fewer rows; tiles are always full.
    pub fn unit_uncompressed_size(&self, index: u64) -> Result<u64, TiffError> {
        match self.layout {
            UnitLayout::Strips => {
                let rows = self.strip_rows(index)?;
                checked_product(&[rows, self.scanline_size()?], "strip size")
            }
            UnitLayout::Tiles => {
                let count = self.unit_count()?;
                if index >= count {
                    return Err(index_out_of_range(index, count));
                }
                self.tile_size()
            }
        }
    }

    /// Number of entries in the offset table.
    pub fn table_len(&self) -> usize {
        self.offsets.len()
    }

    // -------------------------------------------------------------------------
    // Sizes
    // -------------------------------------------------------------------------

    /// Bytes in one image row of one plane, bits packed and rounded up.
    pub fn scanline_size(&self) -> Result<u64, TiffError> {
        let bits = checked_product(
            &[self.width, self.unit_samples(), self.bits_per_sample],
            "scanline size",
        )?;
        Ok(div_ceil(bits, 8))
    }

    /// Bytes in a full strip.
    pub fn strip_size(&self) -> Result<u64, TiffError> {
        if self.layout != UnitLayout::Strips {
            return Err(TiffError::InvalidGeometry("directory is tiled".to_string()));
        }
        checked_product(
            &[self.rows_per_strip.min(self.height), self.scanline_size()?],
            "strip size",
        )
    }

    /// Bytes in one row of a tile.
    pub fn tile_row_size(&self) -> Result<u64, TiffError> {
        self.check_tile_geometry()?;
        let bits = checked_product(
            &[self.tile_width, self.unit_samples(), self.bits_per_sample],
            "tile row size",
        )?;
        Ok(div_ceil(bits, 8))
    }

    /// Bytes in a full tile, edge tiles included.
    pub fn tile_size(&self) -> Result<u64, TiffError> {
        if self.layout != UnitLayout::Tiles {
            return Err(TiffError::InvalidGeometry("directory is stripped".to_string()));
        }
        checked_product(
            &[self.tile_row_size()?, self.tile_length, self.tile_depth],
            "tile size",
        )
    }

    /// Bytes in one row of a decoded unit.
    pub fn unit_row_size(&self) -> Result<u64, TiffError> {
        match self.layout {
            UnitLayout::Strips => self.scanline_size(),
            UnitLayout::Tiles => self.tile_row_size(),
        }
    }

    /// Pixels in one row of a decoded unit.
    pub fn unit_row_width(&self) -> u64 {
        match self.layout {
            UnitLayout::Strips => self.width,
            UnitLayout::Tiles => self.tile_width,
        }
    }

    /// Bytes between the same sample of adjacent pixels in a decoded unit.
    pub fn pixel_stride_bytes(&self) -> u64 {
        self.unit_samples().saturating_mul(self.bytes_per_sample())
    }

    /// Decoded size of the whole image, all samples included.
    ///
    /// # Errors
    /// - `InvalidGeometry` on overflow
    /// - `AllocationLimitExceeded` above the cumulative allocation limit
    pub fn image_size(&self) -> Result<u64, TiffError> {
        let size = checked_product(
            &[
                self.width,
                self.height,
                self.depth,
                self.samples_per_pixel,
                self.bytes_per_sample(),
            ],
            "image size",
        )?;
        if size > self.max_cumulative_alloc {
            return Err(TiffError::AllocationLimitExceeded {
                requested: size,
                limit: self.max_cumulative_alloc,
            });
        }
        Ok(size)
    }

    // -------------------------------------------------------------------------
    // Coordinates
    // -------------------------------------------------------------------------

    /// Strip holding image row `row` of sample plane `sample`.
    ///
    /// `sample` is ignored for chunky data.
    pub fn compute_strip(&self, row: u64, sample: u64) -> Result<u64, TiffError> {
        // Fails when the strips of all planes cannot be numbered in 64 bits
        self.unit_count()?;
        if row >= self.height {
            return Err(index_out_of_range(row, self.height));
        }
        let per_plane = self.strips_per_plane()?;
        let strip = row / self.rows_per_strip;
        self.plane_unit(sample, per_plane, strip)
    }

    /// Tile holding pixel (`x`, `y`, `z`) of sample plane `sample`.
    ///
    /// `sample` is ignored for chunky data.
    pub fn compute_tile(&self, x: u64, y: u64, z: u64, sample: u64) -> Result<u64, TiffError> {
        let (across, down, _) = self.tiles_across()?;
        let per_plane = self.units_per_plane()?;
        self.unit_count()?;
        if x >= self.width {
            return Err(index_out_of_range(x, self.width));
        }
        if y >= self.height {
            return Err(index_out_of_range(y, self.height));
        }
        if z >= self.depth {
            return Err(index_out_of_range(z, self.depth));
        }

        let (tx, ty, tz) = (x / self.tile_width, y / self.tile_length, z / self.tile_depth);
        let row = checked_sum(checked_product(&[tz, down], "tile index")?, ty, "tile index")?;
        let in_plane = checked_sum(checked_product(&[row, across], "tile index")?, tx, "tile index")?;
        self.plane_unit(sample, per_plane, in_plane)
    }

    /// Number unit `in_plane` of sample plane `sample`.
    fn plane_unit(&self, sample: u64, per_plane: u64, in_plane: u64) -> Result<u64, TiffError> {
        match self.planar {
            PlanarConfig::Chunky => Ok(in_plane),
            PlanarConfig::Separate => {
                if sample >= self.samples_per_pixel {
                    return Err(index_out_of_range(sample, self.samples_per_pixel));
                }
                let start = checked_product(&[sample, per_plane], "unit index")?;
                checked_sum(start, in_plane, "unit index")
            }
        }
    }

    /// Pixel extent (width, length, depth) of tile `index` inside the image.
    ///
    /// Edge tiles report only the covered part.
    pub fn tile_dimensions(&self, index: u64) -> Result<(u64, u64, u64), TiffError> {
        let (across, down, _) = self.tiles_across()?;
        let count = self.unit_count()?;
        if index >= count {
            return Err(index_out_of_range(index, count));
        }

        let in_plane = index % self.units_per_plane()?;
        let tx = in_plane % across;
        let ty = (in_plane / across) % down;
        let tz = in_plane / (across * down);

        Ok((
            edge_extent(self.width, self.tile_width, tx),
            edge_extent(self.height, self.tile_length, ty),
            edge_extent(self.depth, self.tile_depth, tz),
        ))
    }

    /// Image rows stored in strip `index`.
    pub fn strip_rows(&self, index: u64) -> Result<u64, TiffError> {
        if self.layout != UnitLayout::Strips {
            return Err(TiffError::InvalidGeometry("directory is tiled".to_string()));
        }
        let count = self.unit_count()?;
        if index >= count {
            return Err(index_out_of_range(index, count));
        }
        let in_plane = index % self.strips_per_plane()?;
        Ok(edge_extent(self.height, self.rows_per_strip, in_plane))
    }

    fn check_tile_geometry(&self) -> Result<(), TiffError> {
        if self.layout != UnitLayout::Tiles {
            return Err(TiffError::InvalidGeometry("directory is stripped".to_string()));
        }
        if self.tile_width == 0 || self.tile_length == 0 || self.tile_depth == 0 {
            return Err(TiffError::InvalidGeometry(format!(
                "zero tile dimension {}x{}x{}",
                self.tile_width, self.tile_length, self.tile_depth
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Geometry helpers
// =============================================================================

/// Unit geometry for writing an image of the given shape.
///
/// Strips hold about [`DEFAULT_STRIP_BYTES`] bytes each, at least one row and
/// at most the whole image. Tiles are [`DEFAULT_TILE_SIZE`] square.
pub fn default_unit_geometry(
    width: u64,
    height: u64,
    samples_per_pixel: u64,
    bits_per_sample: u64,
    layout: UnitLayout,
) -> Result<UnitGeometry, TiffError> {
    match layout {
        UnitLayout::Strips => {
            let bits = checked_product(&[width, samples_per_pixel, bits_per_sample], "scanline size")?;
            let scanline = div_ceil(bits, 8);
            let rows = if scanline == 0 {
                1
            } else {
                (DEFAULT_STRIP_BYTES / scanline).max(1)
            };
            Ok(UnitGeometry::Strips {
                rows_per_strip: rows.min(height.max(1)),
            })
        }
        UnitLayout::Tiles => {
            let (tile_width, tile_length) = round_tile_size(DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE);
            Ok(UnitGeometry::Tiles {
                tile_width,
                tile_length,
            })
        }
    }
}

/// Round requested tile edges up to multiples of [`TILE_ALIGNMENT`].
///
/// A zero edge becomes [`DEFAULT_TILE_SIZE`].
pub fn round_tile_size(width: u64, length: u64) -> (u64, u64) {
    let round = |edge: u64| {
        if edge == 0 {
            DEFAULT_TILE_SIZE
        } else {
            div_ceil(edge, TILE_ALIGNMENT).saturating_mul(TILE_ALIGNMENT)
        }
    };
    (round(width), round(length))
}

/// Extent of unit `position` of size `unit` along an axis of `total`.
fn edge_extent(total: u64, unit: u64, position: u64) -> u64 {
    let start = position.saturating_mul(unit);
    unit.min(total.saturating_sub(start))
}

fn index_out_of_range(index: u64, bound: u64) -> TiffError {
    TiffError::OutOfRangeReference {
        offset: index,
        length: 1,
        size: bound,
    }
}

// =============================================================================
// Tests
// =============================================================================
