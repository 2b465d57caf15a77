//! TIFF and BigTIFF directory navigation.
//!
//! # Key Concepts
//!
//! - **Byte order**: files declare their endianness (II = little-endian,
//!   MM = big-endian) in the header. Every multi-byte value is read in that
//!   order.
//!
//! - **Addressing mode**: classic TIFF (version 42) uses 32-bit offsets and
//!   12-byte entries, BigTIFF (version 43) 64-bit offsets and 20-byte entries.
//!   [`AddressingMode`] carries every width-dependent size.
//!
//! - **Directory graph**: directories (IFDs) form a main chain through their
//!   next pointers; SubIFDs, Exif, GPS and Interoperability fields point at
//!   side directories. [`Navigator`] walks both and stops on cycles.
//!
//! - **Inline vs offset values**: values that fit in the entry's value field
//!   are stored inline, larger ones at an offset. [`ValueReader`] fetches
//!   either lazily.
//!
//! - **Units**: image data is split into strips or tiles. [`Addressing`]
//!   resolves their geometry, offsets and sizes with overflow-checked math.

mod addressing;
mod catalog;
mod directory;
mod limits;
mod navigator;
mod parser;
mod tags;
mod values;
mod writer;

pub use addressing::{
    default_unit_geometry, round_tile_size, Addressing, PlanarConfig, UnitGeometry, UnitLayout,
    DEFAULT_STRIP_BYTES, DEFAULT_TILE_SIZE, TILE_ALIGNMENT,
};
pub use catalog::{CountRule, ExpectedCount, FieldCatalog, TagDescriptor};
pub use directory::{Directory, IfdEntry, ParseContext};
pub use limits::{
    checked_product, checked_sum, div_ceil, AllocationBudget, Limits, DEFAULT_MAX_CUMULATIVE_ALLOC,
    DEFAULT_MAX_DIRECTORIES, DEFAULT_MAX_FIELDS_PER_DIRECTORY, DEFAULT_MAX_SINGLE_ALLOC,
};
pub use navigator::{Directories, Navigator, StopReason};
pub use parser::{
    AddressingMode, ByteOrder, Decoder, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE,
};
pub use tags::{Compression, FieldType, TiffTag};
pub use values::{parse_u64_array, Value, ValueReader};
pub use writer::{Field, TiffWriter};
