//! # tiffnav
//!
//! Bounds-checked navigation of TIFF and BigTIFF files.
//!
//! This library walks the directory graph of a TIFF stream (the main chain
//! plus SubIFDs, Exif, GPS and Interoperability directories), decodes field
//! values lazily, and resolves the strip or tile layout of image directories.
//! Every offset, count and size read from the file is bounds-checked and
//! counted against configurable allocation limits, so hostile input fails
//! with an error instead of a panic or a runaway allocation.
//!
//! ## Features
//!
//! - **Both addressing modes**: classic TIFF (32-bit) and BigTIFF (64-bit)
//! - **Cycle-safe traversal**: loops in the directory chain end traversal
//! - **Resource limits**: single and cumulative allocation caps, directory,
//!   field and jump budgets
//! - **Pluggable streams**: memory buffers, any `Read + Seek`, and an LRU
//!   block cache in front of either
//! - **Strip/tile addressing**: unit counts, offsets, sizes and coordinates
//!   with overflow-checked math
//!
//! ## Architecture
//!
//! - [`io`] - Stream trait, memory and reader-backed streams, block cache
//! - [`mod@format`] - TIFF header, directory, value, addressing and writer
//! - [`codec`] - Codec and predictor registries for unit payloads
//! - [`inspect`] - Serializable reports of a whole directory graph
//! - [`config`] - Open options and the inspector's command line
//!
//! ## Example
//!
//! ```rust,no_run
//! use tiffnav::{MemoryStream, Navigator};
//!
//! # fn main() -> Result<(), tiffnav::TiffError> {
//! let data = std::fs::read("image.tif").map_err(tiffnav::IoError::from)?;
//! let mut navigator = Navigator::open(MemoryStream::from_vec(data))?;
//!
//! while let Some(directory) = navigator.read_next_directory()? {
//!     println!("directory at {} with {} fields", directory.offset(), directory.len());
//!     let addressing = navigator.addressing()?;
//!     println!("{} units", addressing.unit_count()?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod inspect;
pub mod io;

// Re-export commonly used types
pub use codec::{Codec, CodecRegistry, IdentityCodec, IdentityPredictor, Predictor};
pub use config::{Config, OpenOptions, OutputFormat, DEFAULT_MAX_JUMPS};
pub use error::{CodecError, IoError, TiffError};
pub use format::tiff::{
    default_unit_geometry, Addressing, AddressingMode, ByteOrder, Compression, Directory,
    FieldCatalog, FieldType, IfdEntry, Limits, Navigator, PlanarConfig, StopReason,
    TagDescriptor, TiffHeader, TiffTag, TiffWriter, UnitGeometry, UnitLayout, Value,
};
pub use inspect::{inspect, InspectOptions, Report};
pub use io::{CachedStream, MemoryStream, ReaderStream, Stream};
