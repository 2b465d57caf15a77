//! TIFF tag and field type definitions.
//!
//! This module defines the vocabulary for TIFF parsing, including:
//! - Field types that determine how values are encoded
//! - Tag IDs that identify metadata fields
//!
//! The definitions support both classic TIFF and BigTIFF formats.

use super::parser::AddressingMode;

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// Each field type has a specific size in bytes, which is critical for:
/// - Determining if a value fits inline in an IFD entry
/// - Reading arrays of values correctly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,

    /// 8-bit ASCII character, NUL terminated
    Ascii = 2,

    /// Unsigned 16-bit integer
    Short = 3,

    /// Unsigned 32-bit integer
    Long = 4,

    /// Two Longs: numerator, denominator
    Rational = 5,

    /// Signed 8-bit integer
    SByte = 6,

    /// Undefined byte data
    Undefined = 7,

    /// Signed 16-bit integer
    SShort = 8,

    /// Signed 32-bit integer
    SLong = 9,

    /// Two SLongs: numerator, denominator
    SRational = 10,

    /// IEEE single precision float
    Float = 11,

    /// IEEE double precision float
    Double = 12,

    /// 32-bit offset to a sub-directory
    Ifd = 13,

    /// Unsigned 64-bit integer - BigTIFF only
    Long8 = 16,

    /// Signed 64-bit integer - BigTIFF only
    SLong8 = 17,

    /// 64-bit offset to a sub-directory - BigTIFF only
    Ifd8 = 18,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float | FieldType::Ifd => 4,
            FieldType::Rational
            | FieldType::SRational
            | FieldType::Double
            | FieldType::Long8
            | FieldType::SLong8
            | FieldType::Ifd8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unknown type values (0, 14, 15 and anything above 18).
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            6 => Some(FieldType::SByte),
            7 => Some(FieldType::Undefined),
            8 => Some(FieldType::SShort),
            9 => Some(FieldType::SLong),
            10 => Some(FieldType::SRational),
            11 => Some(FieldType::Float),
            12 => Some(FieldType::Double),
            13 => Some(FieldType::Ifd),
            16 => Some(FieldType::Long8),
            17 => Some(FieldType::SLong8),
            18 => Some(FieldType::Ifd8),
            _ => None,
        }
    }

    /// Get the numeric type code.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Lowercase name as used in listings.
    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Byte => "byte",
            FieldType::Ascii => "ascii",
            FieldType::Short => "short",
            FieldType::Long => "long",
            FieldType::Rational => "rational",
            FieldType::SByte => "sbyte",
            FieldType::Undefined => "undefined",
            FieldType::SShort => "sshort",
            FieldType::SLong => "slong",
            FieldType::SRational => "srational",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Ifd => "ifd",
            FieldType::Long8 => "long8",
            FieldType::SLong8 => "slong8",
            FieldType::Ifd8 => "ifd8",
        }
    }

    /// Whether values of this type are sub-directory offsets.
    #[inline]
    pub const fn is_ifd(self) -> bool {
        matches!(self, FieldType::Ifd | FieldType::Ifd8)
    }

    /// Whether values of this type can be read as unsigned integers.
    #[inline]
    pub const fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            FieldType::Byte
                | FieldType::Short
                | FieldType::Long
                | FieldType::Long8
                | FieldType::Ifd
                | FieldType::Ifd8
        )
    }

    /// Total payload size for `count` values, or `None` on overflow.
    #[inline]
    pub fn total_size(self, count: u64) -> Option<u64> {
        count.checked_mul(self.size_in_bytes() as u64)
    }

    /// Check if a value with this type and count fits inline in an entry.
    ///
    /// # Returns
    /// `true` if the total value size fits in the inline value field.
    /// Overflowing sizes never fit.
    #[inline]
    pub fn fits_inline(self, count: u64, mode: AddressingMode) -> bool {
        match self.total_size(count) {
            Some(total) => total <= mode.inline_threshold() as u64,
            None => false,
        }
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// Well-known TIFF tag IDs.
///
/// Tags are 16-bit identifiers that describe the type of metadata in an IFD
/// entry. This enum names the tags the crate interprets itself:
/// - Basic image structure (dimensions, organization)
/// - Strip and tile addressing (offsets, byte counts, sizes)
/// - Sub-directory pointers (SubIFDs, Exif, GPS, Interoperability)
///
/// The full descriptor table, including tags that are only displayed, lives in
/// the field catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // Basic Image Structure
    // -------------------------------------------------------------------------
    /// Kind of data in this subfile (reduced resolution, page, mask)
    NewSubfileType = 254,

    /// Image width in pixels
    ImageWidth = 256,

    /// Image height (length) in pixels
    ImageLength = 257,

    /// Bits per sample, one value per sample
    BitsPerSample = 258,

    /// Compression scheme used
    Compression = 259,

    /// Photometric interpretation (RGB, YCbCr, etc.)
    PhotometricInterpretation = 262,

    /// Logical order of bits within a byte
    FillOrder = 266,

    /// Description string
    ImageDescription = 270,

    /// Orientation of the image with respect to rows and columns
    Orientation = 274,

    /// Number of components per pixel (e.g., 3 for RGB)
    SamplesPerPixel = 277,

    /// How components are organized (chunky vs planar)
    PlanarConfiguration = 284,

    /// Differencing predictor applied before compression
    Predictor = 317,

    /// Palette for palette-color images
    ColorMap = 320,

    /// Interpretation of sample values
    SampleFormat = 339,

    /// Depth of a 3D image in pixels
    ImageDepth = 32997,

    // -------------------------------------------------------------------------
    // Strip Organization
    // -------------------------------------------------------------------------
    /// Byte offsets of strips
    StripOffsets = 273,

    /// Row count per strip
    RowsPerStrip = 278,

    /// Byte counts of strips
    StripByteCounts = 279,

    // -------------------------------------------------------------------------
    // Tile Organization
    // -------------------------------------------------------------------------
    /// Width of each tile in pixels
    TileWidth = 322,

    /// Height (length) of each tile in pixels
    TileLength = 323,

    /// Byte offsets of each tile in the file
    TileOffsets = 324,

    /// Byte counts of each tile
    TileByteCounts = 325,

    /// Depth of each tile for 3D images
    TileDepth = 32998,

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------
    /// Pixels per unit in X direction
    XResolution = 282,

    /// Pixels per unit in Y direction
    YResolution = 283,

    /// Unit of resolution (1=none, 2=inch, 3=centimeter)
    ResolutionUnit = 296,

    // -------------------------------------------------------------------------
    // Sub-directories
    // -------------------------------------------------------------------------
    /// Offsets of child IFDs (reduced-resolution images, thumbnails)
    SubIfds = 330,

    /// Offset of the Exif private directory
    ExifIfd = 34665,

    /// Offset of the GPS private directory
    GpsIfd = 34853,

    /// Offset of the Exif interoperability directory
    InteroperabilityIfd = 40965,
}

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    ///
    /// Returns `None` for tags the crate does not interpret. Unknown tags are
    /// not an error; they are kept as anonymous fields.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            254 => Some(TiffTag::NewSubfileType),
            256 => Some(TiffTag::ImageWidth),
            257 => Some(TiffTag::ImageLength),
            258 => Some(TiffTag::BitsPerSample),
            259 => Some(TiffTag::Compression),
            262 => Some(TiffTag::PhotometricInterpretation),
            266 => Some(TiffTag::FillOrder),
            270 => Some(TiffTag::ImageDescription),
            273 => Some(TiffTag::StripOffsets),
            274 => Some(TiffTag::Orientation),
            277 => Some(TiffTag::SamplesPerPixel),
            278 => Some(TiffTag::RowsPerStrip),
            279 => Some(TiffTag::StripByteCounts),
            282 => Some(TiffTag::XResolution),
            283 => Some(TiffTag::YResolution),
            284 => Some(TiffTag::PlanarConfiguration),
            296 => Some(TiffTag::ResolutionUnit),
            317 => Some(TiffTag::Predictor),
            320 => Some(TiffTag::ColorMap),
            322 => Some(TiffTag::TileWidth),
            323 => Some(TiffTag::TileLength),
            324 => Some(TiffTag::TileOffsets),
            325 => Some(TiffTag::TileByteCounts),
            330 => Some(TiffTag::SubIfds),
            339 => Some(TiffTag::SampleFormat),
            32997 => Some(TiffTag::ImageDepth),
            32998 => Some(TiffTag::TileDepth),
            34665 => Some(TiffTag::ExifIfd),
            34853 => Some(TiffTag::GpsIfd),
            40965 => Some(TiffTag::InteroperabilityIfd),
            _ => None,
        }
    }

    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether this tag's values point at sub-directories.
    #[inline]
    pub const fn is_sub_directory_pointer(self) -> bool {
        matches!(
            self,
            TiffTag::SubIfds | TiffTag::ExifIfd | TiffTag::GpsIfd | TiffTag::InteroperabilityIfd
        )
    }

    /// Baseline default for tags that have one.
    ///
    /// Used when a directory omits the tag.
    pub const fn default_value(self) -> Option<u64> {
        match self {
            TiffTag::NewSubfileType => Some(0),
            TiffTag::BitsPerSample => Some(1),
            TiffTag::Compression => Some(1),
            TiffTag::FillOrder => Some(1),
            TiffTag::Orientation => Some(1),
            TiffTag::SamplesPerPixel => Some(1),
            TiffTag::RowsPerStrip => Some(u32::MAX as u64),
            TiffTag::PlanarConfiguration => Some(1),
            TiffTag::ResolutionUnit => Some(2),
            TiffTag::Predictor => Some(1),
            TiffTag::SampleFormat => Some(1),
            TiffTag::ImageDepth => Some(1),
            TiffTag::TileDepth => Some(1),
            _ => None,
        }
    }
}

// =============================================================================
// Compression Values
// =============================================================================

/// TIFF compression scheme identifiers.
///
/// Decoding is delegated to codecs registered by the caller; only `None`
/// ships built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    /// No compression
    None = 1,

    /// CCITT modified Huffman run-length encoding
    CcittRle = 2,

    /// CCITT Group 3 fax
    CcittFax3 = 3,

    /// CCITT Group 4 fax
    CcittFax4 = 4,

    /// LZW compression
    Lzw = 5,

    /// "Old-style" JPEG
    OldJpeg = 6,

    /// JPEG compression
    Jpeg = 7,

    /// Deflate/zlib compression
    Deflate = 8,

    /// Macintosh RLE
    PackBits = 32773,

    /// Adobe Deflate
    AdobeDeflate = 32946,

    /// JPEG 2000
    Jpeg2000 = 33003,
}

impl Compression {
    /// Create a Compression from its numeric value.
    ///
    /// Returns `None` for unrecognized compression values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            2 => Some(Compression::CcittRle),
            3 => Some(Compression::CcittFax3),
            4 => Some(Compression::CcittFax4),
            5 => Some(Compression::Lzw),
            6 => Some(Compression::OldJpeg),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::Deflate),
            32773 => Some(Compression::PackBits),
            32946 => Some(Compression::AdobeDeflate),
            33003 => Some(Compression::Jpeg2000),
            _ => None,
        }
    }

    /// Get a human-readable name for the compression scheme.
    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::CcittRle => "CCITT RLE",
            Compression::CcittFax3 => "CCITT Group 3",
            Compression::CcittFax4 => "CCITT Group 4",
            Compression::Lzw => "LZW",
            Compression::OldJpeg => "Old JPEG",
            Compression::Jpeg => "JPEG",
            Compression::Deflate => "Deflate",
            Compression::PackBits => "PackBits",
            Compression::AdobeDeflate => "Adobe Deflate",
            Compression::Jpeg2000 => "JPEG 2000",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
