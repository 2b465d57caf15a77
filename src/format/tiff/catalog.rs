//! Field catalog: what each known tag is supposed to look like.
//!
//! The catalog maps tag ids to a [`TagDescriptor`] carrying the expected
//! storage type, the expected value count and a display name. The directory
//! reader consults it to validate counts; the inspector uses it for names.
//!
//! Unknown tags are never an error. They are kept as anonymous fields and
//! [`FieldCatalog::describe`] reports them with no descriptor.
//!
//! # Count rules
//!
//! ```text
//! Fixed(n)                 exactly n values
//! Any                      any count, including 0
//! Derived(SamplesPerPixel) one value per sample
//! Derived(ColorMap)        3 * 2^BitsPerSample
//! Derived(UnitsPerImage)   one value per strip or tile, checked by addressing
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::error::TiffError;

use super::directory::Directory;
use super::tags::FieldType;

// =============================================================================
// Descriptors
// =============================================================================

/// Rule for counts that depend on other fields of the same directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountRule {
    /// One value per sample (SamplesPerPixel)
    SamplesPerPixel,
    /// Three palettes of 2^BitsPerSample entries
    ColorMap,
    /// One value per strip or tile
    UnitsPerImage,
}

/// Number of values a tag is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedCount {
    Fixed(u64),
    Any,
    Derived(CountRule),
}

impl ExpectedCount {
    /// Resolve to a concrete count given the directory's sample layout.
    ///
    /// Returns `None` when any count is acceptable or the rule is checked
    /// elsewhere.
    pub fn resolve(self, samples_per_pixel: u64, bits_per_sample: u64) -> Option<u64> {
        match self {
            ExpectedCount::Fixed(n) => Some(n),
            ExpectedCount::Any => None,
            ExpectedCount::Derived(CountRule::SamplesPerPixel) => Some(samples_per_pixel),
            ExpectedCount::Derived(CountRule::ColorMap) => {
                if bits_per_sample >= 32 {
                    return None;
                }
                3u64.checked_mul(1u64 << bits_per_sample)
            }
            ExpectedCount::Derived(CountRule::UnitsPerImage) => None,
        }
    }
}

/// Catalog entry for one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDescriptor {
    pub id: u16,
    pub name: Cow<'static, str>,
    /// Preferred storage type; readers accept others
    pub data_type: FieldType,
    pub expected_count: ExpectedCount,
    /// Whether the count is variable and must be passed alongside the value
    pub pass_count: bool,
}

impl TagDescriptor {
    /// Descriptor for a caller-defined tag.
    pub fn custom(
        id: u16,
        name: impl Into<String>,
        data_type: FieldType,
        expected_count: ExpectedCount,
    ) -> Self {
        Self {
            id,
            name: Cow::Owned(name.into()),
            data_type,
            pass_count: !matches!(expected_count, ExpectedCount::Fixed(_)),
            expected_count,
        }
    }

    const fn builtin(
        id: u16,
        name: &'static str,
        data_type: FieldType,
        expected_count: ExpectedCount,
    ) -> Self {
        Self {
            id,
            name: Cow::Borrowed(name),
            data_type,
            expected_count,
            pass_count: !matches!(expected_count, ExpectedCount::Fixed(_)),
        }
    }
}

use CountRule::{ColorMap, SamplesPerPixel, UnitsPerImage};
use ExpectedCount::{Any, Derived, Fixed};

/// Baseline and commonly used extension tags.
static BUILTIN_TAGS: &[TagDescriptor] = &[
    TagDescriptor::builtin(254, "NewSubfileType", FieldType::Long, Fixed(1)),
    TagDescriptor::builtin(255, "SubfileType", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(256, "ImageWidth", FieldType::Long, Fixed(1)),
    TagDescriptor::builtin(257, "ImageLength", FieldType::Long, Fixed(1)),
    TagDescriptor::builtin(258, "BitsPerSample", FieldType::Short, Derived(SamplesPerPixel)),
    TagDescriptor::builtin(259, "Compression", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(262, "PhotometricInterpretation", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(263, "Threshholding", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(266, "FillOrder", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(269, "DocumentName", FieldType::Ascii, Any),
    TagDescriptor::builtin(270, "ImageDescription", FieldType::Ascii, Any),
    TagDescriptor::builtin(271, "Make", FieldType::Ascii, Any),
    TagDescriptor::builtin(272, "Model", FieldType::Ascii, Any),
    TagDescriptor::builtin(273, "StripOffsets", FieldType::Long, Derived(UnitsPerImage)),
    TagDescriptor::builtin(274, "Orientation", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(277, "SamplesPerPixel", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(278, "RowsPerStrip", FieldType::Long, Fixed(1)),
    TagDescriptor::builtin(279, "StripByteCounts", FieldType::Long, Derived(UnitsPerImage)),
    TagDescriptor::builtin(280, "MinSampleValue", FieldType::Short, Derived(SamplesPerPixel)),
    TagDescriptor::builtin(281, "MaxSampleValue", FieldType::Short, Derived(SamplesPerPixel)),
    TagDescriptor::builtin(282, "XResolution", FieldType::Rational, Fixed(1)),
    TagDescriptor::builtin(283, "YResolution", FieldType::Rational, Fixed(1)),
    TagDescriptor::builtin(284, "PlanarConfiguration", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(285, "PageName", FieldType::Ascii, Any),
    TagDescriptor::builtin(286, "XPosition", FieldType::Rational, Fixed(1)),
    TagDescriptor::builtin(287, "YPosition", FieldType::Rational, Fixed(1)),
    TagDescriptor::builtin(296, "ResolutionUnit", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(297, "PageNumber", FieldType::Short, Fixed(2)),
    TagDescriptor::builtin(305, "Software", FieldType::Ascii, Any),
    TagDescriptor::builtin(306, "DateTime", FieldType::Ascii, Fixed(20)),
    TagDescriptor::builtin(315, "Artist", FieldType::Ascii, Any),
    TagDescriptor::builtin(316, "HostComputer", FieldType::Ascii, Any),
    TagDescriptor::builtin(317, "Predictor", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(318, "WhitePoint", FieldType::Rational, Fixed(2)),
    TagDescriptor::builtin(319, "PrimaryChromaticities", FieldType::Rational, Fixed(6)),
    TagDescriptor::builtin(320, "ColorMap", FieldType::Short, Derived(ColorMap)),
    TagDescriptor::builtin(321, "HalftoneHints", FieldType::Short, Fixed(2)),
    TagDescriptor::builtin(322, "TileWidth", FieldType::Long, Fixed(1)),
    TagDescriptor::builtin(323, "TileLength", FieldType::Long, Fixed(1)),
    TagDescriptor::builtin(324, "TileOffsets", FieldType::Long, Derived(UnitsPerImage)),
    TagDescriptor::builtin(325, "TileByteCounts", FieldType::Long, Derived(UnitsPerImage)),
    TagDescriptor::builtin(330, "SubIFDs", FieldType::Ifd, Any),
    TagDescriptor::builtin(332, "InkSet", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(338, "ExtraSamples", FieldType::Short, Any),
    TagDescriptor::builtin(339, "SampleFormat", FieldType::Short, Derived(SamplesPerPixel)),
    TagDescriptor::builtin(347, "JPEGTables", FieldType::Undefined, Any),
    TagDescriptor::builtin(529, "YCbCrCoefficients", FieldType::Rational, Fixed(3)),
    TagDescriptor::builtin(530, "YCbCrSubSampling", FieldType::Short, Fixed(2)),
    TagDescriptor::builtin(531, "YCbCrPositioning", FieldType::Short, Fixed(1)),
    TagDescriptor::builtin(532, "ReferenceBlackWhite", FieldType::Rational, Fixed(6)),
    TagDescriptor::builtin(700, "XMLPacket", FieldType::Byte, Any),
    TagDescriptor::builtin(32997, "ImageDepth", FieldType::Long, Fixed(1)),
    TagDescriptor::builtin(32998, "TileDepth", FieldType::Long, Fixed(1)),
    TagDescriptor::builtin(33432, "Copyright", FieldType::Ascii, Any),
    TagDescriptor::builtin(33723, "RichTIFFIPTC", FieldType::Undefined, Any),
    TagDescriptor::builtin(34377, "Photoshop", FieldType::Byte, Any),
    TagDescriptor::builtin(34665, "ExifIFD", FieldType::Ifd, Fixed(1)),
    TagDescriptor::builtin(34675, "ICCProfile", FieldType::Undefined, Any),
    TagDescriptor::builtin(34853, "GPSIFD", FieldType::Ifd, Fixed(1)),
    TagDescriptor::builtin(40965, "InteroperabilityIFD", FieldType::Ifd, Fixed(1)),
];

// =============================================================================
// FieldCatalog
// =============================================================================

/// Registry of known tags, extendable with custom tags.
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    tags: BTreeMap<u16, TagDescriptor>,
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldCatalog {
    /// Catalog with the built-in tags.
    pub fn new() -> Self {
        let tags = BUILTIN_TAGS
            .iter()
            .map(|descriptor| (descriptor.id, descriptor.clone()))
            .collect();
        Self { tags }
    }

    pub fn lookup_by_id(&self, id: u16) -> Option<&TagDescriptor> {
        self.tags.get(&id)
    }

    /// Case-insensitive lookup by display name.
    pub fn lookup_by_name(&self, name: &str) -> Option<&TagDescriptor> {
        self.tags
            .values()
            .find(|descriptor| descriptor.name.eq_ignore_ascii_case(name))
    }

    /// Add a caller-defined tag.
    ///
    /// # Errors
    /// `DuplicateTag` if the id is already known.
    pub fn register_custom(&mut self, descriptor: TagDescriptor) -> Result<(), TiffError> {
        if self.tags.contains_key(&descriptor.id) {
            return Err(TiffError::DuplicateTag(descriptor.id));
        }
        self.tags.insert(descriptor.id, descriptor);
        Ok(())
    }

    /// Every field of `directory` in stored order, with its descriptor if known.
    pub fn describe<'a>(&'a self, directory: &Directory) -> Vec<(u16, Option<&'a TagDescriptor>)> {
        directory
            .entries()
            .iter()
            .map(|entry| (entry.tag_id, self.lookup_by_id(entry.tag_id)))
            .collect()
    }

    /// Display name for a tag id; unknown tags render as `Tag 12345`.
    pub fn name_of(&self, id: u16) -> Cow<'_, str> {
        match self.lookup_by_id(id) {
            Some(descriptor) => Cow::Borrowed(descriptor.name.as_ref()),
            None => Cow::Owned(format!("Tag {id}")),
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagDescriptor> {
        self.tags.values()
    }
}
