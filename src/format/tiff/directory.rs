//! Single-directory (IFD) parsing.
//!
//! # IFD Structure
//!
//! ```text
//! Classic TIFF                          BigTIFF
//! +---------------------------+         +---------------------------+
//! | entry count      (u16)    |         | entry count      (u64)    |
//! +---------------------------+         +---------------------------+
//! | entry 0          12 bytes |         | entry 0          20 bytes |
//! | ...                       |         | ...                       |
//! +---------------------------+         +---------------------------+
//! | next IFD offset  (u32)    |         | next IFD offset  (u64)    |
//! +---------------------------+         +---------------------------+
//!
//! Entry: tag (u16) | type (u16) | count (u32/u64) | value or offset (4/8 bytes)
//! ```
//!
//! Values that fit in the last field are stored inline; larger values live at
//! the offset it holds. Reading a directory does not fetch indirect values:
//! their spans are only bounds-checked here and read on demand through
//! [`ValueReader`](super::values::ValueReader).

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::config::OpenOptions;
use crate::error::TiffError;
use crate::io::Stream;

use super::catalog::FieldCatalog;
use super::parser::{AddressingMode, ByteOrder, TiffHeader};
use super::tags::{FieldType, TiffTag};

// =============================================================================
// IfdEntry
// =============================================================================

/// One field of a directory as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    /// Tag identifier
    pub tag_id: u16,

    /// Stored data type
    pub field_type: FieldType,

    /// Number of values (not bytes)
    pub count: u64,

    /// Raw value/offset field: 4 bytes in classic TIFF, 8 in BigTIFF
    pub value_offset_bytes: Vec<u8>,

    /// Whether the value is stored in `value_offset_bytes`
    pub is_inline: bool,
}

impl IfdEntry {
    /// Total size of the value in bytes.
    ///
    /// Entries whose size overflows are rejected at parse time.
    #[inline]
    pub fn value_byte_size(&self) -> u64 {
        self.field_type.total_size(self.count).unwrap_or(u64::MAX)
    }

    /// Offset of an indirect value.
    ///
    /// Only meaningful when `is_inline` is false.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        match self.value_offset_bytes.len() {
            4 => byte_order.read_u32(&self.value_offset_bytes) as u64,
            8 => byte_order.read_u64(&self.value_offset_bytes),
            _ => 0,
        }
    }

    /// Inline value bytes, trimmed to the value size.
    ///
    /// # Errors
    /// `InvalidTagValue` if the value does not fit the stored value field.
    pub fn inline_bytes(&self) -> Result<Option<&[u8]>, TiffError> {
        if !self.is_inline {
            return Ok(None);
        }
        let size = self.value_byte_size();
        usize::try_from(size)
            .ok()
            .and_then(|size| self.value_offset_bytes.get(..size))
            .map(Some)
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: format!("tag {}", self.tag_id),
                message: format!(
                    "inline value needs {} bytes, entry holds {}",
                    size,
                    self.value_offset_bytes.len()
                ),
            })
    }

    /// Single unsigned integer stored inline, if that is what this entry holds.
    pub fn inline_u64(&self, byte_order: ByteOrder) -> Option<u64> {
        if self.count != 1 {
            return None;
        }
        let bytes = self.inline_bytes().ok()??;
        match self.field_type {
            FieldType::Byte => Some(bytes[0] as u64),
            FieldType::Short => Some(byte_order.read_u16(bytes) as u64),
            FieldType::Long | FieldType::Ifd => Some(byte_order.read_u32(bytes) as u64),
            FieldType::Long8 | FieldType::Ifd8 => Some(byte_order.read_u64(bytes)),
            _ => None,
        }
    }

    /// Whether this entry points at sub-directories, by tag or by type.
    pub fn is_sub_directory(&self) -> bool {
        self.field_type.is_ifd()
            || TiffTag::from_u16(self.tag_id).map_or(false, TiffTag::is_sub_directory_pointer)
    }
}

// =============================================================================
// Directory
// =============================================================================

/// Collaborators the reader needs besides the stream.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub options: &'a OpenOptions,
    pub catalog: &'a FieldCatalog,
}

/// A parsed Image File Directory.
///
/// Entries keep their on-disk order and have unique tag ids. Parsing the
/// same offset twice yields equal directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    offset: u64,
    entries: Vec<IfdEntry>,
    next_offset: u64,
    next_truncated: bool,
}

impl Directory {
    /// Parse the directory at `offset`.
    ///
    /// # Errors
    /// - `TruncatedInput` if the count field or entry table runs past the end
    /// - `MalformedDirectory` for a zero or excessive entry count, an indirect
    ///   span outside the stream, or (strict mode) unsorted or duplicate tags
    /// - `AllocationLimitExceeded` if the entry table is over the limits
    pub fn read<S: Stream + ?Sized>(
        stream: &mut S,
        header: &TiffHeader,
        ctx: ParseContext<'_>,
        offset: u64,
    ) -> Result<Self, TiffError> {
        let mode = header.mode;
        let size = stream.size();
        let options = ctx.options;

        if offset < mode.header_size() as u64 {
            return Err(TiffError::malformed(offset, "directory overlaps the file header"));
        }

        // Entry count
        let count_size = mode.count_size() as u64;
        let table_start = offset
            .checked_add(count_size)
            .filter(|end| *end <= size)
            .ok_or(TiffError::TruncatedInput {
                offset,
                required: count_size,
                available: size.saturating_sub(offset),
            })?;

        let count_bytes = stream.read_exact_at(offset, mode.count_size())?;
        let entry_count = header
            .decoder(&count_bytes, offset)
            .entry_count_at(0, mode)?;

        if entry_count == 0 {
            return Err(TiffError::malformed(offset, "directory has zero entries"));
        }
        if entry_count > options.limits.max_fields_per_directory {
            return Err(TiffError::malformed(
                offset,
                format!(
                    "{} entries exceeds the limit of {}",
                    entry_count, options.limits.max_fields_per_directory
                ),
            ));
        }

        // Entry table must fit in what follows the count field
        let remaining = size - table_start;
        let table_len = entry_count.checked_mul(mode.entry_size() as u64);
        let table_len = match table_len {
            Some(len) if len <= remaining => len,
            _ => {
                return Err(TiffError::TruncatedInput {
                    offset: table_start,
                    required: table_len.unwrap_or(u64::MAX),
                    available: remaining,
                })
            }
        };

        let mut budget = options.limits.budget();
        budget.reserve(table_len)?;
        let table = stream.read_exact_at(table_start, table_len as usize)?;
        let decoder = header.decoder(&table, table_start);

        // Next pointer; a missing one makes this the last directory
        let next_pos = table_start + table_len;
        let offset_size = mode.offset_size();
        let (next_offset, next_truncated) = if next_pos + offset_size as u64 <= size {
            let bytes = stream.read_exact_at(next_pos, offset_size)?;
            (header.decoder(&bytes, next_pos).offset_at(0, mode)?, false)
        } else {
            warn!(offset, "Directory next pointer is truncated, treating as last directory");
            (0, true)
        };

        let mut entries: Vec<IfdEntry> = Vec::with_capacity(entry_count as usize);
        // Tags of accepted entries
        let mut seen = BTreeSet::new();
        let mut previous_tag: Option<u16> = None;

        for i in 0..entry_count as usize {
            let base = i * mode.entry_size();
            let entry_offset = table_start + base as u64;
            let tag_id = decoder.u16_at(base)?;
            let type_raw = decoder.u16_at(base + 2)?;

            let count = match mode {
                AddressingMode::Narrow => decoder.u32_at(base + 4)? as u64,
                AddressingMode::Wide => decoder.u64_at(base + 4)?,
            };
            let value_field_pos = base + 4 + mode.offset_size();
            let value_offset_bytes = decoder
                .slice_at(value_field_pos, mode.inline_threshold())?
                .to_vec();

            let field_type = match FieldType::from_u16(type_raw) {
                Some(field_type) => field_type,
                None => {
                    warn!(
                        offset = entry_offset,
                        tag = tag_id,
                        field_type = type_raw,
                        "Skipping entry with unknown field type"
                    );
                    continue;
                }
            };

            // Tag ordering
            if seen.contains(&tag_id) {
                if options.strict {
                    return Err(TiffError::malformed(offset, format!("duplicate tag {tag_id}")));
                }
                warn!(offset, tag = tag_id, "Duplicate tag, keeping the first occurrence");
                continue;
            }
            if let Some(prev) = previous_tag.filter(|&prev| tag_id < prev) {
                if options.strict {
                    return Err(TiffError::malformed(
                        offset,
                        format!("tag {tag_id} follows tag {prev}, tags must be sorted"),
                    ));
                }
                warn!(offset, tag = tag_id, previous = prev, "Tags are not sorted");
            }

            let value_size = field_type.total_size(count).ok_or_else(|| {
                TiffError::malformed(offset, format!("tag {tag_id}: value size overflows"))
            })?;
            let is_inline = value_size <= mode.inline_threshold() as u64;

            let entry = IfdEntry {
                tag_id,
                field_type,
                count,
                value_offset_bytes,
                is_inline,
            };

            if !entry.is_inline {
                let value_offset = entry.value_offset(header.byte_order);
                let in_bounds = value_offset
                    .checked_add(value_size)
                    .map_or(false, |end| end <= size);
                if !in_bounds {
                    return Err(TiffError::malformed(
                        offset,
                        format!(
                            "tag {tag_id}: value of {value_size} bytes at offset {value_offset} lies outside the stream"
                        ),
                    ));
                }
            }

            match ctx.catalog.lookup_by_id(tag_id) {
                Some(descriptor) => {
                    if descriptor.data_type != field_type {
                        debug!(
                            tag = tag_id,
                            stored = field_type.name(),
                            expected = descriptor.data_type.name(),
                            "Field stored with a non-preferred type"
                        );
                    }
                }
                None => {
                    if options.warn_unknown_tags {
                        warn!(offset, tag = tag_id, "Unknown tag");
                    }
                }
            }

            seen.insert(tag_id);
            previous_tag = Some(tag_id);
            entries.push(entry);
        }

        let directory = Directory {
            offset,
            entries,
            next_offset,
            next_truncated,
        };
        directory.validate_counts(header.byte_order, ctx)?;

        debug!(
            offset,
            entries = directory.entries.len(),
            next = directory.next_offset,
            "Parsed directory"
        );
        Ok(directory)
    }

    /// Check known tags' counts against the catalog.
    fn validate_counts(&self, byte_order: ByteOrder, ctx: ParseContext<'_>) -> Result<(), TiffError> {
        let samples_per_pixel = self
            .inline_u64(TiffTag::SamplesPerPixel.as_u16(), byte_order)
            .unwrap_or(1);
        // BitsPerSample has one value per sample; they are all equal in practice
        let bits_per_sample = self
            .get(TiffTag::BitsPerSample.as_u16())
            .and_then(|entry| Some((entry.field_type, entry.inline_bytes().ok()??)))
            .and_then(|(field_type, bytes)| match field_type {
                FieldType::Short if bytes.len() >= 2 => Some(byte_order.read_u16(bytes) as u64),
                FieldType::Long if bytes.len() >= 4 => Some(byte_order.read_u32(bytes) as u64),
                _ => None,
            })
            .unwrap_or(1);

        for entry in &self.entries {
            let Some(descriptor) = ctx.catalog.lookup_by_id(entry.tag_id) else {
                continue;
            };
            let Some(expected) = descriptor
                .expected_count
                .resolve(samples_per_pixel, bits_per_sample)
            else {
                continue;
            };
            if entry.count == expected {
                continue;
            }

            if ctx.options.strict {
                return Err(TiffError::malformed(
                    self.offset,
                    format!(
                        "{}: expected {} values, found {}",
                        descriptor.name, expected, entry.count
                    ),
                ));
            }
            warn!(
                offset = self.offset,
                tag = entry.tag_id,
                expected,
                found = entry.count,
                "Unexpected value count"
            );
        }
        Ok(())
    }

    /// Offset this directory was parsed from.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Offset of the next directory in the chain (0 = end).
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Whether the next pointer was cut off by the end of the stream.
    pub fn next_truncated(&self) -> bool {
        self.next_truncated
    }

    /// Entries in on-disk order.
    pub fn entries(&self) -> &[IfdEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by tag id.
    pub fn get(&self, tag_id: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|entry| entry.tag_id == tag_id)
    }

    /// Look up an entry by well-known tag.
    pub fn get_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.get(tag.as_u16())
    }

    pub fn contains(&self, tag_id: u16) -> bool {
        self.get(tag_id).is_some()
    }

    /// Tag ids in on-disk order.
    pub fn tag_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|entry| entry.tag_id)
    }

    /// Single inline unsigned value of a tag, without touching the stream.
    pub fn inline_u64(&self, tag_id: u16, byte_order: ByteOrder) -> Option<u64> {
        self.get(tag_id)?.inline_u64(byte_order)
    }

    /// Entries that reference sub-directories.
    pub fn sub_directory_entries(&self) -> impl Iterator<Item = &IfdEntry> + '_ {
        self.entries.iter().filter(|entry| entry.is_sub_directory())
    }

    /// Whether the directory is organized in tiles rather than strips.
    pub fn is_tiled(&self) -> bool {
        self.contains(TiffTag::TileWidth.as_u16()) || self.contains(TiffTag::TileOffsets.as_u16())
    }
}

// =============================================================================
// Tests
// =============================================================================
