//! Directory writer.
//!
//! Produces classic TIFF or BigTIFF streams field by field. Data is appended:
//! payload blobs and out-of-line values first, then the directory table,
//! always on word boundaries. Main-chain directories are linked by patching
//! the previous next pointer (or the header's first-directory pointer).
//!
//! ```text
//! header | blob | values(IFD0) | IFD0 | values(IFD1) | IFD1 | ...
//!    └──────────────────────────^  └────────────────────^
//! ```

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::TiffError;
use crate::io::Stream;

use super::parser::{AddressingMode, ByteOrder, TiffHeader};
use super::values::Value;

/// One field to write.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub tag: u16,
    pub value: Value,
}

impl Field {
    pub fn new(tag: u16, value: Value) -> Self {
        Self { tag, value }
    }
}

/// Appends directories to a stream.
pub struct TiffWriter<S: Stream> {
    stream: S,
    header: TiffHeader,
    /// Where the next main-chain directory's offset gets patched in
    link_position: u64,
    directories: usize,
}

impl<S: Stream> TiffWriter<S> {
    /// Start a new file at the beginning of `stream`.
    pub fn new(mut stream: S, byte_order: ByteOrder, mode: AddressingMode) -> Result<Self, TiffError> {
        let header = TiffHeader::new(byte_order, mode);
        stream.write_all_at(0, &header.encode())?;
        let link_position = header.first_ifd_pointer_offset();
        Ok(Self {
            stream,
            header,
            link_position,
            directories: 0,
        })
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    /// Main-chain directories written so far.
    pub fn directory_count(&self) -> usize {
        self.directories
    }

    /// Append raw bytes, returning their offset.
    pub fn write_blob(&mut self, data: &[u8]) -> Result<u64, TiffError> {
        let offset = self.aligned_end()?;
        self.check_offset(offset, data.len() as u64)?;
        self.stream.write_all_at(offset, data)?;
        Ok(offset)
    }

    /// Append a directory and link it into the main chain.
    pub fn write_directory(&mut self, fields: &[Field]) -> Result<u64, TiffError> {
        let offset = self.write_table(fields)?;
        let link = self.encode_offset(offset);
        self.stream.write_all_at(self.link_position, &link)?;

        let mode = self.header.mode;
        self.link_position = offset
            + mode.count_size() as u64
            + fields.len() as u64 * mode.entry_size() as u64;
        self.directories += 1;

        debug!(offset, fields = fields.len(), "Wrote directory");
        Ok(offset)
    }

    /// Append a directory reachable only through a sub-directory field.
    pub fn write_sub_directory(&mut self, fields: &[Field]) -> Result<u64, TiffError> {
        let offset = self.write_table(fields)?;
        debug!(offset, fields = fields.len(), "Wrote sub-directory");
        Ok(offset)
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Finish and hand back the stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn write_table(&mut self, fields: &[Field]) -> Result<u64, TiffError> {
        if fields.is_empty() {
            return Err(TiffError::InvalidTagValue {
                tag: "directory".to_string(),
                message: "a directory needs at least one field".to_string(),
            });
        }
        let mut seen = BTreeSet::new();
        if let Some(field) = fields.iter().find(|field| !seen.insert(field.tag)) {
            return Err(TiffError::DuplicateTag(field.tag));
        }

        let mut sorted: Vec<&Field> = fields.iter().collect();
        sorted.sort_by_key(|field| field.tag);

        let mode = self.header.mode;
        let order = self.header.byte_order;
        let threshold = mode.inline_threshold();
        if mode == AddressingMode::Narrow && sorted.len() > u16::MAX as usize {
            return Err(TiffError::InvalidTagValue {
                tag: "directory".to_string(),
                message: format!("{} fields do not fit a classic directory", sorted.len()),
            });
        }

        let mut table = Vec::with_capacity(
            mode.count_size() + sorted.len() * mode.entry_size() + mode.offset_size(),
        );
        match mode {
            AddressingMode::Narrow => order.put_u16(&mut table, sorted.len() as u16),
            AddressingMode::Wide => order.put_u64(&mut table, sorted.len() as u64),
        }

        for field in sorted {
            let bytes = field.value.encode(order);
            let count = field.value.count();
            if count > mode.max_offset() {
                return Err(TiffError::InvalidTagValue {
                    tag: format!("tag {}", field.tag),
                    message: format!("{} values do not fit this addressing mode", count),
                });
            }

            order.put_u16(&mut table, field.tag);
            order.put_u16(&mut table, field.value.field_type().as_u16());
            self.put_word(&mut table, count);

            if field.value.field_type().fits_inline(count, mode) {
                let mut inline = bytes;
                inline.resize(threshold, 0);
                table.extend_from_slice(&inline);
            } else {
                let value_offset = self.write_blob(&bytes)?;
                table.extend_from_slice(&self.encode_offset(value_offset));
            }
        }

        // Next pointer, patched when a following directory is linked
        table.extend(std::iter::repeat(0).take(mode.offset_size()));

        let offset = self.aligned_end()?;
        self.check_offset(offset, table.len() as u64)?;
        self.stream.write_all_at(offset, &table)?;
        Ok(offset)
    }

    /// End of stream rounded up to an even offset, padding if needed.
    fn aligned_end(&mut self) -> Result<u64, TiffError> {
        let end = self.stream.size();
        if end % 2 == 1 {
            self.stream.write_all_at(end, &[0])?;
            return Ok(end + 1);
        }
        Ok(end)
    }

    fn check_offset(&self, offset: u64, len: u64) -> Result<(), TiffError> {
        let limit = self.header.mode.max_offset();
        match offset.checked_add(len) {
            Some(end) if end <= limit => Ok(()),
            _ => Err(TiffError::OutOfRangeReference {
                offset,
                length: len,
                size: limit,
            }),
        }
    }

    /// Value counts and offsets: 4 bytes narrow, 8 bytes wide.
    fn put_word(&self, out: &mut Vec<u8>, value: u64) {
        let order = self.header.byte_order;
        match self.header.mode {
            AddressingMode::Narrow => order.put_u32(out, value as u32),
            AddressingMode::Wide => order.put_u64(out, value),
        }
    }

    fn encode_offset(&self, offset: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        self.put_word(&mut out, offset);
        out
    }
}

// =============================================================================
// Tests
// =============================================================================
