//! Directory graph navigation.
//!
//! A TIFF stream holds a chain of directories linked through their next
//! pointers, plus sub-directories hanging off specific fields (SubIFDs, Exif,
//! GPS, Interoperability, or any field stored with an IFD type).
//!
//! ```text
//! header ──> IFD0 ──> IFD1 ──> IFD2 ──> 0
//!             │
//!             ├── SubIFDs ──> [child0, child1]
//!             └── ExifIFD ──> exif
//! ```
//!
//! Nothing guarantees this graph is acyclic. Main-chain traversal remembers
//! every offset it has visited and stops at the first repeat. Explicit jumps
//! ([`Navigator::set_directory`], [`Navigator::enter_sub_directory`]) may
//! revisit offsets freely and are bounded by a jump budget instead.

use std::collections::HashSet;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::codec::CodecRegistry;
use crate::config::OpenOptions;
use crate::error::{CodecError, IoError, TiffError};
use crate::io::Stream;

use super::addressing::Addressing;
use super::catalog::FieldCatalog;
use super::directory::{Directory, IfdEntry, ParseContext};
use super::parser::{AddressingMode, ByteOrder, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::TiffTag;
use super::values::{Value, ValueReader};

// =============================================================================
// StopReason
// =============================================================================

/// Why main-chain traversal stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last directory's next pointer was 0
    EndOfChain,
    /// The next pointer led back to an already visited directory
    Cycle { offset: u64 },
    /// `max_directories` directories were visited
    Limit,
    /// A directory on the chain failed to parse
    Malformed,
}

// =============================================================================
// Navigator
// =============================================================================

/// Stateful walker over the directory graph of one stream.
///
/// The navigator owns its stream and closes it when dropped.
pub struct Navigator<S: Stream> {
    stream: S,
    header: TiffHeader,
    options: OpenOptions,
    catalog: FieldCatalog,

    current: Option<Directory>,
    current_index: Option<usize>,

    /// Main-chain offsets in visiting order
    chain: Vec<u64>,
    visited: HashSet<u64>,
    started: bool,
    stop_reason: Option<StopReason>,

    jumps: usize,
    closed: bool,
}

impl<S: Stream> Navigator<S> {
    /// Open a stream with default options.
    pub fn open(stream: S) -> Result<Self, TiffError> {
        Self::open_with_options(stream, OpenOptions::default())
    }

    /// Open a stream, reading and validating its header.
    ///
    /// No directory is parsed yet; the first call to
    /// [`read_next_directory`](Self::read_next_directory) does that.
    ///
    /// # Errors
    /// - `UnsupportedAddressingMode` for an unknown magic or version
    /// - `TruncatedInput` if the stream is shorter than its header
    pub fn open_with_options(mut stream: S, options: OpenOptions) -> Result<Self, TiffError> {
        let header_len = stream.size().min(BIGTIFF_HEADER_SIZE as u64) as usize;
        let header_bytes = stream.read_exact_at(0, header_len)?;
        let header = if options.strict {
            TiffHeader::parse_strict(&header_bytes)?
        } else {
            TiffHeader::parse(&header_bytes)?
        };

        debug!(
            stream = stream.identifier(),
            bigtiff = header.is_bigtiff(),
            first_ifd = header.first_ifd_offset,
            "Opened TIFF stream"
        );

        Ok(Self {
            stream,
            header,
            options,
            catalog: FieldCatalog::new(),
            current: None,
            current_index: None,
            chain: Vec::new(),
            visited: HashSet::new(),
            started: false,
            stop_reason: None,
            jumps: 0,
            closed: false,
        })
    }

    /// Replace the field catalog, e.g. one with custom tags registered.
    pub fn with_catalog(mut self, catalog: FieldCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    pub fn mode(&self) -> AddressingMode {
        self.header.mode
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    /// Mutable catalog access for registering custom tags.
    pub fn catalog_mut(&mut self) -> &mut FieldCatalog {
        &mut self.catalog
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// The current directory, if any.
    pub fn current(&self) -> Option<&Directory> {
        self.current.as_ref()
    }

    /// Offset of the current directory.
    pub fn current_offset(&self) -> Option<u64> {
        self.current.as_ref().map(Directory::offset)
    }

    /// Main-chain index of the current directory.
    ///
    /// `None` before the first read and after a jump to an offset that is not
    /// a known main-chain position.
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Why the last main-chain traversal stopped, if it has.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Whether the current directory ends the chain.
    ///
    /// Before any directory is read this is true only for an empty chain.
    pub fn is_last_directory(&self) -> bool {
        match &self.current {
            Some(directory) => directory.next_offset() == 0,
            None => self.header.first_ifd_offset == 0,
        }
    }

    /// Explicit jumps made since open or the last rewind.
    pub fn jumps(&self) -> usize {
        self.jumps
    }

    // -------------------------------------------------------------------------
    // Main chain
    // -------------------------------------------------------------------------

    /// Advance along the main chain.
    ///
    /// The first call parses the directory named by the header. Returns
    /// `Ok(None)` at the end of the chain, on a cycle or once
    /// `max_directories` have been visited; [`stop_reason`](Self::stop_reason)
    /// tells which. A parse failure is returned once and ends the chain;
    /// directories returned earlier stay valid.
    pub fn read_next_directory(&mut self) -> Result<Option<&Directory>, TiffError> {
        if self.stop_reason.is_some() {
            return Ok(None);
        }

        let (offset, index) = if !self.started {
            (self.header.first_ifd_offset, Some(0))
        } else {
            match &self.current {
                Some(directory) => (directory.next_offset(), self.current_index.map(|i| i + 1)),
                None => (0, None),
            }
        };
        self.started = true;

        if offset == 0 {
            self.stop_reason = Some(StopReason::EndOfChain);
            return Ok(None);
        }

        // A known chain position reached again after a jump is not a cycle
        let known_position = index.map_or(false, |i| self.chain.get(i) == Some(&offset));

        if !known_position {
            if self.visited.contains(&offset) {
                warn!(offset, "Directory chain loops back, stopping traversal");
                self.stop_reason = Some(StopReason::Cycle { offset });
                return Ok(None);
            }
            if self.visited.len() >= self.options.limits.max_directories {
                warn!(
                    limit = self.options.limits.max_directories,
                    "Directory limit reached, stopping traversal"
                );
                self.stop_reason = Some(StopReason::Limit);
                return Ok(None);
            }
        }

        let directory = match self.parse_at(offset) {
            Ok(directory) => directory,
            Err(e) => {
                warn!(offset, error = %e, "Failed to parse directory, ending chain");
                self.stop_reason = Some(StopReason::Malformed);
                return Err(e);
            }
        };

        if !known_position {
            self.visited.insert(offset);
            self.chain.push(offset);
        }
        self.current_index = if known_position {
            index
        } else {
            Some(self.chain.len() - 1).filter(|_| index.is_some())
        };
        self.current = Some(directory);
        Ok(self.current.as_ref())
    }

    /// Reset to the state right after open.
    ///
    /// Clears the visited set, the current directory and the jump counter.
    pub fn rewind(&mut self) {
        self.current = None;
        self.current_index = None;
        self.chain.clear();
        self.visited.clear();
        self.started = false;
        self.stop_reason = None;
        self.jumps = 0;
    }

    /// Iterate over the main chain from the first directory.
    ///
    /// The iterator keeps its own position and visited set, so the
    /// navigator's current directory is left alone. It yields at most
    /// `max_directories` items (further capped by the configured limit) and
    /// ends after the first error.
    pub fn enumerate_all(&mut self, max_directories: usize) -> Directories<'_, S> {
        let cap = max_directories.min(self.options.limits.max_directories);
        let next_offset = self.header.first_ifd_offset;
        Directories {
            navigator: self,
            next_offset,
            visited: HashSet::new(),
            remaining: cap,
            done: false,
        }
    }

    /// Count main-chain directories without parsing their fields.
    ///
    /// Walks entry counts and next pointers only, stopping at the end of the
    /// chain, a cycle, `max_directories`, or the first unreadable directory.
    /// The navigator's position is not changed.
    pub fn count_directories(&mut self) -> usize {
        let mut visited = HashSet::new();
        let mut offset = self.header.first_ifd_offset;

        while offset != 0 && visited.len() < self.options.limits.max_directories {
            if !visited.insert(offset) {
                break;
            }
            match self.peek_next_offset(offset) {
                Ok(next) => offset = next,
                Err(e) => {
                    debug!(offset, error = %e, "Stopped counting directories");
                    break;
                }
            }
        }
        visited.len()
    }

    /// Rewind and walk to the `index`-th main-chain directory.
    ///
    /// # Errors
    /// - `CycleDetected` if the chain loops before reaching `index`
    /// - `OutOfRangeReference` if the chain ends first (`offset` holds the
    ///   requested index, `size` the number of directories found)
    /// - any parse error met on the way
    pub fn set_directory_index(&mut self, index: usize) -> Result<&Directory, TiffError> {
        self.rewind();
        for _ in 0..=index {
            if self.read_next_directory()?.is_none() {
                return Err(match self.stop_reason {
                    Some(StopReason::Cycle { offset }) => TiffError::CycleDetected { offset },
                    _ => TiffError::OutOfRangeReference {
                        offset: index as u64,
                        length: 1,
                        size: self.chain.len() as u64,
                    },
                });
            }
        }
        self.current
            .as_ref()
            .ok_or(TiffError::InvalidGeometry("no current directory".to_string()))
    }

    // -------------------------------------------------------------------------
    // Explicit jumps
    // -------------------------------------------------------------------------

    /// Make the directory at an arbitrary offset current.
    ///
    /// The offset need not be on the main chain. The visited set is left
    /// untouched; the jump counts toward `max_jumps`. A following
    /// [`read_next_directory`](Self::read_next_directory) continues from this
    /// directory's next pointer.
    pub fn set_directory(&mut self, offset: u64) -> Result<&Directory, TiffError> {
        self.take_jump()?;
        let directory = self.parse_at(offset)?;

        self.current_index = self.chain.iter().position(|&o| o == offset);
        self.current = Some(directory);
        self.started = true;
        self.stop_reason = None;
        self.current
            .as_ref()
            .ok_or(TiffError::InvalidGeometry("no current directory".to_string()))
    }

    /// Parse the `index`-th sub-directory referenced by `entry`.
    ///
    /// The current directory is unchanged. Counts toward `max_jumps`.
    ///
    /// # Errors
    /// - `NotASubDirectory` if the entry holds no directory offsets
    /// - `OutOfRangeReference` if `index` is past the entry's offsets
    pub fn enter_sub_directory(
        &mut self,
        entry: &IfdEntry,
        index: usize,
    ) -> Result<Directory, TiffError> {
        if !entry.is_sub_directory() {
            return Err(TiffError::NotASubDirectory { tag: entry.tag_id });
        }
        self.take_jump()?;

        let offsets = self.value_reader().read_u64_array(entry)?;
        let offset = *offsets.get(index).ok_or(TiffError::OutOfRangeReference {
            offset: index as u64,
            length: 1,
            size: offsets.len() as u64,
        })?;

        debug!(tag = entry.tag_id, index, offset, "Entering sub-directory");
        self.parse_at(offset)
    }

    /// Parse the `index`-th sub-directory named by `tag` in the current directory.
    ///
    /// Returns `Ok(None)` if the current directory has no such field.
    pub fn sub_directory(&mut self, tag: u16, index: usize) -> Result<Option<Directory>, TiffError> {
        let Some(entry) = self.current_entry(tag) else {
            return Ok(None);
        };
        self.enter_sub_directory(&entry, index).map(Some)
    }

    /// The Exif private directory of the current directory.
    pub fn exif_directory(&mut self) -> Result<Option<Directory>, TiffError> {
        self.sub_directory(TiffTag::ExifIfd.as_u16(), 0)
    }

    /// The GPS private directory of the current directory.
    pub fn gps_directory(&mut self) -> Result<Option<Directory>, TiffError> {
        self.sub_directory(TiffTag::GpsIfd.as_u16(), 0)
    }

    /// Offsets listed in the current directory's SubIFDs field.
    pub fn sub_directory_offsets(&mut self) -> Result<Vec<u64>, TiffError> {
        match self.current_entry(TiffTag::SubIfds.as_u16()) {
            Some(entry) => self.value_reader().read_u64_array(&entry),
            None => Ok(Vec::new()),
        }
    }

    // -------------------------------------------------------------------------
    // Field access
    // -------------------------------------------------------------------------

    /// Decode any entry's value, from this or another directory of the stream.
    pub fn read_value(&mut self, entry: &IfdEntry) -> Result<Value, TiffError> {
        self.value_reader().read_value(entry)
    }

    /// Value of `tag` in the current directory.
    pub fn field_value(&mut self, tag: u16) -> Result<Option<Value>, TiffError> {
        match self.current_entry(tag) {
            Some(entry) => self.read_value(&entry).map(Some),
            None => Ok(None),
        }
    }

    /// First value of an unsigned integer field of the current directory.
    ///
    /// # Errors
    /// `InvalidTagValue` if the field holds another type or no values.
    pub fn field_u64(&mut self, tag: u16) -> Result<Option<u64>, TiffError> {
        let Some(entry) = self.current_entry(tag) else {
            return Ok(None);
        };
        let name = self.catalog.name_of(tag).into_owned();
        self.value_reader()
            .read_u64(&entry)
            .map(Some)
            .map_err(|err| err.for_tag(name))
    }

    /// Like [`field_u64`](Self::field_u64), falling back to the baseline default.
    pub fn field_u64_defaulted(&mut self, tag: u16) -> Result<Option<u64>, TiffError> {
        match self.field_u64(tag)? {
            Some(value) => Ok(Some(value)),
            None => Ok(TiffTag::from_u16(tag).and_then(TiffTag::default_value)),
        }
    }

    // -------------------------------------------------------------------------
    // Addressing and payload
    // -------------------------------------------------------------------------

    /// Addressing view of the current directory.
    pub fn addressing(&mut self) -> Result<Addressing, TiffError> {
        let directory = self
            .current
            .clone()
            .ok_or(TiffError::InvalidGeometry("no current directory".to_string()))?;
        Addressing::resolve(self, &directory)
    }

    /// Read the encoded bytes of one strip or tile.
    pub fn read_raw_unit(&mut self, addressing: &Addressing, index: u64) -> Result<Bytes, TiffError> {
        let (offset, length) = addressing.unit_span(index)?;
        self.options.limits.check_single(length)?;
        Ok(self.stream.read_exact_at(offset, length as usize)?)
    }

    /// Read one strip or tile and run it through its codec and predictor.
    ///
    /// The result has exactly [`Addressing::unit_uncompressed_size`] bytes.
    pub fn read_decoded_unit(
        &mut self,
        addressing: &Addressing,
        index: u64,
        codecs: &CodecRegistry,
    ) -> Result<Vec<u8>, TiffError> {
        let expected = addressing.unit_uncompressed_size(index)?;
        self.options.limits.check_single(expected)?;

        let codec = codecs
            .codec(addressing.compression)
            .ok_or(TiffError::UnsupportedCompression(addressing.compression))?;
        let predictor = codecs
            .predictor(addressing.predictor)
            .ok_or(TiffError::UnsupportedPredictor(addressing.predictor))?;

        let raw = self.read_raw_unit(addressing, index)?;
        let decoded = codec
            .decode(&raw, expected as usize)
            .map_err(|source| TiffError::Codec { unit: index, source })?;
        if decoded.len() as u64 != expected {
            return Err(TiffError::Codec {
                unit: index,
                source: CodecError::SizeMismatch {
                    expected: expected as usize,
                    actual: decoded.len(),
                },
            });
        }

        let row_bytes = addressing.unit_row_size()? as usize;
        if row_bytes == 0 {
            return Ok(decoded);
        }
        let row_width = addressing.unit_row_width();
        let sample_width = addressing.pixel_stride_bytes();

        let mut out = Vec::with_capacity(decoded.len());
        for row in decoded.chunks(row_bytes) {
            let transformed = predictor
                .transform(row, row_width as usize, sample_width as usize)
                .map_err(|source| TiffError::Codec { unit: index, source })?;
            out.extend_from_slice(&transformed);
        }
        Ok(out)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Close the stream explicitly, reporting any error.
    pub fn close(mut self) -> Result<(), IoError> {
        self.closed = true;
        self.stream.close()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    pub(crate) fn value_reader(&mut self) -> ValueReader<'_, S> {
        ValueReader::new(&mut self.stream, &self.header, &self.options.limits)
    }

    pub(crate) fn stream_size(&self) -> u64 {
        self.stream.size()
    }

    fn current_entry(&self, tag: u16) -> Option<IfdEntry> {
        self.current.as_ref()?.get(tag).cloned()
    }

    fn take_jump(&mut self) -> Result<(), TiffError> {
        if self.jumps >= self.options.max_jumps {
            return Err(TiffError::JumpLimitExceeded {
                limit: self.options.max_jumps,
            });
        }
        self.jumps += 1;
        Ok(())
    }

    fn parse_at(&mut self, offset: u64) -> Result<Directory, TiffError> {
        let ctx = ParseContext {
            options: &self.options,
            catalog: &self.catalog,
        };
        Directory::read(&mut self.stream, &self.header, ctx, offset)
    }

    /// Read a directory's next pointer without decoding its entries.
    fn peek_next_offset(&mut self, offset: u64) -> Result<u64, TiffError> {
        let mode = self.header.mode;
        let size = self.stream.size();
        let count_bytes = self.stream.read_exact_at(offset, mode.count_size())?;
        let count = self
            .header
            .decoder(&count_bytes, offset)
            .entry_count_at(0, mode)?;

        let next_pos = count
            .checked_mul(mode.entry_size() as u64)
            .and_then(|table| table.checked_add(offset + mode.count_size() as u64))
            .filter(|pos| pos.checked_add(mode.offset_size() as u64).map_or(false, |end| end <= size))
            .ok_or(TiffError::TruncatedInput {
                offset,
                required: count.saturating_mul(mode.entry_size() as u64),
                available: size.saturating_sub(offset),
            })?;

        let bytes = self.stream.read_exact_at(next_pos, mode.offset_size())?;
        self.header.decoder(&bytes, next_pos).offset_at(0, mode)
    }
}

impl<S: Stream> Drop for Navigator<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.stream.close() {
            debug!(stream = self.stream.identifier(), error = %e, "Failed to close stream");
        }
    }
}

// =============================================================================
// Directories iterator
// =============================================================================

/// Lazy main-chain iterator returned by [`Navigator::enumerate_all`].
pub struct Directories<'a, S: Stream> {
    navigator: &'a mut Navigator<S>,
    next_offset: u64,
    visited: HashSet<u64>,
    remaining: usize,
    done: bool,
}

impl<S: Stream> Iterator for Directories<'_, S> {
    type Item = Result<Directory, TiffError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 || self.next_offset == 0 {
            return None;
        }
        if !self.visited.insert(self.next_offset) {
            warn!(offset = self.next_offset, "Directory chain loops back, stopping enumeration");
            self.done = true;
            return None;
        }

        self.remaining -= 1;
        match self.navigator.parse_at(self.next_offset) {
            Ok(directory) => {
                self.next_offset = directory.next_offset();
                Some(Ok(directory))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
