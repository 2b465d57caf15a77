//! Directory graph reports.
//!
//! [`inspect`] walks the main chain of a [`Navigator`] and, optionally, every
//! sub-directory, collecting a serializable [`Report`]. Failures inside one
//! directory (an unreadable value, bad unit geometry, a broken sub-directory
//! pointer) are recorded in that directory's summary instead of aborting the
//! whole report.

use std::fmt::{self, Write as _};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::TiffError;
use crate::format::tiff::{
    Addressing, ByteOrder, Compression, Directory, Navigator, StopReason, TiffTag,
};
use crate::io::Stream;

/// Sub-directory nesting followed before giving up.
pub const MAX_SUB_DIRECTORY_DEPTH: usize = 8;

/// Units listed per directory in a report.
pub const MAX_LISTED_UNITS: usize = 16;

// =============================================================================
// Report Types
// =============================================================================

/// What to include in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectOptions {
    /// Follow SubIFDs, Exif, GPS and Interoperability pointers
    pub sub_directories: bool,

    /// Decode field values
    pub values: bool,

    /// Main-chain directories to visit at most
    pub max_directories: usize,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            sub_directories: true,
            values: true,
            max_directories: usize::MAX,
        }
    }
}

/// Report for one stream.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Stream identifier
    pub source: String,

    /// "little-endian" or "big-endian"
    pub byte_order: String,

    /// Whether the stream uses 64-bit offsets
    pub bigtiff: bool,

    /// Main-chain directories in order
    pub directories: Vec<DirectorySummary>,

    /// Why traversal stopped
    pub stop_reason: String,

    /// Error that ended traversal, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One directory and everything hanging off it.
#[derive(Debug, Clone, Serialize)]
pub struct DirectorySummary {
    /// Main-chain position; absent for sub-directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    /// Absolute offset of the directory
    pub offset: u64,

    /// Offset of the following directory, 0 at the end
    pub next_offset: u64,

    pub fields: Vec<FieldSummary>,

    /// Strip or tile layout, when the directory describes an image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<UnitSummary>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_directories: Vec<SubDirectorySummary>,

    /// Problems met while summarizing this directory
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// One field of a directory.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSummary {
    pub tag: u16,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub count: u64,

    /// Rendered value, absent when values were not requested or unreadable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A directory reached through a sub-directory field.
#[derive(Debug, Clone, Serialize)]
pub struct SubDirectorySummary {
    /// Name of the field holding the pointer
    pub via: String,
    /// Position within that field's offsets
    pub position: usize,
    pub directory: DirectorySummary,
}

/// Strip or tile layout of an image directory.
#[derive(Debug, Clone, Serialize)]
pub struct UnitSummary {
    /// "strips" or "tiles"
    pub layout: String,
    pub width: u64,
    pub height: u64,
    pub samples_per_pixel: u64,
    pub bits_per_sample: u64,
    pub compression: String,
    pub unit_count: u64,

    /// (offset, byte count) of the first units
    pub units: Vec<(u64, u64)>,
}

// =============================================================================
// Inspection
// =============================================================================

/// Walk the directory graph and summarize it.
///
/// Only errors that prevent reading the stream at all are returned; problems
/// inside the graph end up in the report.
pub fn inspect<S: Stream>(
    navigator: &mut Navigator<S>,
    options: &InspectOptions,
) -> Result<Report, TiffError> {
    navigator.rewind();

    let mut directories = Vec::new();
    let mut error = None;

    while directories.len() < options.max_directories {
        let directory = match navigator.read_next_directory() {
            Ok(Some(directory)) => directory.clone(),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Directory chain ended with an error");
                error = Some(e.to_string());
                break;
            }
        };

        let index = navigator.current_index();
        let summary = summarize(navigator, &directory, index, options, 0);
        directories.push(summary);
    }

    let stop_reason = match navigator.stop_reason() {
        Some(StopReason::EndOfChain) | None => "end of chain".to_string(),
        Some(StopReason::Cycle { offset }) => format!("cycle back to offset {}", offset),
        Some(StopReason::Limit) => "directory limit reached".to_string(),
        Some(StopReason::Malformed) => "malformed directory".to_string(),
    };

    Ok(Report {
        source: navigator.stream().identifier().to_string(),
        byte_order: match navigator.byte_order() {
            ByteOrder::LittleEndian => "little-endian".to_string(),
            ByteOrder::BigEndian => "big-endian".to_string(),
        },
        bigtiff: navigator.header().is_bigtiff(),
        directories,
        stop_reason,
        error,
    })
}

fn summarize<S: Stream>(
    navigator: &mut Navigator<S>,
    directory: &Directory,
    index: Option<usize>,
    options: &InspectOptions,
    depth: usize,
) -> DirectorySummary {
    let mut errors = Vec::new();

    let mut fields = Vec::with_capacity(directory.len());
    for entry in directory.entries() {
        let value = if options.values {
            match navigator.read_value(entry) {
                Ok(value) => Some(value.to_string()),
                Err(e) => {
                    errors.push(format!("tag {}: {}", entry.tag_id, e));
                    None
                }
            }
        } else {
            None
        };
        fields.push(FieldSummary {
            tag: entry.tag_id,
            name: navigator.catalog().name_of(entry.tag_id).into_owned(),
            field_type: entry.field_type.name().to_string(),
            count: entry.count,
            value,
        });
    }

    let units = if directory.get_tag(TiffTag::ImageWidth).is_some() {
        match Addressing::resolve(navigator, directory).and_then(|a| unit_summary(&a)) {
            Ok(units) => Some(units),
            Err(e) => {
                errors.push(format!("units: {}", e));
                None
            }
        }
    } else {
        None
    };

    let mut sub_directories = Vec::new();
    if options.sub_directories {
        if depth >= MAX_SUB_DIRECTORY_DEPTH {
            if directory.sub_directory_entries().next().is_some() {
                errors.push("sub-directories nested too deeply".to_string());
            }
        } else {
            let entries: Vec<_> = directory.sub_directory_entries().cloned().collect();
            for entry in entries {
                let via = navigator.catalog().name_of(entry.tag_id).into_owned();
                for position in 0..entry.count as usize {
                    match navigator.enter_sub_directory(&entry, position) {
                        Ok(child) => {
                            debug!(via = %via, offset = child.offset(), "Summarizing sub-directory");
                            let summary = summarize(navigator, &child, None, options, depth + 1);
                            sub_directories.push(SubDirectorySummary {
                                via: via.clone(),
                                position,
                                directory: summary,
                            });
                        }
                        Err(e) => {
                            errors.push(format!("{}[{}]: {}", via, position, e));
                            // A broken offset table or exhausted jump budget fails every position
                            break;
                        }
                    }
                }
            }
        }
    }

    DirectorySummary {
        index,
        offset: directory.offset(),
        next_offset: directory.next_offset(),
        fields,
        units,
        sub_directories,
        errors,
    }
}

fn unit_summary(addressing: &Addressing) -> Result<UnitSummary, TiffError> {
    let unit_count = addressing.unit_count()?;
    let listed = unit_count.min(MAX_LISTED_UNITS as u64);
    let units = (0..listed)
        .map(|i| addressing.unit_span(i))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(UnitSummary {
        layout: addressing.layout.name().to_string(),
        width: addressing.width,
        height: addressing.height,
        samples_per_pixel: addressing.samples_per_pixel,
        bits_per_sample: addressing.bits_per_sample,
        compression: Compression::from_u16(addressing.compression)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| format!("unknown ({})", addressing.compression)),
        unit_count,
        units,
    })
}

// =============================================================================
// Text Rendering
// =============================================================================

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}, {})",
            self.source,
            self.byte_order,
            if self.bigtiff { "BigTIFF" } else { "TIFF" }
        )?;
        for directory in &self.directories {
            let mut text = String::new();
            render_directory(&mut text, directory, 0)?;
            f.write_str(&text)?;
        }
        writeln!(f, "{} directories, stopped at {}", self.directories.len(), self.stop_reason)?;
        if let Some(error) = &self.error {
            writeln!(f, "error: {}", error)?;
        }
        Ok(())
    }
}

fn render_directory(out: &mut String, directory: &DirectorySummary, indent: usize) -> fmt::Result {
    let pad = "  ".repeat(indent);
    match directory.index {
        Some(index) => writeln!(out, "{pad}Directory {} @ {}", index, directory.offset)?,
        None => writeln!(out, "{pad}Directory @ {}", directory.offset)?,
    }

    for field in &directory.fields {
        write!(
            out,
            "{pad}  {:>5} {:<28} {:<9} x{}",
            field.tag, field.name, field.field_type, field.count
        )?;
        if let Some(value) = &field.value {
            write!(out, " = {}", value)?;
        }
        writeln!(out)?;
    }

    if let Some(units) = &directory.units {
        writeln!(
            out,
            "{pad}  {} {}: {}x{}, {} x {}-bit, {}",
            units.unit_count,
            units.layout,
            units.width,
            units.height,
            units.samples_per_pixel,
            units.bits_per_sample,
            units.compression
        )?;
    }

    for error in &directory.errors {
        writeln!(out, "{pad}  ! {}", error)?;
    }

    for sub in &directory.sub_directories {
        writeln!(out, "{pad}  {}[{}]:", sub.via, sub.position)?;
        render_directory(out, &sub.directory, indent + 2)?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
