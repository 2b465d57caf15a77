//! Configuration for navigation and for the `tiffnav` inspector.
//!
//! Two layers:
//! - [`OpenOptions`] configures a [`Navigator`](crate::Navigator): resource
//!   limits, strictness, unknown-tag warnings and the jump budget
//! - [`Config`] is the inspector's command line, parsed by clap with
//!   environment fallbacks, and converts into `OpenOptions`
//!
//! # Environment Variables
//!
//! Every inspector option can be set with the `TIFFNAV_` prefix:
//!
//! - `TIFFNAV_FORMAT` - Output format, `text` or `json` (default: text)
//! - `TIFFNAV_STRICT` - Reject unsorted/duplicate tags and count mismatches
//! - `TIFFNAV_WARN_UNKNOWN_TAGS` - Log every unknown tag
//! - `TIFFNAV_MAX_DIRECTORIES` - Main-chain directory cap (default: 65536)
//! - `TIFFNAV_MAX_FIELDS` - Entries per directory cap (default: 4096)
//! - `TIFFNAV_MAX_SINGLE_ALLOC` - Single allocation cap in bytes (default: 256MB)
//! - `TIFFNAV_MAX_CUMULATIVE_ALLOC` - Cumulative allocation cap in bytes (default: 1GB)
//! - `TIFFNAV_MAX_JUMPS` - Explicit jump budget (default: 1024)
//! - `TIFFNAV_BLOCK_SIZE` - Read cache block size (default: 64KB)
//! - `TIFFNAV_CACHE_BLOCKS` - Read cache capacity in blocks (default: 64)

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::format::tiff::{
    Limits, DEFAULT_MAX_CUMULATIVE_ALLOC, DEFAULT_MAX_DIRECTORIES,
    DEFAULT_MAX_FIELDS_PER_DIRECTORY, DEFAULT_MAX_SINGLE_ALLOC,
};
use crate::io::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default number of explicit jumps (set_directory, sub-directory descent)
/// allowed between rewinds.
pub const DEFAULT_MAX_JUMPS: usize = 1024;

// =============================================================================
// OpenOptions
// =============================================================================

/// Options applied when opening a stream for navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Allocation and count limits
    pub limits: Limits,

    /// Treat unsorted tags, duplicate tags and count mismatches as errors
    pub strict: bool,

    /// Log a warning for every tag missing from the catalog
    pub warn_unknown_tags: bool,

    /// Explicit jumps allowed before `JumpLimitExceeded`
    pub max_jumps: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            strict: false,
            warn_unknown_tags: false,
            max_jumps: DEFAULT_MAX_JUMPS,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn warn_unknown_tags(mut self, warn: bool) -> Self {
        self.warn_unknown_tags = warn;
        self
    }

    pub fn max_jumps(mut self, max_jumps: usize) -> Self {
        self.max_jumps = max_jumps;
        self
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Output format of the inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing
    Text,
    /// One JSON document
    Json,
}

/// tiffnav - Inspect the directory graph of a TIFF or BigTIFF file.
///
/// Walks the main directory chain and any sub-directories, printing each
/// directory's fields and strip/tile layout.
#[derive(Parser, Debug, Clone)]
#[command(name = "tiffnav")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// File to inspect.
    pub path: PathBuf,

    // =========================================================================
    // Output
    // =========================================================================
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "TIFFNAV_FORMAT")]
    pub format: OutputFormat,

    /// Do not descend into SubIFDs, Exif, GPS or Interoperability directories.
    #[arg(long, default_value_t = false)]
    pub no_sub_directories: bool,

    /// Print field names and types only, without reading values.
    #[arg(long, default_value_t = false)]
    pub no_values: bool,

    // =========================================================================
    // Parsing Policy
    // =========================================================================
    /// Reject unsorted or duplicate tags and unexpected value counts.
    #[arg(long, default_value_t = false, env = "TIFFNAV_STRICT")]
    pub strict: bool,

    /// Log a warning for each unknown tag.
    #[arg(long, default_value_t = false, env = "TIFFNAV_WARN_UNKNOWN_TAGS")]
    pub warn_unknown_tags: bool,

    // =========================================================================
    // Limits
    // =========================================================================
    /// Maximum number of main-chain directories to visit.
    #[arg(long, default_value_t = DEFAULT_MAX_DIRECTORIES, env = "TIFFNAV_MAX_DIRECTORIES")]
    pub max_directories: usize,

    /// Maximum number of entries in one directory.
    #[arg(long, default_value_t = DEFAULT_MAX_FIELDS_PER_DIRECTORY, env = "TIFFNAV_MAX_FIELDS")]
    pub max_fields: u64,

    /// Maximum size in bytes of a single buffer requested for the file.
    #[arg(long, default_value_t = DEFAULT_MAX_SINGLE_ALLOC, env = "TIFFNAV_MAX_SINGLE_ALLOC")]
    pub max_single_alloc: u64,

    /// Maximum total bytes held for one directory or addressing view.
    #[arg(long, default_value_t = DEFAULT_MAX_CUMULATIVE_ALLOC, env = "TIFFNAV_MAX_CUMULATIVE_ALLOC")]
    pub max_cumulative_alloc: u64,

    /// Maximum number of explicit directory jumps.
    #[arg(long, default_value_t = DEFAULT_MAX_JUMPS, env = "TIFFNAV_MAX_JUMPS")]
    pub max_jumps: usize,

    // =========================================================================
    // Read Cache
    // =========================================================================
    /// Block size in bytes for the read cache.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "TIFFNAV_BLOCK_SIZE")]
    pub block_size: usize,

    /// Number of blocks kept in the read cache.
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, env = "TIFFNAV_CACHE_BLOCKS")]
    pub cache_blocks: usize,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_directories == 0 {
            return Err("max_directories must be greater than 0".to_string());
        }
        if self.max_fields == 0 {
            return Err("max_fields must be greater than 0".to_string());
        }
        if self.max_single_alloc == 0 {
            return Err("max_single_alloc must be greater than 0".to_string());
        }
        if self.max_single_alloc > self.max_cumulative_alloc {
            return Err("max_single_alloc cannot exceed max_cumulative_alloc".to_string());
        }
        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }

        // Validate block size (must be reasonable)
        if self.block_size < 1024 || self.block_size > 16 * 1024 * 1024 {
            return Err("block_size must be between 1KB and 16MB".to_string());
        }

        Ok(())
    }

    /// Limits described by this configuration.
    pub fn limits(&self) -> Limits {
        Limits {
            max_single_alloc: self.max_single_alloc,
            max_cumulative_alloc: self.max_cumulative_alloc,
            max_directories: self.max_directories,
            max_fields_per_directory: self.max_fields,
        }
    }

    /// Navigator options described by this configuration.
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions::new()
            .limits(self.limits())
            .strict(self.strict)
            .warn_unknown_tags(self.warn_unknown_tags)
            .max_jumps(self.max_jumps)
    }
}

// =============================================================================
// Tests
// =============================================================================
