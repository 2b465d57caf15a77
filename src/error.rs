use thiserror::Error;

/// Errors raised by a [`Stream`](crate::io::Stream) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IoError {
    /// Requested range exceeds the stream bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Seek target lies before the start of the stream
    #[error("Invalid seek: target position {0} is before the start of the stream")]
    InvalidSeek(i128),

    /// Stream was opened read-only
    #[error("Stream is read-only: {0}")]
    ReadOnly(String),

    /// Growing the backing storage would exceed the configured cap
    #[error("Stream capacity exceeded: need {required} bytes, cap is {cap}")]
    CapacityExceeded { required: u64, cap: u64 },

    /// Operation attempted on a closed stream
    #[error("Stream is closed: {0}")]
    Closed(String),

    /// Error reported by an underlying std::io resource
    #[error("I/O error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Backend(err.to_string())
    }
}

/// Errors reported by an external codec or predictor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Decoded output did not have the expected size
    #[error("Decoded size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Input could not be decoded
    #[error("Corrupt input: {0}")]
    Corrupt(String),

    /// Parameters not supported by this implementation
    #[error("Unsupported parameters: {0}")]
    Unsupported(String),
}

/// Errors that can occur when navigating and addressing a TIFF stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TiffError {
    /// Error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Stream is shorter than a required read
    #[error("Truncated input: need {required} bytes at offset {offset}, only {available} available")]
    TruncatedInput {
        offset: u64,
        required: u64,
        available: u64,
    },

    /// Entry count or field layout inconsistent with the directory contents
    #[error("Malformed directory at offset {offset}: {reason}")]
    MalformedDirectory { offset: u64, reason: String },

    /// An offset or computed region falls outside the stream
    #[error("Out of range reference: offset {offset}, length {length}, stream size {size}")]
    OutOfRangeReference { offset: u64, length: u64, size: u64 },

    /// A requested buffer would exceed the single or cumulative allocation cap
    #[error("Allocation limit exceeded: requested {requested} bytes, limit is {limit}")]
    AllocationLimitExceeded { requested: u64, limit: u64 },

    /// Unrecognized byte-order magic or version word
    #[error("Unsupported addressing mode: magic 0x{magic:04X}, version {version}")]
    UnsupportedAddressingMode { magic: u16, version: u16 },

    /// Main-chain traversal met an offset it had already visited
    #[error("Directory chain cycle detected at offset {offset}")]
    CycleDetected { offset: u64 },

    /// Image or unit geometry that cannot be addressed
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Required tag is missing from the directory
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has an unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: String, message: String },

    /// Field does not hold a sub-directory offset
    #[error("Tag {tag} does not reference a sub-directory")]
    NotASubDirectory { tag: u16 },

    /// Caller-supplied jump budget is exhausted
    #[error("Jump limit exceeded: {limit} explicit jumps allowed")]
    JumpLimitExceeded { limit: usize },

    /// Tag id already present in the catalog
    #[error("Tag {0} is already registered")]
    DuplicateTag(u16),

    /// No codec registered for the compression scheme
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(u16),

    /// No predictor registered for the predictor value
    #[error("Unsupported predictor: {0}")]
    UnsupportedPredictor(u16),

    /// Codec or predictor failure for one unit
    #[error("Codec error in unit {unit}: {source}")]
    Codec {
        unit: u64,
        #[source]
        source: CodecError,
    },
}

impl TiffError {
    /// Rename the tag of an [`TiffError::InvalidTagValue`]; other errors pass through.
    pub fn for_tag(self, name: impl Into<String>) -> Self {
        match self {
            TiffError::InvalidTagValue { message, .. } => TiffError::InvalidTagValue {
                tag: name.into(),
                message,
            },
            other => other,
        }
    }

    /// Shorthand for a [`TiffError::MalformedDirectory`].
    pub fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        TiffError::MalformedDirectory {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether this error only ends the current operation rather than the whole file.
    ///
    /// Open failures are the only fatal kind.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TiffError::UnsupportedAddressingMode { .. })
    }
}
