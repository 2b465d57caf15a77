//! Compression codecs and predictors.
//!
//! Strip and tile payloads pass through two stages on the way out:
//!
//! 1. A [`Codec`] chosen by the Compression field expands the stored bytes
//!    to the unit's uncompressed size.
//! 2. A [`Predictor`] chosen by the Predictor field undoes differencing,
//!    one row at a time.
//!
//! Only the identity codec (`Compression = 1`) and identity predictor
//! (`Predictor = 1`) ship built in. Others are registered by the caller.

use std::collections::HashMap;
use std::fmt;

use crate::error::CodecError;

/// Decompresses one strip or tile.
pub trait Codec: Send + Sync {
    /// Decode `compressed` into exactly `expected_size` bytes.
    fn decode(&self, compressed: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError>;
}

/// Reverses a predictor on one decoded row.
///
/// `row_width` is the row length in pixels and `sample_width` the distance
/// in bytes between the same sample of neighbouring pixels.
pub trait Predictor: Send + Sync {
    fn transform(
        &self,
        row: &[u8],
        row_width: usize,
        sample_width: usize,
    ) -> Result<Vec<u8>, CodecError>;
}

/// `Compression = 1`: data is stored as is.
///
/// Extra trailing bytes are ignored; missing bytes are an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn decode(&self, compressed: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
        if compressed.len() < expected_size {
            return Err(CodecError::SizeMismatch {
                expected: expected_size,
                actual: compressed.len(),
            });
        }
        Ok(compressed[..expected_size].to_vec())
    }
}

/// `Predictor = 1`: no prediction.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPredictor;

impl Predictor for IdentityPredictor {
    fn transform(
        &self,
        row: &[u8],
        _row_width: usize,
        _sample_width: usize,
    ) -> Result<Vec<u8>, CodecError> {
        Ok(row.to_vec())
    }
}

/// Codecs keyed by Compression value and predictors keyed by Predictor value.
pub struct CodecRegistry {
    codecs: HashMap<u16, Box<dyn Codec>>,
    predictors: HashMap<u16, Box<dyn Predictor>>,
}

impl CodecRegistry {
    /// Registry with the identity codec and predictor.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_codec(1, IdentityCodec);
        registry.register_predictor(1, IdentityPredictor);
        registry
    }

    /// Registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
            predictors: HashMap::new(),
        }
    }

    /// Register a codec, replacing any previous one for `compression`.
    pub fn register_codec(&mut self, compression: u16, codec: impl Codec + 'static) {
        self.codecs.insert(compression, Box::new(codec));
    }

    /// Register a predictor, replacing any previous one for `predictor`.
    pub fn register_predictor(&mut self, predictor: u16, implementation: impl Predictor + 'static) {
        self.predictors.insert(predictor, Box::new(implementation));
    }

    pub fn codec(&self, compression: u16) -> Option<&dyn Codec> {
        self.codecs.get(&compression).map(|codec| codec.as_ref())
    }

    pub fn predictor(&self, predictor: u16) -> Option<&dyn Predictor> {
        self.predictors.get(&predictor).map(|p| p.as_ref())
    }

    pub fn supports_compression(&self, compression: u16) -> bool {
        self.codecs.contains_key(&compression)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codecs: Vec<_> = self.codecs.keys().collect();
        codecs.sort();
        let mut predictors: Vec<_> = self.predictors.keys().collect();
        predictors.sort();
        f.debug_struct("CodecRegistry")
            .field("codecs", &codecs)
            .field("predictors", &predictors)
            .finish()
    }
}
