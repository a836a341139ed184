//! Pixel codec collaborators.
//!
//! The directory engine never decodes pixels itself. When a save has to
//! byte swap compressed samples, it asks the [`CodecRegistry`] for the codec
//! registered under the chunk's Compression value and decompresses one strip
//! or tile at a time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TiffError};
use crate::tiff::Compression;

/// Decoder for one compression scheme.
pub trait PixelCodec: Send + Sync {
    /// Decompress one strip or tile.
    ///
    /// `expected_len` is the planned uncompressed length. Codecs may return
    /// more or fewer bytes; the caller truncates or zero-pads.
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

/// Codec for uncompressed data.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncompressed;

impl PixelCodec for Uncompressed {
    fn decompress(&self, data: &[u8], _expected_len: usize) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// Codecs keyed by Compression tag value.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<u16, Arc<dyn PixelCodec>>,
}

impl CodecRegistry {
    /// Registry holding only the uncompressed codec.
    pub fn new() -> Self {
        let mut codecs: HashMap<u16, Arc<dyn PixelCodec>> = HashMap::new();
        codecs.insert(Compression::None as u16, Arc::new(Uncompressed));
        Self { codecs }
    }

    /// Register `codec` for `compression`, replacing any previous codec.
    pub fn register(&mut self, compression: u16, codec: Arc<dyn PixelCodec>) {
        self.codecs.insert(compression, codec);
    }

    pub fn get(&self, compression: u16) -> Option<&Arc<dyn PixelCodec>> {
        self.codecs.get(&compression)
    }

    pub fn supports(&self, compression: u16) -> bool {
        self.codecs.contains_key(&compression)
    }

    /// Decompress with the codec for `compression`.
    ///
    /// # Errors
    /// `MissingCodec` if nothing is registered for `compression`.
    pub fn decompress(&self, compression: u16, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        self.get(compression)
            .ok_or(TiffError::MissingCodec(compression))?
            .decompress(data, expected_len)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut schemes: Vec<u16> = self.codecs.keys().copied().collect();
        schemes.sort_unstable();
        f.debug_struct("CodecRegistry")
            .field("schemes", &schemes)
            .finish()
    }
}
