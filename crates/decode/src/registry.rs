//! Pluggable decoder registry

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::{AnimatedDecoder, Bitmap, DecodeFailure, FormatFamily, RasterDecoder, VectorDecoder};

/// Turns the encoded bytes of one format family into a bitmap
pub trait Decoder: Send + Sync {
    /// Decode `data`, read from `path`
    ///
    /// `path` is used for error reporting and for resolving resources the
    /// source refers to; implementations must not re-read it.
    fn decode(&self, path: &Path, data: &[u8]) -> Result<Bitmap, DecodeFailure>;
}

/// Decoders keyed by format family
///
/// The default registry carries one built-in decoder per family. Entries
/// can be replaced to customise decoding for a family.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<FormatFamily, Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    /// Create a registry with no decoders
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register `decoder` for `family`, replacing any previous entry
    pub fn register(&mut self, family: FormatFamily, decoder: Arc<dyn Decoder>) {
        self.decoders.insert(family, decoder);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, family: FormatFamily, decoder: Arc<dyn Decoder>) -> Self {
        self.register(family, decoder);
        self
    }

    /// Look up the decoder for `family`
    pub fn get(&self, family: FormatFamily) -> Option<&Arc<dyn Decoder>> {
        self.decoders.get(&family)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::empty()
            .with(FormatFamily::Vector, Arc::new(VectorDecoder::default()))
            .with(FormatFamily::Animated, Arc::new(AnimatedDecoder))
            .with(FormatFamily::StaticRaster, Arc::new(RasterDecoder))
    }
}
