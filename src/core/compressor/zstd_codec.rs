// src/core/compressor/zstd_codec.rs

use super::Compressor;
use crate::core::errors::ProxyError;

/// General-purpose lossless compression for cache values, grounded on the
/// same `zstd` crate used elsewhere in this codebase for on-disk values.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        // Level 3 is zstd's own default: a good latency/ratio trade-off for
        // the JSON-ish SPARQL result bodies this proxy caches.
        Self { level: 3 }
    }
}

impl Compressor for ZstdCompressor {
    fn id(&self) -> &'static str {
        "zstd"
    }

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, ProxyError> {
        zstd::encode_all(data, self.level)
            .map_err(|e| ProxyError::Internal(format!("zstd encode failed: {e}")))
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, ProxyError> {
        zstd::decode_all(data).map_err(|e| ProxyError::Internal(format!("zstd decode failed: {e}")))
    }
}
