// src/core/compressor/raw.rs

use super::Compressor;
use crate::core::errors::ProxyError;

/// The identity transform. Used when compression is not worth the CPU cost,
/// e.g. for small result sets or when the operator prioritizes latency.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCompressor;

impl Compressor for RawCompressor {
    fn id(&self) -> &'static str {
        "raw"
    }

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, ProxyError> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, ProxyError> {
        Ok(data.to_vec())
    }
}
