// src/core/compressor/mod.rs

//! Byte-level value transforms used by the cache store.
//!
//! Each compressor is identified by a short id that becomes part of the cache
//! key (`fingerprint + "." + compressorId`), so switching the configured
//! compressor never risks decoding bytes written by a previous codec under
//! the same key.

mod raw;
mod zstd_codec;

use crate::core::errors::ProxyError;

pub use raw::RawCompressor;
pub use zstd_codec::ZstdCompressor;

/// A reversible byte-level transform applied to cache values before they are
/// written to a store, and undone after they are read back.
pub trait Compressor: Send + Sync + std::fmt::Debug {
    /// Short id used as the cache-key suffix (e.g. `"raw"`, `"zstd"`).
    fn id(&self) -> &'static str;

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, ProxyError>;

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, ProxyError>;
}

/// Resolves the configured compressor name (`raw` or `zstd`) to an instance.
pub fn from_name(name: &str) -> anyhow::Result<Box<dyn Compressor>> {
    match name {
        "raw" => Ok(Box::new(RawCompressor)),
        "zstd" => Ok(Box::new(ZstdCompressor::default())),
        other => Err(anyhow::anyhow!("unknown compressor '{other}'")),
    }
}
