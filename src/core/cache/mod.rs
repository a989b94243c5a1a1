// src/core/cache/mod.rs

//! Keyed byte-blob cache store abstraction, wrapping a
//! [`Compressor`](crate::core::compressor::Compressor). Concrete stores only
//! ever move opaque, already-(de)compressed bytes; the serialization and
//! compression logic lives once in [`Cache`] so individual backends stay
//! simple (`get/put/purge` over `Bytes`).

mod file_store;
mod memory_store;
mod null_store;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use null_store::NullStore;

use crate::core::compressor::{self, Compressor};
use crate::core::errors::ProxyError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The cached payload: the upstream content type and the raw response bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_type: String,
    #[serde(with = "bytes_as_vec")]
    pub body: Bytes,
}

// `serde_json` has no native `Bytes` support; adapt it to a byte array
// rather than pulling in another dependency just for this one field.
mod bytes_as_vec {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
        let v = Vec::<u8>::deserialize(d)?;
        Ok(Bytes::from(v))
    }
}

/// Uniform `get/put/purge` contract implemented by every cache backend, over
/// already-serialized-and-compressed bytes.
#[async_trait]
pub trait CacheStore: Send + Sync + std::fmt::Debug {
    /// Fetches the raw bytes stored for `key`, or `None` on a clean miss.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, ProxyError>;

    /// Stores `bytes` under `key`, replacing any prior value.
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), ProxyError>;

    /// Drops every entry in the store.
    async fn purge(&self) -> Result<(), ProxyError>;
}

/// Builds a store from the `CACHE_STORE` configuration name.
pub fn store_from_name(name: &str, path: &std::path::Path) -> anyhow::Result<Box<dyn CacheStore>> {
    match name {
        "null" => Ok(Box::new(NullStore)),
        "memory" => Ok(Box::new(MemoryStore::new())),
        "file" => Ok(Box::new(FileStore::new(path.to_path_buf()))),
        other => Err(anyhow::anyhow!("unknown cache store '{other}'")),
    }
}

/// Combines a [`CacheStore`] with a [`Compressor`] behind the single
/// serialize/compress boundary the rest of the system talks to.
pub struct Cache {
    store: Box<dyn CacheStore>,
    compressor: Box<dyn Compressor>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("store", &self.store)
            .field("compressor_id", &self.compressor.id())
            .finish()
    }
}

impl Cache {
    pub fn new(store: Box<dyn CacheStore>, compressor: Box<dyn Compressor>) -> Self {
        Self { store, compressor }
    }

    /// The compressor id, used to namespace cache keys.
    pub fn compressor_id(&self) -> &'static str {
        self.compressor.id()
    }

    /// Looks up `fingerprint` (already suffixed with the compressor id by
    /// the caller). Any store error is logged and downgraded to a miss —
    /// a cache malfunction must never fail the request.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.get_inner(key).await;
        let outcome = if entry.is_some() { "hit" } else { "miss" };
        crate::core::metrics::CACHE_LOOKUPS_TOTAL.with_label_values(&[outcome]).inc();
        entry
    }

    async fn get_inner(&self, key: &str) -> Option<CacheEntry> {
        let bytes = match self.store.get(key).await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, key, "cache get failed, treating as miss");
                return None;
            }
        }?;
        match decode_entry(&bytes, self.compressor.as_ref()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, key, "cache entry failed to decode, treating as miss");
                None
            }
        }
    }

    /// Write-behind: failures are logged, never propagated.
    pub async fn put(&self, key: &str, entry: &CacheEntry) {
        let bytes = match encode_entry(entry, self.compressor.as_ref()) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, key, "cache entry failed to encode, dropping write");
                return;
            }
        };
        if let Err(e) = self.store.put(key, Bytes::from(bytes)).await {
            warn!(error = %e, key, "cache put failed");
        }
    }

    pub async fn purge(&self) -> Result<(), ProxyError> {
        self.store.purge().await
    }
}

/// Builds a [`Cache`] from the configured store and compressor names.
pub fn build(
    store_name: &str,
    store_path: &std::path::Path,
    compressor_name: &str,
) -> anyhow::Result<Cache> {
    let store = store_from_name(store_name, store_path)?;
    let compressor = compressor::from_name(compressor_name)?;
    Ok(Cache::new(store, compressor))
}

/// Serializes a [`CacheEntry`] to bytes and compresses it.
fn encode_entry(entry: &CacheEntry, compressor: &dyn Compressor) -> Result<Vec<u8>, ProxyError> {
    let raw = serde_json::to_vec(entry)?;
    compressor.encode(&raw)
}

/// Inverts [`encode_entry`].
fn decode_entry(bytes: &[u8], compressor: &dyn Compressor) -> Result<CacheEntry, ProxyError> {
    let raw = compressor.decode(bytes)?;
    Ok(serde_json::from_slice(&raw)?)
}
