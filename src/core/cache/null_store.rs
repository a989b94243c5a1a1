// src/core/cache/null_store.rs

use super::CacheStore;
use crate::core::errors::ProxyError;
use async_trait::async_trait;
use bytes::Bytes;

/// A cache store that caches nothing. Every `get` is a miss, every `put`
/// a no-op. Used when `CACHE_STORE=null` (the default), or as a safe
/// fallback where caching would be unsafe.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

#[async_trait]
impl CacheStore for NullStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, ProxyError> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _bytes: Bytes) -> Result<(), ProxyError> {
        Ok(())
    }

    async fn purge(&self) -> Result<(), ProxyError> {
        Ok(())
    }
}
