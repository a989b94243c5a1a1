// src/core/cache/file_store.rs

use super::CacheStore;
use crate::core::errors::ProxyError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A filesystem-backed cache store. Keys are fanned out two levels deep
/// (`root/AA/BB/AABBCCCC...`) so no single directory accumulates every
/// cache entry. There is no index file: `purge` simply removes the whole
/// tree, and entries are otherwise only enumerable by directory scan.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        if key.len() < 4 {
            return self.root.join(key);
        }
        self.root
            .join(&key[0..2])
            .join(&key[2..4])
            .join(key)
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, ProxyError> {
        match fs::read(self.entry_path(key)).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), ProxyError> {
        let final_path = self.entry_path(key);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write-temp-then-rename: a concurrent `get` must never observe a
        // partially written file, and a concurrent `put` for the same key
        // must leave exactly one of the two writers' bytes in place.
        let temp_path = final_path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn purge(&self) -> Result<(), ProxyError> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_then_hit_with_fan_out_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let key = "deadbeef0123.raw";

        assert!(store.get(key).await.unwrap().is_none());
        store.put(key, Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(store.get(key).await.unwrap().unwrap(), Bytes::from_static(b"hello"));
        assert!(dir.path().join("de").join("ad").join(key).exists());
    }

    #[tokio::test]
    async fn put_overwrites_and_no_temp_files_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let key = "cafebabe.zstd";

        store.put(key, Bytes::from_static(b"first")).await.unwrap();
        store.put(key, Bytes::from_static(b"second")).await.unwrap();
        assert_eq!(store.get(key).await.unwrap().unwrap(), Bytes::from_static(b"second"));

        let leaf_dir = dir.path().join("ca").join("fe");
        let mut entries = tokio::fs::read_dir(&leaf_dir).await.unwrap();
        let mut names = Vec::new();
        while let Some(e) = entries.next_entry().await.unwrap() {
            names.push(e.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec![key.to_string()]);
    }

    #[tokio::test]
    async fn purge_removes_the_whole_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.put("aabbccdd.raw", Bytes::from_static(b"x")).await.unwrap();
        store.purge().await.unwrap();
        assert!(store.get("aabbccdd.raw").await.unwrap().is_none());
        // A second purge on an already-absent root must not error.
        store.purge().await.unwrap();
    }
}
