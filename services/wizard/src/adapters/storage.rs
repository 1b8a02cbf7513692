//! services/wizard/src/adapters/storage.rs
//!
//! Implementations of the `DocumentStorage` port: a local directory tree and a
//! process-local map used when nothing should touch the disk.

use async_trait::async_trait;
use bytes::Bytes;
use skilllens_core::ports::{DocumentStorage, PortError, PortResult};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Stores each document under `base_path/<storage path>`.
#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    base_path: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolves a storage path, refusing anything that would escape the base directory.
    fn resolve(&self, path: &str) -> PortResult<PathBuf> {
        let relative = Path::new(path);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !is_plain {
            return Err(PortError::Storage(format!("Invalid storage path '{}'", path)));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl DocumentStorage for LocalDiskStorage {
    async fn put(&self, path: &str, contents: Bytes) -> PortResult<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Storage(e.to_string()))?;
        }
        tokio::fs::write(&target, &contents)
            .await
            .map_err(|e| PortError::Storage(e.to_string()))?;
        debug!("Stored {} bytes at {}", contents.len(), target.display());
        Ok(())
    }

    async fn get(&self, path: &str) -> PortResult<Bytes> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PortError::NotFound(format!("No stored file at '{}'", path)))
            }
            Err(e) => Err(PortError::Storage(e.to_string())),
        }
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Storage(e.to_string())),
        }
    }
}

/// Keeps documents in memory for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStorage for MemoryStorage {
    async fn put(&self, path: &str, contents: Bytes) -> PortResult<()> {
        self.blobs.write().await.insert(path.to_string(), contents);
        Ok(())
    }

    async fn get(&self, path: &str) -> PortResult<Bytes> {
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("No stored file at '{}'", path)))
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        self.blobs.write().await.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_storage_round_trips_under_base_path() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path());
        storage
            .put("abc/input", Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();
        assert!(dir.path().join("abc/input").exists());
        assert_eq!(storage.get("abc/input").await.unwrap(), Bytes::from_static(b"%PDF-1.4"));

        storage.delete("abc/input").await.unwrap();
        assert!(matches!(storage.get("abc/input").await, Err(PortError::NotFound(_))));
        storage.delete("abc/input").await.unwrap();
    }

    #[tokio::test]
    async fn local_storage_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDiskStorage::new(dir.path());
        for bad in ["../etc/passwd", "/abs/input", ""] {
            assert!(matches!(
                storage.put(bad, Bytes::new()).await,
                Err(PortError::Storage(_))
            ));
        }
    }

    #[tokio::test]
    async fn memory_storage_round_trips() {
        let storage = MemoryStorage::new();
        storage.put("id/input", Bytes::from_static(b"cv")).await.unwrap();
        assert_eq!(storage.get("id/input").await.unwrap(), Bytes::from_static(b"cv"));
        storage.delete("id/input").await.unwrap();
        assert!(storage.get("id/input").await.is_err());
    }
}
