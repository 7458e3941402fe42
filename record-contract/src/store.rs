//! Key-value blob storage behind the record adapter.
//!
//! Keys are flat file names (`alice.log`). Two backends are provided:
//!
//! - [`FileStore`] keeps one file per key under a data directory.
//! - [`MemoryStore`] keeps everything in a map, for tests and throwaway nodes.

use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no entry stored under {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Capability set the record adapter needs from durable storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stores `data` under `key`, replacing whatever was there.
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError>;

    /// Returns `None` if nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Removes `key`. Fails with [`StoreError::NotFound`] if it is absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        (**self).put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

/// One file per key, directly under `base_dir`.
///
/// Writes go to `<key>.tmp` first and are renamed into place, so a reader
/// never sees a half-written record.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp_path = self.path_for(&format!("{key}.tmp"));

        tokio::fs::write(&tmp_path, &data).await?;
        if let Err(err) = tokio::fs::rename(&tmp_path, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                warn!(key, error = %cleanup, "failed to remove temporary record file");
            }
            return Err(StoreError::Io(err));
        }

        debug!(key, path = %path.display(), size = data.len(), "wrote record file");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!(key, "deleted record file");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}

/// In-memory store. `BTreeMap` keeps [`MemoryStore::keys`] in a stable order.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        debug!(key, size = data.len(), "storing record in memory");
        self.entries.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entries.lock().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }
}
