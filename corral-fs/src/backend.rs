use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use corral::{Backend, CacheError, CacheResult, Envelope};
use sha1::{Digest, Sha1};
use tokio::sync::RwLock;
use tracing::trace;

/// Cache backend storing one file per key under a root directory.
///
/// Durability is best effort: a write that fails midway leaves no entry
/// behind, and lazy deletion of expired files may be lost under races.
/// `write_nx` is made atomic by a process-local read-write lock, so the
/// backend is safe for one process's concurrent callers but not for
/// multiple independent processes sharing the directory. Reads and
/// unconditional writes only take the read side; the lazy delete of an
/// expired file they may perform is safe to run concurrently.
#[derive(Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
    lock: RwLock<()>,
}

impl FilesystemBackend {
    /// Open a backend rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|err| CacheError::internal(err))?;
        Ok(FilesystemBackend {
            root,
            lock: RwLock::new(()),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha1::digest(key.as_bytes());
        self.root.join(hex::encode(digest))
    }

    /// Read and decode the entry, treating absent and expired files as a
    /// miss. Expired files are deleted best effort.
    async fn live_entry(&self, path: &Path) -> CacheResult<Envelope> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(_) => return Err(CacheError::Miss),
        };
        let envelope = Envelope::decode(&raw)?;
        if envelope.is_past() {
            trace!(?path, "removing expired cache file");
            let _ = tokio::fs::remove_file(path).await;
            return Err(CacheError::Miss);
        }
        Ok(envelope)
    }

    async fn write_entry(&self, path: &Path, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        let envelope = Envelope::new(Utc::now() + ttl, payload);
        if let Err(err) = tokio::fs::write(path, envelope.encode()?).await {
            // Do not leave a truncated entry behind.
            let _ = tokio::fs::remove_file(path).await;
            return Err(CacheError::internal(err));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for FilesystemBackend {
    async fn read(&self, key: &str) -> CacheResult<Bytes> {
        let _guard = self.lock.read().await;
        let envelope = self.live_entry(&self.entry_path(key)).await?;
        Ok(envelope.payload)
    }

    async fn write(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        let _guard = self.lock.read().await;
        self.write_entry(&self.entry_path(key), payload, ttl).await
    }

    async fn write_nx(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        let _guard = self.lock.write().await;
        let path = self.entry_path(key);
        match self.live_entry(&path).await {
            Ok(_) => Err(CacheError::Conflict),
            Err(CacheError::Miss) => self.write_entry(&path, payload, ttl).await,
            Err(err) => Err(err),
        }
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        let _guard = self.lock.write().await;
        let path = self.entry_path(key);
        self.live_entry(&path).await?;
        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}
