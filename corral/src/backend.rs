use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{CacheResult, Cacheable};

/// Storage contract implemented by every cache backend.
///
/// Operates on opaque byte payloads; backends never inspect payload
/// contents. Keys are arbitrary strings — a backend with key constraints
/// (filenames, remote key length limits) rewrites them internally.
///
/// `write_nx` must be atomic with respect to concurrent `write_nx` calls
/// on the same key from other callers of the same backend instance. It
/// is the election primitive [`StampedeGuard`] builds on.
///
/// [`StampedeGuard`]: crate::StampedeGuard
#[async_trait]
pub trait Backend: Send + Sync {
    /// Read the payload stored under `key`. Fails with
    /// [`CacheError::Miss`] if the key is unused or its entry expired.
    ///
    /// [`CacheError::Miss`]: crate::CacheError::Miss
    async fn read(&self, key: &str) -> CacheResult<Bytes>;

    /// Store `payload` under `key` with the given time-to-live,
    /// overwriting any previous entry and its expiration.
    async fn write(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()>;

    /// Store `payload` only if `key` is not in use (absent or expired).
    /// Fails with [`CacheError::Conflict`] if a live entry exists.
    ///
    /// [`CacheError::Conflict`]: crate::CacheError::Conflict
    async fn write_nx(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()>;

    /// Delete the entry under `key`. Fails with [`CacheError::Miss`] if
    /// the key was not in use.
    ///
    /// [`CacheError::Miss`]: crate::CacheError::Miss
    async fn remove(&self, key: &str) -> CacheResult<()>;

    /// Name of this backend, for log attribution.
    fn name(&self) -> &str {
        "backend"
    }
}

#[async_trait]
impl Backend for Box<dyn Backend> {
    async fn read(&self, key: &str) -> CacheResult<Bytes> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        (**self).write(key, payload, ttl).await
    }

    async fn write_nx(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        (**self).write_nx(key, payload, ttl).await
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        (**self).remove(key).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl Backend for Arc<dyn Backend> {
    async fn read(&self, key: &str) -> CacheResult<Bytes> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        (**self).write(key, payload, ttl).await
    }

    async fn write_nx(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        (**self).write_nx(key, payload, ttl).await
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        (**self).remove(key).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Typed cache operations layered over any [`Backend`].
///
/// Serialization goes through [`Cacheable`]: the value's own codec if it
/// overrides one, JSON otherwise. This is the interface application code
/// depends on; a `Miss` from `get` means the caller may be the one to
/// compute and `set` the key.
pub trait Cache: Backend {
    fn get<T>(&self, key: &str) -> impl Future<Output = CacheResult<T>> + Send
    where
        T: Cacheable,
    {
        async move {
            let raw = self.read(key).await?;
            T::decode(&raw)
        }
    }

    fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> impl Future<Output = CacheResult<()>> + Send
    where
        T: Cacheable,
    {
        async move {
            let raw = value.encode()?;
            self.write(key, raw, ttl).await
        }
    }

    fn set_nx<T>(&self, key: &str, value: &T, ttl: Duration) -> impl Future<Output = CacheResult<()>> + Send
    where
        T: Cacheable,
    {
        async move {
            let raw = value.encode()?;
            self.write_nx(key, raw, ttl).await
        }
    }

    fn del(&self, key: &str) -> impl Future<Output = CacheResult<()>> + Send {
        async move { self.remove(key).await }
    }
}

impl<B> Cache for B where B: Backend + ?Sized {}
