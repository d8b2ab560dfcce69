//! Process-local in-memory backend.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{Backend, CacheError, CacheResult};

/// In-memory cache backend: one mapping behind one mutex.
///
/// The reference implementation of the contract and the substrate most
/// tests run against. Growth is unbounded and there is no eviction
/// beyond explicit [`remove`] and lazy expiry-on-read, so it is not
/// meant as a production store.
///
/// [`remove`]: Backend::remove
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

#[derive(Debug)]
struct Entry {
    payload: Bytes,
    expires_at: DateTime<Utc>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry.
    pub async fn flush(&self) {
        self.entries.lock().await.clear();
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn read(&self, key: &str) -> CacheResult<Bytes> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(key) {
            if entry.expires_at > Utc::now() {
                return Ok(entry.payload.clone());
            }
            entries.remove(key);
        }
        Err(CacheError::Miss)
    }

    async fn write(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        let entry = Entry {
            payload,
            expires_at: Utc::now() + ttl,
        };
        self.entries.lock().await.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn write_nx(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        let mut entries = self.entries.lock().await;
        let now = Utc::now();
        if let Some(entry) = entries.get(key) {
            if entry.expires_at > now {
                return Err(CacheError::Conflict);
            }
        }
        entries.insert(
            key.to_owned(),
            Entry {
                payload,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.entries
            .lock()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or(CacheError::Miss)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_nx_replaces_expired_entry() {
        let backend = InMemoryBackend::new();
        backend
            .write("key", Bytes::from_static(b"old"), Duration::ZERO)
            .await
            .unwrap();

        backend
            .write_nx("key", Bytes::from_static(b"new"), Duration::from_secs(60))
            .await
            .expect("expired entry does not count as in use");

        assert_eq!(backend.read("key").await.unwrap().as_ref(), b"new");
    }

    #[tokio::test]
    async fn flush_empties_the_map() {
        let backend = InMemoryBackend::new();
        backend
            .write("key", Bytes::from_static(b"value"), Duration::from_secs(60))
            .await
            .unwrap();

        backend.flush().await;

        assert!(backend.read("key").await.unwrap_err().is_miss());
    }
}
