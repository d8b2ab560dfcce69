use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use corral::{Backend, CacheError, CacheResult};
use redis::{AsyncCommands, Client, SetExpiry, SetOptions, aio::ConnectionManager};
use sha1::{Digest, Sha1};
use tokio::sync::OnceCell;
use tracing::trace;

use crate::error::Error;

/// Redis refuses keys above a practical length in some managed setups, so
/// anything longer gets rewritten to a truncated prefix plus a hash.
const MAX_KEY_LENGTH: usize = 250;

/// Hex-encoded SHA-1 is 40 characters, leaving this much room for the
/// readable prefix of a rewritten key.
const KEY_PREFIX_LENGTH: usize = MAX_KEY_LENGTH - 40;

/// Redis cache backend based on the redis-rs crate.
///
/// Uses a lazily initialized [`ConnectionManager`] for asynchronous
/// network interaction; the first operation establishes the connection.
///
/// [`ConnectionManager`]: redis::aio::ConnectionManager
#[derive(Clone)]
pub struct RedisBackend {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisBackend {
    /// Create a new backend instance with default settings.
    ///
    /// # Examples
    /// ```no_run
    /// use corral_redis::RedisBackend;
    ///
    /// let backend = RedisBackend::new().unwrap();
    /// ```
    pub fn new() -> Result<Self, Error> {
        Self::builder().build()
    }

    /// Creates a new RedisBackend builder with default settings.
    #[must_use]
    pub fn builder() -> RedisBackendBuilder {
        RedisBackendBuilder::default()
    }

    /// Create lazy connection to redis via [`ConnectionManager`].
    async fn connection(&self) -> Result<&ConnectionManager, Error> {
        trace!("get connection manager");
        let manager = self
            .connection
            .get_or_try_init(|| {
                trace!("initialize new redis connection manager");
                self.client.get_connection_manager()
            })
            .await?;
        Ok(manager)
    }
}

/// Rewrite keys that exceed [`MAX_KEY_LENGTH`]: keep a readable prefix
/// and replace the rest with the hex SHA-1 of the whole key, so distinct
/// long keys cannot collide after truncation.
fn build_key(key: &str) -> String {
    if key.len() <= MAX_KEY_LENGTH {
        return key.to_owned();
    }
    let mut keep = KEY_PREFIX_LENGTH;
    while !key.is_char_boundary(keep) {
        keep -= 1;
    }
    format!("{}{}", &key[..keep], hex::encode(Sha1::digest(key)))
}

/// Part of builder pattern implementation for RedisBackend.
pub struct RedisBackendBuilder {
    connection_info: String,
}

impl Default for RedisBackendBuilder {
    fn default() -> Self {
        Self {
            connection_info: "redis://127.0.0.1/".to_owned(),
        }
    }
}

impl RedisBackendBuilder {
    /// Set connection info (host, port, database, etc.) for RedisBackend.
    pub fn server(mut self, connection_info: impl Into<String>) -> Self {
        self.connection_info = connection_info.into();
        self
    }

    /// Create a new instance of the Redis backend with the passed settings.
    pub fn build(self) -> Result<RedisBackend, Error> {
        Ok(RedisBackend {
            client: Client::open(self.connection_info)?,
            connection: OnceCell::new(),
        })
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn read(&self, key: &str) -> CacheResult<Bytes> {
        let mut con = self.connection().await?.clone();
        let value: Option<Vec<u8>> = con.get(build_key(key)).await.map_err(Error::from)?;
        match value {
            Some(value) => Ok(Bytes::from(value)),
            None => Err(CacheError::Miss),
        }
    }

    async fn write(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        let mut con = self.connection().await?.clone();
        let options = SetOptions::default().with_expiration(SetExpiry::PX(ttl.as_millis() as u64));
        let _: () = con
            .set_options(build_key(key), payload.as_ref(), options)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn write_nx(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        let mut con = self.connection().await?.clone();
        let options = SetOptions::default()
            .conditional_set(redis::ExistenceCheck::NX)
            .with_expiration(SetExpiry::PX(ttl.as_millis() as u64));
        // A nil reply means the key already existed and nothing was set.
        let reply: Option<String> = con
            .set_options(build_key(key), payload.as_ref(), options)
            .await
            .map_err(Error::from)?;
        match reply {
            Some(_) => Ok(()),
            None => Err(CacheError::Conflict),
        }
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        let mut con = self.connection().await?.clone();
        let deleted: i64 = con.del(build_key(key)).await.map_err(Error::from)?;
        if deleted == 0 {
            return Err(CacheError::Miss);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}
