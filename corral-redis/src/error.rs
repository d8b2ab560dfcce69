use corral::CacheError;
use redis::RedisError;

/// Error type for Redis backend operations.
///
/// Wraps errors from the underlying [`redis`] crate; converted to
/// [`CacheError::Internal`] when propagated through the cache contract.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client: connection failures,
    /// protocol errors, command execution errors.
    #[error("redis backend error: {0}")]
    Redis(#[from] RedisError),
}

impl From<Error> for CacheError {
    fn from(error: Error) -> Self {
        CacheError::internal(error)
    }
}
