//! Error taxonomy for cache operations.

use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type shared by all cache backends and decorators.
///
/// The taxonomy is deliberately small and closed. `Miss` and `Conflict`
/// are ordinary contract outcomes; `Malformed` is reserved strictly for
/// encode/decode failures, so callers can tell "the data is unreadable"
/// apart from "the data does not exist".
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is not in use: never written, expired, or deleted.
    #[error("cache miss")]
    Miss,

    /// A conditional write lost against an existing live entry.
    #[error("conflict")]
    Conflict,

    /// A stored payload or envelope could not be encoded or decoded.
    #[error("malformed cache entry")]
    Malformed(#[source] BoxError),

    /// Backend or infrastructure failure: unwritable disk, cipher setup,
    /// remote store errors. Never retried internally.
    #[error("internal cache error")]
    Internal(#[source] BoxError),
}

impl CacheError {
    pub fn malformed(cause: impl Into<BoxError>) -> Self {
        CacheError::Malformed(cause.into())
    }

    pub fn internal(cause: impl Into<BoxError>) -> Self {
        CacheError::Internal(cause.into())
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CacheError::Conflict)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, CacheError::Malformed(_))
    }
}
