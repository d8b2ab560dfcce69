//! Redis backend for the corral caching contract.
//!
//! Entries are plain string keys with millisecond expiry; `write_nx`
//! maps to `SET .. NX`, whose atomicity Redis guarantees server-side, so
//! this backend is safe for concurrent callers across processes. Keys
//! longer than Redis's practical limit are rewritten to a truncated
//! prefix plus a SHA-1 suffix.

mod backend;
mod error;

pub use backend::{RedisBackend, RedisBackendBuilder};
pub use error::Error;
