//! Filesystem backend for the corral caching contract.
//!
//! Keys map to files through a SHA-1 digest, which bounds filename
//! length and keeps path-traversal characters out of the cache
//! directory. Each file holds a [`corral::Envelope`]: the absolute
//! expiration in unix nanoseconds, a newline, then the raw payload.

mod backend;

pub use backend::FilesystemBackend;
