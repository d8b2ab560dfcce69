//! Expiration-aware key/value caching with pluggable backends.
//!
//! Every backend implements the [`Backend`] trait, a four-operation
//! contract over opaque byte payloads. The typed [`Cache`] layer sits on
//! top of it and handles serialization through [`Cacheable`]. Backends
//! compose: [`StampedeGuard`] wraps any backend and adds single-flight
//! recompute coordination without changing the contract.
//!
//! Cancellation is the ordinary async kind: every operation suspends at
//! `.await` points, so dropping the future (or racing it against
//! `tokio::time::timeout`) aborts the call, including the guard's retry
//! loop.

mod backend;
mod cacheable;
mod envelope;
mod error;
mod memory;
mod stampede;
#[cfg(feature = "test-helpers")]
pub mod testing;

pub use backend::{Backend, Cache};
pub use cacheable::Cacheable;
pub use envelope::Envelope;
pub use error::{CacheError, CacheResult};
pub use memory::InMemoryBackend;
pub use stampede::StampedeGuard;
