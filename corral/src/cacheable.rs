//! Serialization boundary between typed values and stored payloads.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::{CacheError, CacheResult};

/// A value that can be stored in a cache.
///
/// The provided methods encode through JSON, which is the default for
/// any type that derives serde traits:
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use corral::Cacheable;
///
/// #[derive(Serialize, Deserialize)]
/// struct Session {
///     user_id: u64,
/// }
///
/// impl Cacheable for Session {}
/// ```
///
/// A type may instead supply its own binary representation by overriding
/// both `encode` and `decode`; the override then takes precedence over
/// JSON in both directions. Failures of either kind are
/// [`CacheError::Malformed`].
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync {
    fn encode(&self) -> CacheResult<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|err| CacheError::malformed(err))
    }

    fn decode(raw: &[u8]) -> CacheResult<Self> {
        serde_json::from_slice(raw).map_err(|err| CacheError::malformed(err))
    }
}

macro_rules! impl_cacheable {
    ($($ty:ty),* $(,)?) => {
        $(impl Cacheable for $ty {})*
    };
}

impl_cacheable!(String, bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);
