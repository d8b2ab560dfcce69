//! Timestamped payload envelope.
//!
//! One payload stamped with one absolute instant, persisted as
//! `<ascii decimal unix nanoseconds>\n<raw payload bytes>`. What the
//! instant means is up to the producer: the filesystem backend stores
//! the hard expiration, the stampede guard stores the soft-refresh
//! point.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{CacheError, CacheResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub timestamp: DateTime<Utc>,
    pub payload: Bytes,
}

impl Envelope {
    pub fn new(timestamp: DateTime<Utc>, payload: Bytes) -> Self {
        Envelope { timestamp, payload }
    }

    pub fn encode(&self) -> CacheResult<Bytes> {
        let nanos = self
            .timestamp
            .timestamp_nanos_opt()
            .ok_or_else(|| CacheError::internal("timestamp out of range"))?;
        let mut raw = format!("{nanos}\n").into_bytes();
        raw.extend_from_slice(&self.payload);
        Ok(Bytes::from(raw))
    }

    pub fn decode(raw: &[u8]) -> CacheResult<Self> {
        let separator = raw
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| CacheError::malformed("missing timestamp separator"))?;
        let nanos: i64 = std::str::from_utf8(&raw[..separator])
            .map_err(|err| CacheError::malformed(err))?
            .parse()
            .map_err(|err| CacheError::malformed(err))?;
        Ok(Envelope {
            timestamp: DateTime::from_timestamp_nanos(nanos),
            payload: Bytes::copy_from_slice(&raw[separator + 1..]),
        })
    }

    /// True once the embedded instant has passed.
    pub fn is_past(&self) -> bool {
        self.timestamp <= Utc::now()
    }
}
