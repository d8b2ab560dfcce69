//! Stampede (thundering herd) protection decorator.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tracing::trace;

use crate::{Backend, CacheError, CacheResult, Envelope};

const LOCK_KEY_SUFFIX: &str = ":stampedelock";
const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(2);
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Wraps any [`Backend`] with recompute coordination.
///
/// Values are stored inside an [`Envelope`] whose timestamp is a
/// soft-refresh point strictly before the hard expiration. When a read
/// finds the entry soft-expired or missing, callers race a short-lived
/// lock marker (written through `write_nx`, the one atomic primitive the
/// contract guarantees) at `<key>:stampedelock`. The winner is told
/// `Miss` — it is elected to recompute and `set` the key. Losers are
/// served the stale-but-valid payload if one exists, or sleep briefly
/// and retry until the winner publishes.
///
/// The lock marker only dedupes the recomputation burst; its TTL stays
/// short no matter how long the real computation takes, which also caps
/// how long a crashed winner can block everyone else.
#[derive(Debug)]
pub struct StampedeGuard<B> {
    inner: B,
    lock_ttl: Duration,
    retry_interval: Duration,
}

impl<B> StampedeGuard<B> {
    pub fn new(inner: B) -> Self {
        StampedeGuard {
            inner,
            lock_ttl: DEFAULT_LOCK_TTL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    /// TTL of the lock marker entry.
    pub fn with_lock_ttl(mut self, lock_ttl: Duration) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }

    /// How long a non-elected caller sleeps before re-reading.
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }
}

impl<B: Backend> StampedeGuard<B> {
    /// Race the lock marker. `Ok(true)` means this caller won the
    /// recompute election.
    async fn try_lock(&self, lock_key: &str) -> CacheResult<bool> {
        match self
            .inner
            .write_nx(lock_key, Bytes::from_static(b"1"), self.lock_ttl)
            .await
        {
            Ok(()) => Ok(true),
            Err(CacheError::Conflict) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl<B: Backend> Backend for StampedeGuard<B> {
    async fn read(&self, key: &str) -> CacheResult<Bytes> {
        let lock_key = format!("{key}{LOCK_KEY_SUFFIX}");

        let envelope = loop {
            match self.inner.read(key).await {
                Ok(raw) => break Envelope::decode(&raw)?,
                Err(CacheError::Miss) => {
                    // Nothing cached. Whoever wins the lock is allowed to
                    // recompute; everyone else waits for the value to
                    // land and re-reads.
                    if self.try_lock(&lock_key).await? {
                        trace!(key, "elected to recompute missing entry");
                        return Err(CacheError::Miss);
                    }
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(err) => return Err(err),
            }
        };

        if envelope.is_past() {
            // Soft-expired: the payload is still valid, but it is time
            // to refresh. Elect one caller to do so; the rest keep
            // serving the stale payload.
            if self.try_lock(&lock_key).await? {
                trace!(key, "elected to refresh soft-expired entry");
                return Err(CacheError::Miss);
            }
        }

        Ok(envelope.payload)
    }

    async fn write(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        let envelope = Envelope::new(Utc::now() + ttl - refresh_margin(ttl), payload);
        self.inner.write(key, envelope.encode()?, ttl).await
    }

    async fn write_nx(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        let envelope = Envelope::new(Utc::now() + ttl - refresh_margin(ttl), payload);
        self.inner.write_nx(key, envelope.encode()?, ttl).await
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.inner.remove(key).await
    }

    fn name(&self) -> &str {
        "stampede"
    }
}

/// How far before the hard expiration the soft-refresh point sits.
///
/// Monotone step function of the TTL; never exceeds it. TTLs of five
/// seconds or less get no soft-refresh window at all, so recomputation
/// only triggers at hard expiry.
fn refresh_margin(ttl: Duration) -> Duration {
    if ttl > Duration::from_secs(10 * 60) {
        Duration::from_secs(60)
    } else if ttl > Duration::from_secs(60) {
        Duration::from_secs(10)
    } else if ttl > Duration::from_secs(30) {
        Duration::from_secs(3)
    } else if ttl > Duration::from_secs(10) {
        Duration::from_secs(1)
    } else if ttl > Duration::from_secs(5) {
        Duration::from_millis(500)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_margin_steps() {
        let cases = [
            (Duration::from_secs(3600), Duration::from_secs(60)),
            (Duration::from_secs(601), Duration::from_secs(60)),
            (Duration::from_secs(600), Duration::from_secs(10)),
            (Duration::from_secs(90), Duration::from_secs(10)),
            (Duration::from_secs(45), Duration::from_secs(3)),
            (Duration::from_secs(15), Duration::from_secs(1)),
            (Duration::from_secs(7), Duration::from_millis(500)),
            (Duration::from_secs(5), Duration::ZERO),
            (Duration::from_secs(1), Duration::ZERO),
            (Duration::ZERO, Duration::ZERO),
        ];
        for (ttl, want) in cases {
            assert_eq!(refresh_margin(ttl), want, "ttl {ttl:?}");
        }
    }

    #[test]
    fn refresh_margin_never_exceeds_ttl() {
        for secs in [0u64, 1, 5, 6, 10, 11, 30, 31, 60, 61, 600, 601] {
            let ttl = Duration::from_secs(secs);
            assert!(refresh_margin(ttl) <= ttl, "ttl {ttl:?}");
        }
    }
}
