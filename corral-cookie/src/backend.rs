use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use cookie::{Cookie, time::OffsetDateTime};
use corral::{Backend, CacheError, CacheResult};
use http::{HeaderMap, HeaderValue, header};
use parking_lot::Mutex;
use tracing::trace;

use crate::crypto::CipherKey;

/// Length of the little-endian unix-seconds expiration embedded at the
/// end of every token plaintext.
const EXPIRY_SIZE: usize = 4;

/// Unbound cookie cache: cipher key and cookie-name prefix.
///
/// Holds no per-request state; [`bind`] it to one request/response
/// exchange to obtain a usable [`BoundCookieCache`].
///
/// [`bind`]: CookieCache::bind
#[derive(Clone)]
pub struct CookieCache {
    prefix: String,
    key: CipherKey,
}

impl CookieCache {
    /// Create an unbound cache. The secret is truncated to the largest
    /// supported AES key length (32, 24, or 16 bytes); anything shorter
    /// than 16 bytes fails with an internal error.
    pub fn new(prefix: impl Into<String>, secret: &[u8]) -> CacheResult<Self> {
        Ok(CookieCache {
            prefix: prefix.into(),
            key: CipherKey::from_secret(secret)?,
        })
    }

    /// Bind to one exchange, parsing the inbound `Cookie` headers once.
    /// The returned instance is valid for that exchange only and must
    /// not outlive it.
    pub fn bind(&self, request_headers: &HeaderMap) -> BoundCookieCache {
        let mut inbound = HashMap::new();
        for value in request_headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            for cookie in Cookie::split_parse(raw.to_owned()).flatten() {
                inbound.insert(cookie.name().to_owned(), cookie.value().to_owned());
            }
        }
        BoundCookieCache {
            prefix: self.prefix.clone(),
            key: self.key.clone(),
            inbound,
            state: Mutex::new(ExchangeState::default()),
        }
    }
}

/// Cookie cache bound to a single request/response exchange.
///
/// Writes queue response cookies internally; call [`write_response`]
/// once the handler is done to emit them as `Set-Cookie` headers. A
/// staging map mirrors values written during this exchange, because a
/// cookie set on the response is not visible on the inbound request that
/// is already in flight.
///
/// [`write_response`]: BoundCookieCache::write_response
pub struct BoundCookieCache {
    prefix: String,
    key: CipherKey,
    inbound: HashMap<String, String>,
    state: Mutex<ExchangeState>,
}

#[derive(Default)]
struct ExchangeState {
    staged: HashMap<String, StagedEntry>,
    outbound: Vec<Cookie<'static>>,
}

struct StagedEntry {
    payload: Bytes,
    valid_until: DateTime<Utc>,
}

impl BoundCookieCache {
    /// Append the queued `Set-Cookie` headers to the response.
    pub fn write_response(&self, response_headers: &mut HeaderMap) -> CacheResult<()> {
        for cookie in &self.state.lock().outbound {
            let value = HeaderValue::from_str(&cookie.to_string())
                .map_err(|err| CacheError::internal(err))?;
            response_headers.append(header::SET_COOKIE, value);
        }
        Ok(())
    }

    fn cookie_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Unstage the key and, if an inbound cookie carries it, queue a
    /// cookie that expires immediately. Reports whether either existed.
    fn purge(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        let mut existed = state.staged.remove(key).is_some();

        let name = self.cookie_name(key);
        if self.inbound.contains_key(&name) {
            let mut removal = Cookie::new(name, "");
            removal.set_path("/");
            removal.make_removal();
            state.outbound.push(removal);
            existed = true;
        }
        existed
    }

    fn store(&self, key: &str, payload: Bytes, ttl: Duration) {
        let expires_at = Utc::now() + ttl;

        let mut plaintext = payload.to_vec();
        plaintext.extend_from_slice(&(expires_at.timestamp() as u32).to_le_bytes());
        let token = self.key.encrypt(&plaintext);

        let mut cookie = Cookie::new(self.cookie_name(key), token);
        cookie.set_path("/");
        cookie.set_http_only(true);
        if let Ok(expires) = OffsetDateTime::from_unix_timestamp(expires_at.timestamp()) {
            cookie.set_expires(expires);
        }

        let mut state = self.state.lock();
        state.outbound.push(cookie);
        if !ttl.is_zero() {
            // Mirror the plaintext so reads within this same exchange
            // succeed before the client ever echoes the cookie back.
            state.staged.insert(
                key.to_owned(),
                StagedEntry {
                    payload,
                    valid_until: expires_at,
                },
            );
        }
    }
}

#[async_trait]
impl Backend for BoundCookieCache {
    async fn read(&self, key: &str) -> CacheResult<Bytes> {
        let now = Utc::now();

        {
            let mut state = self.state.lock();
            match state.staged.get(key) {
                Some(entry) if entry.valid_until > now => return Ok(entry.payload.clone()),
                Some(_) => {
                    state.staged.remove(key);
                }
                None => {}
            }
        }

        let name = self.cookie_name(key);
        let token = self.inbound.get(&name).ok_or(CacheError::Miss)?;

        // A token that cannot be decoded or decrypted is treated as an
        // ordinary miss: the client may have tampered with it, and no
        // caller can react to the details anyway.
        let plaintext = match self.key.decrypt(token) {
            Some(plaintext) if plaintext.len() >= EXPIRY_SIZE => plaintext,
            _ => {
                trace!(key, "rejecting undecodable cookie token");
                return Err(CacheError::Miss);
            }
        };

        let (payload, tail) = plaintext.split_at(plaintext.len() - EXPIRY_SIZE);
        let mut raw_expiry = [0u8; EXPIRY_SIZE];
        raw_expiry.copy_from_slice(tail);
        let expires_at = DateTime::from_timestamp(u32::from_le_bytes(raw_expiry) as i64, 0)
            .ok_or(CacheError::Miss)?;
        if expires_at <= now {
            self.purge(key);
            return Err(CacheError::Miss);
        }

        Ok(Bytes::copy_from_slice(payload))
    }

    async fn write(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        trace!(key, ?ttl, "cookie cache set");
        self.store(key, payload, ttl);
        Ok(())
    }

    async fn write_nx(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheResult<()> {
        if self.state.lock().staged.contains_key(key) {
            return Err(CacheError::Conflict);
        }
        if self.inbound.contains_key(&self.cookie_name(key)) {
            // TODO: check that the inbound token is not already expired
            // before treating its presence as a conflict.
            return Err(CacheError::Conflict);
        }
        self.store(key, payload, ttl);
        Ok(())
    }

    /// Delete the staged entry and expire the client's cookie.
    ///
    /// Deletion cannot retroactively hide the key from the current
    /// inbound request: a read right after a delete within the same
    /// exchange may still observe the pre-deletion value through the
    /// request's cookies. That is inherent to the one-exchange model.
    async fn remove(&self, key: &str) -> CacheResult<()> {
        trace!(key, "cookie cache del");
        if self.purge(key) {
            Ok(())
        } else {
            Err(CacheError::Miss)
        }
    }

    fn name(&self) -> &str {
        "cookie"
    }
}
