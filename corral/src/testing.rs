//! Shared contract test suite for backend implementations.
//!
//! Every backend crate runs [`run_cache_contract_suite`] against a fresh
//! instance from its integration tests, so all implementations are held
//! to the same semantics. Enabled through the `test-helpers` feature.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{Cache, CacheError, CacheResult, Cacheable};

/// Exercise the full cache contract against the given backend.
///
/// Panics on the first violation. The suite sleeps past a one second TTL
/// to verify expiration, so expect it to take a little over a second.
pub async fn run_cache_contract_suite<C: Cache>(cache: &C) {
    simple_codec_round_trip(cache).await;
    custom_codec_round_trip(cache).await;
    basic_operations(cache).await;
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Plain {
    a: String,
    b: i64,
}

impl Cacheable for Plain {}

/// Same shape as [`Plain`] but with a hand-rolled tab-separated codec,
/// verifying that a codec override takes precedence over JSON.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct TabSeparated {
    a: String,
    b: i64,
}

impl Cacheable for TabSeparated {
    fn encode(&self) -> CacheResult<Bytes> {
        Ok(Bytes::from(format!("{}\t{}", self.b, self.a)))
    }

    fn decode(raw: &[u8]) -> CacheResult<Self> {
        let text = std::str::from_utf8(raw).map_err(|err| CacheError::malformed(err))?;
        let (b, a) = text
            .split_once('\t')
            .ok_or_else(|| CacheError::malformed("missing tab separator"))?;
        Ok(TabSeparated {
            a: a.to_owned(),
            b: b.parse().map_err(|err| CacheError::malformed(err))?,
        })
    }
}

async fn simple_codec_round_trip<C: Cache>(cache: &C) {
    let item = Plain {
        a: "foo".to_owned(),
        b: 42,
    };
    cache
        .set("simple-codec", &item, Duration::from_secs(60))
        .await
        .expect("cannot set item");
    let got: Plain = cache.get("simple-codec").await.expect("cannot get item");
    assert_eq!(got, item);
}

async fn custom_codec_round_trip<C: Cache>(cache: &C) {
    let item = TabSeparated {
        a: "foo".to_owned(),
        b: 42,
    };

    // The codec itself must round-trip before involving the backend.
    let raw = item.encode().expect("faulty encode implementation");
    assert_eq!(raw.as_ref(), b"42\tfoo");
    assert_eq!(
        TabSeparated::decode(&raw).expect("faulty decode implementation"),
        item
    );

    cache
        .set("custom-codec", &item, Duration::from_secs(60))
        .await
        .expect("cannot set item");
    let got: TabSeparated = cache.get("custom-codec").await.expect("cannot get item");
    assert_eq!(got, item);
}

async fn basic_operations<C: Cache>(cache: &C) {
    // Set, get, and a conflicting conditional write that must leave the
    // original value untouched.
    cache
        .set("key-1", &"abc".to_owned(), Duration::from_secs(1))
        .await
        .expect("cannot set");
    let val: String = cache.get("key-1").await.expect("cannot get");
    assert_eq!(val, "abc");
    let err = cache
        .set_nx("key-1", &"ABC".to_owned(), Duration::from_secs(10))
        .await
        .expect_err("set_nx on a live key must fail");
    assert!(err.is_conflict(), "want conflict, got {err:?}");
    let val: String = cache.get("key-1").await.expect("cannot get");
    assert_eq!(val, "abc");

    // Wait for a value to expire and ensure it is gone.
    cache
        .set("key-exp", &"abc".to_owned(), Duration::from_secs(1))
        .await
        .expect("cannot set");
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let err = cache
        .get::<String>("key-exp")
        .await
        .expect_err("expired key must miss");
    assert!(err.is_miss(), "want miss, got {err:?}");

    // Deleting a key works exactly once.
    cache
        .set("key-2", &"123".to_owned(), Duration::from_secs(3600))
        .await
        .expect("cannot set");
    cache.del("key-2").await.expect("cannot delete");
    let err = cache
        .get::<String>("key-2")
        .await
        .expect_err("deleted key must miss");
    assert!(err.is_miss(), "want miss, got {err:?}");
    let err = cache
        .del("key-does-not-exist")
        .await
        .expect_err("deleting an unused key must fail");
    assert!(err.is_miss(), "want miss, got {err:?}");

    // Very long keys behave like short ones.
    let very_long_key = "very-long-key".repeat(1000);
    cache
        .set(&very_long_key, &"123".to_owned(), Duration::from_secs(3600))
        .await
        .expect("cannot set");
    let val: String = cache.get(&very_long_key).await.expect("cannot get");
    assert_eq!(val, "123");
}
