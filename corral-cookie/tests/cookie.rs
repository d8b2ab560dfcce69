use std::time::Duration;

use corral::{Cache, testing::run_cache_contract_suite};
use corral_cookie::CookieCache;
use http::{HeaderMap, HeaderValue, header};

fn new_cache() -> CookieCache {
    CookieCache::new("", b"super-secret-test-string").expect("cannot create cookie cache")
}

/// Convert the `Set-Cookie` headers of one exchange's response into the
/// `Cookie` header of the next exchange's request, the way a browser
/// would echo them back.
fn echo_cookies(response: &HeaderMap) -> HeaderMap {
    let mut request = HeaderMap::new();
    for set_cookie in response.get_all(header::SET_COOKIE) {
        let cookie = cookie::Cookie::parse(set_cookie.to_str().unwrap().to_owned())
            .expect("cannot parse response cookie");
        let pair = format!("{}={}", cookie.name(), cookie.value());
        request.append(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
    }
    request
}

#[tokio::test]
async fn cookie_backend_contract_within_one_exchange() {
    let request = HeaderMap::new();
    run_cache_contract_suite(&new_cache().bind(&request)).await;
}

#[tokio::test]
async fn value_survives_between_exchanges() {
    let cache = new_cache();

    let request1 = HeaderMap::new();
    let bound1 = cache.bind(&request1);
    bound1
        .set("key-abc", &"abc".to_owned(), Duration::from_secs(60))
        .await
        .expect("cannot set");
    let mut response1 = HeaderMap::new();
    bound1
        .write_response(&mut response1)
        .expect("cannot write response cookies");

    let bound2 = cache.bind(&echo_cookies(&response1));
    let value: String = bound2.get("key-abc").await.expect("cannot get");
    assert_eq!(value, "abc");
}

#[tokio::test]
async fn expired_inbound_token_is_a_miss() {
    let cache = new_cache();

    let bound1 = cache.bind(&HeaderMap::new());
    bound1
        .set("key-abc", &"abc".to_owned(), Duration::from_secs(1))
        .await
        .expect("cannot set");
    let mut response1 = HeaderMap::new();
    bound1.write_response(&mut response1).unwrap();

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let bound2 = cache.bind(&echo_cookies(&response1));
    let err = bound2
        .get::<String>("key-abc")
        .await
        .expect_err("expired token must miss");
    assert!(err.is_miss(), "want miss, got {err:?}");
}

#[tokio::test]
async fn tampered_token_is_a_miss_for_every_corrupted_byte() {
    use base64::{Engine, engine::general_purpose::URL_SAFE};

    let cache = new_cache();

    let bound1 = cache.bind(&HeaderMap::new());
    bound1
        .set("key-abc", &"abc".to_owned(), Duration::from_secs(60))
        .await
        .expect("cannot set");
    let mut response1 = HeaderMap::new();
    bound1.write_response(&mut response1).unwrap();

    let set_cookie = response1.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    let token = cookie::Cookie::parse(set_cookie.to_owned()).unwrap();
    let raw = URL_SAFE.decode(token.value()).unwrap();

    // Corrupt every byte of the IV and the encrypted payload. The last
    // four bytes are the encrypted expiry; CFB carries no authentication,
    // so flipping a bit there yields the intact payload under a shifted
    // expiry and is excluded here.
    for position in 0..raw.len() - 4 {
        let mut corrupted = raw.clone();
        corrupted[position] ^= 0x01;
        let pair = format!("key-abc={}", URL_SAFE.encode(&corrupted));

        let mut request2 = HeaderMap::new();
        request2.append(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
        let bound2 = cache.bind(&request2);

        match bound2.get::<String>("key-abc").await {
            // The garbled plaintext either fails the expiry check
            // (miss) or fails to decode (malformed). Both are fine;
            // a crash or the original value would not be.
            Err(err) => assert!(
                err.is_miss() || err.is_malformed(),
                "byte {position}: got {err:?}"
            ),
            Ok(value) => assert_ne!(value, "abc", "byte {position}"),
        }
    }
}

#[tokio::test]
async fn truncated_token_is_a_miss() {
    let cache = new_cache();

    let mut request = HeaderMap::new();
    request.append(header::COOKIE, HeaderValue::from_static("key-abc=c2hvcnQ="));
    let bound = cache.bind(&request);

    let err = bound
        .get::<String>("key-abc")
        .await
        .expect_err("truncated token must miss");
    assert!(err.is_miss(), "want miss, got {err:?}");
}

#[tokio::test]
async fn set_nx_conflicts_with_an_inbound_cookie() {
    let cache = new_cache();

    let bound1 = cache.bind(&HeaderMap::new());
    bound1
        .set("key-abc", &"abc".to_owned(), Duration::from_secs(60))
        .await
        .expect("cannot set");
    let mut response1 = HeaderMap::new();
    bound1.write_response(&mut response1).unwrap();

    let bound2 = cache.bind(&echo_cookies(&response1));
    let err = bound2
        .set_nx("key-abc", &"other".to_owned(), Duration::from_secs(60))
        .await
        .expect_err("inbound cookie must conflict");
    assert!(err.is_conflict(), "want conflict, got {err:?}");
}

#[tokio::test]
async fn del_expires_the_client_cookie() {
    let cache = new_cache();

    let bound1 = cache.bind(&HeaderMap::new());
    bound1
        .set("key-abc", &"abc".to_owned(), Duration::from_secs(60))
        .await
        .expect("cannot set");
    let mut response1 = HeaderMap::new();
    bound1.write_response(&mut response1).unwrap();

    let bound2 = cache.bind(&echo_cookies(&response1));
    bound2.del("key-abc").await.expect("cannot delete");

    let mut response2 = HeaderMap::new();
    bound2.write_response(&mut response2).unwrap();
    let removal = response2
        .get(header::SET_COOKIE)
        .expect("delete should queue a removal cookie")
        .to_str()
        .unwrap();
    assert!(
        removal.contains("Max-Age=0"),
        "removal cookie should expire immediately, got {removal:?}"
    );
}
