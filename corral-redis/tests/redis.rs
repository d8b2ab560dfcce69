use corral::testing::run_cache_contract_suite;
use corral_redis::RedisBackend;

/// Run against the instance named in `REDIS_URL`, or a local default.
fn new_backend() -> RedisBackend {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_owned());
    RedisBackend::builder()
        .server(url)
        .build()
        .expect("cannot build redis backend")
}

#[tokio::test]
#[ignore = "requires a running redis server"]
async fn redis_backend_contract() {
    run_cache_contract_suite(&new_backend()).await;
}
