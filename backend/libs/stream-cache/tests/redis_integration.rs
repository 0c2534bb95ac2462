//! Integration tests against a live Redis server.
//!
//! These tests require a running Redis instance.
//! Run with: cargo test --test redis_integration -- --ignored

use std::time::Duration;
use stream_cache::{BackendMode, CacheConfig, RateLimitConfig, StreamCache};

const REDIS_HOST: &str = "127.0.0.1";
const REDIS_PORT: u16 = 6379;

async fn connect() -> StreamCache {
    let config = CacheConfig::for_host(REDIS_HOST, REDIS_PORT);
    let cache = StreamCache::init(&config)
        .await
        .expect("Failed to initialize cache");
    assert_eq!(cache.mode(), BackendMode::Connected, "Redis not reachable");
    cache
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, rand_suffix())
}

fn rand_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_remote_round_trip_and_ping() {
    let cache = connect().await;
    let key = unique("it:roundtrip");

    assert!(cache.ping().await);
    assert!(cache.set(&key, &serde_json::json!({"a": 1}), 30).await);
    assert_eq!(
        cache.get::<serde_json::Value>(&key).await,
        Some(serde_json::json!({"a": 1}))
    );
    assert!(cache.delete(&key).await);
    assert!(!cache.delete(&key).await);

    cache.disconnect();
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_remote_ttl_expiry() {
    let cache = connect().await;
    let key = unique("it:ttl");

    assert!(cache.set(&key, &"short", 1).await);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(cache.get::<String>(&key).await, None);

    cache.disconnect();
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_remote_viewer_counter_floor() {
    let cache = connect().await;
    let stream = unique("it-stream");

    assert_eq!(cache.decrement_viewer_count(&stream).await, 0);
    assert_eq!(cache.decrement_viewer_count(&stream).await, 0);
    assert_eq!(cache.increment_viewer_count(&stream).await, 1);
    assert_eq!(cache.get_viewer_count(&stream).await, 1);
    assert!(cache.reset_viewer_count(&stream).await);

    cache.disconnect();
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_remote_rate_limit() {
    let cache = connect().await;
    let id = unique("it-client");
    let config = RateLimitConfig {
        max_requests: 3,
        window_seconds: 2,
    };

    let allowed: Vec<bool> = {
        let mut out = Vec::new();
        for _ in 0..4 {
            out.push(cache.check_rate_limit(&id, &config).await.allowed);
        }
        out
    };
    assert_eq!(allowed, vec![true, true, true, false]);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let decision = cache.check_rate_limit(&id, &config).await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 2);

    cache.disconnect();
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_disconnect_switches_to_fallback_without_migration() {
    let cache = connect().await;
    let key = unique("it:failover");

    assert!(cache.set(&key, &"in-redis", 30).await);
    assert!(cache.ping().await);

    cache.disconnect();
    assert_eq!(cache.mode(), BackendMode::Closed);
    assert!(cache.ping().await);
    assert_eq!(cache.get::<String>(&key).await, None);
}
