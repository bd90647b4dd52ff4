//! Redis backend tests for the quota counter and the result record store.
//!
//! # Requirements
//!
//! A Redis server must be reachable. The URL defaults to
//! `redis://127.0.0.1:6379` and can be overridden:
//!
//! ```bash
//! docker run --rm -p 6379:6379 redis:7
//! export FESTIVE_TEST_REDIS_URL=redis://127.0.0.1:6379
//! ```
//!
//! # Running the tests
//!
//! ```bash
//! cargo test --test integration redis -- --ignored
//! ```
//!
//! These tests are marked as `#[ignore]` by default because they require an
//! external service.

use std::env;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redis::aio::ConnectionManager;

use festive_photo::{QuotaCounter, RecordStore, RedisQuotaCounter, RedisRecordStore};

/// Environment variable overriding the Redis URL
const REDIS_URL_ENV: &str = "FESTIVE_TEST_REDIS_URL";

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

async fn connect() -> ConnectionManager {
    let url = env::var(REDIS_URL_ENV).unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());
    let client = redis::Client::open(url.as_str()).unwrap();
    ConnectionManager::new(client)
        .await
        .unwrap_or_else(|e| panic!("Redis not reachable at {}: {}", url, e))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// A key no earlier run has touched.
fn fresh_key(name: &str) -> String {
    format!("festive-test:{}:{}", name, now_millis())
}

// =============================================================================
// Quota Counter
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_redis_concurrent_consume_admits_exactly_limit() {
    let counter = RedisQuotaCounter::new(connect().await);
    let key = fresh_key("concurrent");
    let expires_at = now_millis() + 60_000;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let counter = counter.clone();
            let key = key.clone();
            tokio::spawn(async move { counter.try_consume(&key, 2, expires_at).await })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_some() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 2);
    assert_eq!(counter.used(&key).await.unwrap(), 2);
}

#[tokio::test]
#[ignore]
async fn test_redis_rejected_consume_leaves_count() {
    let counter = RedisQuotaCounter::new(connect().await);
    let key = fresh_key("rejected");
    let expires_at = now_millis() + 60_000;

    assert_eq!(counter.try_consume(&key, 1, expires_at).await.unwrap(), Some(1));
    assert_eq!(counter.try_consume(&key, 1, expires_at).await.unwrap(), None);
    assert_eq!(counter.try_consume(&key, 1, expires_at).await.unwrap(), None);
    assert_eq!(counter.used(&key).await.unwrap(), 1);
}

#[tokio::test]
#[ignore]
async fn test_redis_counter_expires_at_window_end() {
    let mut conn = connect().await;
    let counter = RedisQuotaCounter::new(conn.clone());
    let key = fresh_key("expiry");
    let expires_at = now_millis() + 60_000;

    counter.try_consume(&key, 2, expires_at).await.unwrap();

    let ttl: i64 = redis::cmd("PTTL")
        .arg(&key)
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(ttl > 0 && ttl <= 60_000, "unexpected PTTL {}", ttl);

    let short_key = fresh_key("expiry-short");
    counter
        .try_consume(&short_key, 2, now_millis() + 300)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(counter.used(&short_key).await.unwrap(), 0);
    assert_eq!(
        counter
            .try_consume(&short_key, 2, now_millis() + 60_000)
            .await
            .unwrap(),
        Some(1)
    );
}

#[tokio::test]
#[ignore]
async fn test_redis_unknown_key_is_unused() {
    let counter = RedisQuotaCounter::new(connect().await);
    assert_eq!(counter.used(&fresh_key("unknown")).await.unwrap(), 0);
}

// =============================================================================
// Record Store
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_redis_insert_new_refuses_existing_key() {
    let records = RedisRecordStore::new(connect().await);
    let key = fresh_key("photo");

    assert!(records
        .insert_new(&key, "first".to_string(), Duration::from_secs(60))
        .await
        .unwrap());
    assert!(!records
        .insert_new(&key, "second".to_string(), Duration::from_secs(60))
        .await
        .unwrap());

    assert_eq!(records.get(&key).await.unwrap().as_deref(), Some("first"));
}

#[tokio::test]
#[ignore]
async fn test_redis_record_expires_after_ttl() {
    let records = RedisRecordStore::new(connect().await);
    let key = fresh_key("photo-ttl");

    assert!(records
        .insert_new(&key, "value".to_string(), Duration::from_millis(300))
        .await
        .unwrap());
    assert!(records.get(&key).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(records.get(&key).await.unwrap(), None);
    assert!(records
        .insert_new(&key, "again".to_string(), Duration::from_secs(60))
        .await
        .unwrap());
}
