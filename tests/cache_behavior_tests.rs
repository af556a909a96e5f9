//! Integration Tests for Cache Behavior
//!
//! Exercises the public cache API end to end: visibility of writes, LRU
//! eviction, TTL expiry and the two write completion modes.

use std::sync::Arc;
use std::time::Duration;

use mini_cache::{Cache, CacheConfig, CacheError, CacheOf, PutOptions};

fn lru_cache(capacity: usize) -> CacheOf<i32> {
    CacheOf::new(CacheConfig::with_capacity(capacity).default_ttl(None)).unwrap()
}

// == LRU Scenarios ==

#[tokio::test]
async fn test_read_protects_key_from_eviction() {
    let cache = lru_cache(2);

    cache.put_and_wait("a", 1).await.unwrap();
    cache.put_and_wait("b", 2).await.unwrap();
    assert_eq!(cache.get("a"), Some(1));
    cache.put_and_wait("c", 3).await.unwrap();

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("b"), None);
    assert_eq!(cache.get("a"), Some(1));
    assert_eq!(cache.get("c"), Some(3));
}

#[tokio::test]
async fn test_write_only_load_evicts_first_inserted() {
    let cache = lru_cache(3);

    for (i, key) in ["k0", "k1", "k2", "k3"].iter().enumerate() {
        cache.put_and_wait(*key, i as i32).await.unwrap();
    }

    assert_eq!(cache.len(), 3);
    assert_eq!(cache.get("k0"), None);
    assert_eq!(cache.get("k3"), Some(3));
}

#[tokio::test]
async fn test_fire_and_forget_converges_to_capacity() {
    let cache = lru_cache(10);

    for i in 0..100 {
        cache.put_and_forget(format!("key{}", i), i);
    }
    // Any waited write flushes everything queued before it
    cache.put_and_wait("last", -1).await.unwrap();

    assert_eq!(cache.len(), 10);
    assert_eq!(cache.get("last"), Some(-1));
    assert_eq!(cache.get("key0"), None);
    assert_eq!(cache.get("key99"), Some(99));
}

#[tokio::test]
async fn test_overflowing_queue_never_exceeds_capacity_after_wait() {
    let config = CacheConfig::with_capacity(5)
        .default_ttl(None)
        .event_queue_capacity(4);
    let cache: CacheOf<i32> = CacheOf::new(config).unwrap();

    // Far more writes than the queue holds; most bookkeeping is dropped
    for i in 0..200 {
        cache.put_and_forget(format!("key{}", i), i);
    }
    cache.put_and_wait("tail", 0).await.unwrap();

    assert!(cache.len() <= 5, "len {} exceeds capacity", cache.len());
    assert_eq!(cache.get("tail"), Some(0));
}

// == TTL Scenarios ==

#[tokio::test]
async fn test_ttl_enforced_without_traffic() {
    let cache: CacheOf<i32> =
        CacheOf::new(CacheConfig::with_capacity(10).default_ttl(Some(Duration::from_millis(100))))
            .unwrap();

    cache.put_and_forget("x", 1);
    assert_eq!(cache.get("x"), Some(1));

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(cache.get("x"), None);
}

#[tokio::test]
async fn test_periodic_sweep_removes_expired_entries() {
    let config = CacheConfig::with_capacity(10)
        .default_ttl(Some(Duration::from_millis(50)))
        .maintenance_interval(Duration::from_millis(20));
    let cache: CacheOf<i32> = CacheOf::new(config).unwrap();

    cache.put_and_wait("a", 1).await.unwrap();
    cache.put_and_wait("b", 2).await.unwrap();
    assert_eq!(cache.len(), 2);

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(cache.len(), 0);
}

#[tokio::test]
async fn test_overwrite_resets_ttl() {
    let cache = lru_cache(10);

    cache
        .put_and_wait_with_ttl("a", 1, Some(Duration::from_millis(50)))
        .await
        .unwrap();
    cache.put_and_wait_with_ttl("a", 2, None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(cache.get("a"), Some(2));
}

// == Completion Semantics ==

#[tokio::test]
async fn test_put_and_wait_with_generous_timeout_confirms() {
    let cache = lru_cache(1);

    cache.put_and_wait("a", 1).await.unwrap();
    let options = PutOptions::default().timeout(Duration::from_secs(5));
    cache.put_and_wait_with("b", 2, options).await.unwrap();

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("b"), Some(2));
}

#[tokio::test]
async fn test_timed_out_write_is_still_applied() {
    let cache = lru_cache(1);

    cache.put_and_wait("a", 1).await.unwrap();
    let result = cache.put_and_wait_timeout("b", 2, Duration::ZERO).await;
    assert!(matches!(result, Ok(()) | Err(CacheError::Timeout { .. })));
    assert_eq!(cache.get("b"), Some(2));

    // A later waited write observes the earlier one fully applied
    cache.put_and_wait("c", 3).await.unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("c"), Some(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_respect_capacity() {
    let cache = Arc::new(lru_cache(16));

    let tasks: Vec<_> = (0..8)
        .map(|t| {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    let key = format!("t{}-{}", t, i);
                    if i % 2 == 0 {
                        cache.put_and_forget(key, i);
                    } else {
                        cache.put_and_wait(key, i).await.unwrap();
                    }
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    cache.put_and_wait("final", 0).await.unwrap();

    assert!(cache.len() <= 16, "len {} exceeds capacity", cache.len());
    assert_eq!(cache.get("final"), Some(0));
}

// == Teardown ==

#[tokio::test]
async fn test_shutdown_applies_pending_writes() {
    let cache = lru_cache(2);

    for i in 0..5 {
        cache.put_and_forget(format!("key{}", i), i);
    }
    cache.shutdown().await;

    assert!(!cache.is_running());
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("key4"), Some(4));
}

// == Untyped Cache ==

#[tokio::test]
async fn test_untyped_cache_scenario() {
    let cache = Cache::new(CacheConfig::with_capacity(2).default_ttl(None)).unwrap();

    cache.put_and_wait("a", 1i64).await.unwrap();
    cache.put_and_wait("b", "two".to_string()).await.unwrap();
    assert!(cache.get("a").is_some());
    cache.put_and_wait("c", vec![3u8]).await.unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.get("b").is_none());
    assert_eq!(cache.get_as::<i64>("a"), Some(1));
    assert_eq!(cache.get_as::<Vec<u8>>("c"), Some(vec![3]));
}
