//! TTL self-healing of leaked inflight slots.

use std::sync::Arc;
use std::time::Duration;

use inflight_gate::admission::{AdmissionGuard, QosPolicy};
use inflight_gate::config::QosConfig;
use inflight_gate::store::{KeyTtl, MemoryStore};

mod common;
use common::FlakyStore;

#[tokio::test(start_paused = true)]
async fn test_increment_issues_expiry_refresh() {
    let store = FlakyStore::new();
    let counter = common::counter(store.clone());
    let key = counter.key_for("albert").unwrap();

    counter.increment(&key).await.unwrap();
    common::settle().await;
    assert_eq!(store.expire.calls(), 1);

    counter.increment(&key).await.unwrap();
    common::settle().await;
    assert_eq!(store.expire.calls(), 2);

    // settle() advanced the paused clock by 20ms
    assert_eq!(counter.key_ttl(&key).await.unwrap(), KeyTtl::Expires(299));
}

#[tokio::test(start_paused = true)]
async fn test_crashed_holder_heals_after_ttl() {
    let store = Arc::new(MemoryStore::new());
    let counter = common::counter(store.clone());
    let policy = QosPolicy::new(counter.clone(), QosConfig::default());
    let key = counter.key_for("albert").unwrap();

    // A holder that never runs its exit path
    let guard = AdmissionGuard::acquire(&counter, key.clone()).await;
    std::mem::forget(guard);
    common::settle().await;

    assert_eq!(counter.current(&key).await.unwrap(), 1);
    assert!(!policy.should_admit(&key, 1).await);

    tokio::time::advance(counter.ttl() + Duration::from_secs(1)).await;

    assert_eq!(counter.key_ttl(&key).await.unwrap(), KeyTtl::Missing);
    assert_eq!(counter.current(&key).await.unwrap(), 0);
    assert!(policy.should_admit(&key, 1).await);
}

#[tokio::test(start_paused = true)]
async fn test_traffic_keeps_key_alive() {
    let store = Arc::new(MemoryStore::new());
    let counter = common::counter(store.clone());
    let key = counter.key_for("albert").unwrap();

    counter.increment(&key).await.unwrap();
    common::settle().await;

    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(200)).await;
        counter.increment(&key).await.unwrap();
        common::settle().await;
    }

    // 600s after the first increment, still alive thanks to renewals
    assert_eq!(counter.current(&key).await.unwrap(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_manual_reset_rearms_ttl() {
    let store = Arc::new(MemoryStore::new());
    let counter = common::counter(store.clone());
    let key = counter.key_for("albert").unwrap();

    for _ in 0..4 {
        counter.increment(&key).await.unwrap();
    }
    common::settle().await;

    let snapshot = counter.reset(&key).await.unwrap();
    assert_eq!(snapshot.value, 0);
    assert_eq!(snapshot.ttl, KeyTtl::Expires(300));
}
