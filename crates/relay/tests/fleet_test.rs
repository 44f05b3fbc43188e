//! Integration tests for the shared store across several instances.
//!
//! Instances share one `MemoryBackend`, the in-process stand-in for Redis.
//! The Redis variant is ignored by default and reads its URL from
//! `WARDEN_TEST_REDIS_URL`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use indexmap::IndexMap;
use tokio::time::timeout;
use uuid::Uuid;

use warden_core::config::StoreConfig;
use warden_core::{Metadata, NoopObserver, Opinion, Severity, Signal, SignalCategory, Verdict};
use warden_relay::{BroadcastMessage, MemoryBackend, SharedStore, StoreMode};

const TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE: Duration = Duration::from_millis(150);

fn config(max_retained: usize) -> StoreConfig {
    StoreConfig {
        max_retained,
        reconnect_base_ms: 10,
        reconnect_max_ms: 50,
        health_check_interval_secs: 1,
        ..StoreConfig::default()
    }
}

fn verdict(subject: &str) -> Verdict {
    let signal = Signal::new(SignalCategory::AnomalyDetection, subject, Metadata::new()).unwrap();
    let mut opinions = IndexMap::new();
    opinions.insert(
        "priority".to_string(),
        Opinion::new("priority", "Severity assessed as LOW", 0.6),
    );
    Verdict {
        id: Uuid::new_v4(),
        signal,
        severity: Severity::Low,
        summary: format!("LOW severity anomaly detection detected for {subject}."),
        opinions,
        total_elapsed_ms: 3,
        needs_review: false,
        review_reason: None,
        false_positive: None,
        response_plan: None,
        investigation_timeline: None,
        created_at: Utc::now(),
    }
}

async fn instance(backend: &MemoryBackend, cfg: StoreConfig) -> Arc<SharedStore> {
    let store = SharedStore::new(Some(Arc::new(backend.clone())), cfg, Arc::new(NoopObserver)).await;
    store.start();
    store
}

async fn wait_for_mode(store: &SharedStore, mode: StoreMode) {
    timeout(TIMEOUT, async {
        while store.mode() != mode {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("store never reached the expected mode");
}

#[tokio::test]
async fn publish_on_one_instance_reaches_another() {
    let backend = MemoryBackend::new(100);
    let a = instance(&backend, config(100)).await;
    let b = instance(&backend, config(100)).await;
    tokio::time::sleep(SETTLE).await;

    let mut on_a = a.subscribe();
    let mut on_b = b.subscribe();
    let v = verdict("Acme Corp");
    a.publish(&v).await;

    let got = timeout(TIMEOUT, on_b.next()).await.expect("timed out").unwrap();
    assert_eq!(got, BroadcastMessage::NewVerdict(v.clone()));

    // The publisher sees its own message once, not again via the echo.
    let own = timeout(TIMEOUT, on_a.next()).await.expect("timed out").unwrap();
    assert_eq!(own, BroadcastMessage::NewVerdict(v));
    assert!(timeout(SETTLE, on_a.next()).await.is_err());

    a.shutdown();
    b.shutdown();
}

#[tokio::test]
async fn put_on_one_instance_is_readable_from_another() {
    let backend = MemoryBackend::new(100);
    let a = instance(&backend, config(100)).await;
    let b = instance(&backend, config(100)).await;

    let v = verdict("TechStart");
    a.put(&v).await;

    assert_eq!(b.get(v.id).await, Some(v.clone()));
    assert_eq!(b.list(10, 0).await, vec![v]);
    assert_eq!(b.total_count().await, 1);
    assert!(b.get(Uuid::new_v4()).await.is_none());
}

#[tokio::test]
async fn re_put_counts_once_across_instances() {
    let backend = MemoryBackend::new(100);
    let a = instance(&backend, config(100)).await;
    let b = instance(&backend, config(100)).await;

    let v = verdict("TechStart");
    a.put(&v).await;
    b.put(&v).await;

    assert_eq!(a.total_count().await, 1);
    assert_eq!(b.list(10, 0).await, vec![v]);
}

#[tokio::test]
async fn retention_keeps_the_newest_verdicts() {
    let backend = MemoryBackend::new(100);
    let store = instance(&backend, config(5)).await;

    let verdicts: Vec<_> = (0..8).map(|i| verdict(&format!("tenant-{i}"))).collect();
    for v in &verdicts {
        store.put(v).await;
    }

    let listed: Vec<Uuid> = store.list(100, 0).await.iter().map(|v| v.id).collect();
    let expected: Vec<Uuid> = verdicts.iter().rev().take(5).map(|v| v.id).collect();
    assert_eq!(listed, expected);
    assert!(store.get(verdicts[0].id).await.is_none());
    assert_eq!(store.total_count().await, 8);
}

#[tokio::test]
async fn unreachable_service_degrades_without_errors() {
    let backend = MemoryBackend::new(100);
    let store = instance(&backend, config(100)).await;
    tokio::time::sleep(SETTLE).await;
    assert_eq!(store.mode(), StoreMode::Durable);

    backend.set_reachable(false);
    let mut local = store.subscribe();
    let v = verdict("GlobalBank");
    store.put(&v).await;
    store.publish(&v).await;

    assert_eq!(store.mode(), StoreMode::Degraded);
    assert_eq!(store.get(v.id).await, Some(v.clone()));
    assert_eq!(store.list(10, 0).await, vec![v.clone()]);

    let got = timeout(TIMEOUT, local.next()).await.expect("timed out").unwrap();
    assert_eq!(got, BroadcastMessage::NewVerdict(v));

    store.shutdown();
}

#[tokio::test]
async fn durable_mode_returns_when_service_recovers() {
    let backend = MemoryBackend::new(100);
    let store = instance(&backend, config(100)).await;
    tokio::time::sleep(SETTLE).await;

    backend.set_reachable(false);
    wait_for_mode(&store, StoreMode::Degraded).await;

    backend.set_reachable(true);
    wait_for_mode(&store, StoreMode::Durable).await;

    // A second instance sees writes made after recovery.
    let other = instance(&backend, config(100)).await;
    let v = verdict("HealthPlus");
    store.put(&v).await;
    assert_eq!(other.get(v.id).await, Some(v));

    store.shutdown();
    other.shutdown();
}

#[tokio::test]
async fn startup_without_service_is_degraded() {
    let backend = MemoryBackend::new(100);
    backend.set_reachable(false);
    let store = instance(&backend, config(100)).await;
    assert_eq!(store.mode(), StoreMode::Degraded);

    let v = verdict("RetailMax");
    store.put(&v).await;
    assert_eq!(store.list(1, 0).await, vec![v]);
    store.shutdown();
}

#[tokio::test]
#[ignore = "requires a running Redis; set WARDEN_TEST_REDIS_URL"]
async fn redis_fleet_shares_verdicts_and_broadcasts() {
    let url = std::env::var("WARDEN_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let cfg = StoreConfig {
        redis_url: url,
        key_prefix: format!("warden-test:{}:", Uuid::new_v4()),
        ..config(3)
    };

    let a = SharedStore::connect(cfg.clone(), Arc::new(NoopObserver)).await;
    let b = SharedStore::connect(cfg, Arc::new(NoopObserver)).await;
    assert_eq!(a.mode(), StoreMode::Durable);
    a.start();
    b.start();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut on_b = b.subscribe();
    let verdicts: Vec<_> = (0..4).map(|i| verdict(&format!("redis-{i}"))).collect();
    for v in &verdicts {
        a.put(v).await;
    }
    a.publish(&verdicts[3]).await;

    let got = timeout(TIMEOUT, on_b.next()).await.expect("timed out").unwrap();
    assert_eq!(got, BroadcastMessage::NewVerdict(verdicts[3].clone()));
    assert_eq!(b.get(verdicts[3].id).await, Some(verdicts[3].clone()));
    assert_eq!(b.list(10, 0).await.len(), 3);
    assert!(b.get(verdicts[0].id).await.is_none());

    a.shutdown();
    b.shutdown();
}
