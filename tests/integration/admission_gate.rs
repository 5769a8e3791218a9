//! Concurrency limits enforced by the admission gate

use crate::support::{self, delta_key, prefix, ScriptedStore};
use mso_fetch::downloader::{AdmissionGate, DrainCoordinator, GateError};
use mso_fetch::Partition;
use std::sync::Arc;
use std::time::Duration;

fn keys(code: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| delta_key(code, "1705300000-1_20240115", &format!("part-{i:04}.gz")))
        .collect()
}

#[tokio::test]
async fn test_downloads_never_exceed_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        ScriptedStore::new()
            .with_listing(prefix("4012"), keys("4012", 12))
            .with_listing(prefix("5001"), keys("5001", 12))
            .with_delay(Duration::from_millis(10)),
    );

    let coordinator =
        DrainCoordinator::new(store.clone(), support::filter(), support::settings(dir.path(), 2, 3))
            .unwrap();
    let report = coordinator
        .run(&[
            Partition::new("4012", "Metro Cable"),
            Partition::new("5001", "Lakeside Fiber"),
        ])
        .await
        .unwrap();

    assert_eq!(report.succeeded, 24);
    assert!(store.max_in_flight() <= 2, "saw {} in flight", store.max_in_flight());
    assert!(store.max_in_flight() >= 1);
    assert_eq!(coordinator.gate().available(), 2);
}

#[tokio::test]
async fn test_single_slot_serialises_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        ScriptedStore::new()
            .with_listing(prefix("4012"), keys("4012", 5))
            .with_delay(Duration::from_millis(5)),
    );

    let report = DrainCoordinator::new(store.clone(), support::filter(), support::settings(dir.path(), 1, 1))
        .unwrap()
        .run(&[Partition::new("4012", "Metro Cable")])
        .await
        .unwrap();

    assert_eq!(report.succeeded, 5);
    assert_eq!(store.max_in_flight(), 1);
}

#[tokio::test]
async fn test_retries_hold_their_slot() {
    let dir = tempfile::tempdir().unwrap();
    let listed = keys("4012", 6);
    let mut store = ScriptedStore::new()
        .with_listing(prefix("4012"), listed.clone())
        .with_delay(Duration::from_millis(5));
    for key in &listed {
        store = store.fail_times(key.clone(), 1);
    }
    let store = Arc::new(store);

    let report = DrainCoordinator::new(store.clone(), support::filter(), support::settings(dir.path(), 3, 2))
        .unwrap()
        .run(&[Partition::new("4012", "Metro Cable")])
        .await
        .unwrap();

    assert_eq!(report.succeeded, 6);
    assert_eq!(store.total_attempts(), 12);
    assert!(store.max_in_flight() <= 3);
}

#[tokio::test]
async fn test_gate_capacity_accounting() {
    let gate = AdmissionGate::new(2).unwrap();
    assert_eq!(gate.capacity(), 2);

    let first = gate.acquire().await.unwrap();
    let second = gate.acquire().await.unwrap();
    assert_eq!(gate.available(), 0);

    // A third acquire waits until a slot is released
    let waiting = tokio::time::timeout(Duration::from_millis(20), gate.acquire()).await;
    assert!(waiting.is_err());

    first.release();
    let third = gate.acquire().await.unwrap();
    second.release();
    third.release();
    assert_eq!(gate.available(), 2);
}

#[test]
fn test_zero_capacity_rejected() {
    assert!(matches!(AdmissionGate::new(0), Err(GateError::ZeroCapacity)));
}
