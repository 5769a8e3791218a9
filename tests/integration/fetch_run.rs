//! End-to-end runs through the drain coordinator

use crate::support::{self, delta_key, prefix, ScriptedStore};
use mso_fetch::downloader::DrainCoordinator;
use mso_fetch::Partition;
use std::sync::Arc;

fn partitions() -> Vec<Partition> {
    vec![
        Partition::new("4012", "Metro Cable"),
        Partition::new("5001", "Lakeside Fiber"),
    ]
}

/// Three keys per partition, two of them for the target date
fn listing(code: &str) -> Vec<String> {
    vec![
        delta_key(code, "1705300000-1_20240115", "part-0000.gz"),
        delta_key(code, "1705300000-2_20240115", "part-0001.gz"),
        delta_key(code, "1705200000-1_20240114", "part-0000.gz"),
    ]
}

#[tokio::test]
async fn test_run_with_retries_and_a_permanent_failure() {
    let dir = tempfile::tempdir().unwrap();
    let flaky = delta_key("4012", "1705300000-2_20240115", "part-0001.gz");
    let broken = delta_key("5001", "1705300000-1_20240115", "part-0000.gz");

    let store = Arc::new(
        ScriptedStore::new()
            .with_listing(prefix("4012"), listing("4012"))
            .with_listing(prefix("5001"), listing("5001"))
            .fail_times(flaky.clone(), 2)
            .always_fail(broken.clone()),
    );

    let coordinator =
        DrainCoordinator::new(store.clone(), support::filter(), support::settings(dir.path(), 2, 3))
            .unwrap();
    let report = coordinator.run(&partitions()).await.unwrap();

    assert_eq!(report.partitions_processed, 2);
    assert_eq!(report.dispatched, 4);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed_keys, vec![broken.clone()]);
    assert!(report.is_balanced());

    assert_eq!(store.attempts(&flaky), 3);
    assert_eq!(store.attempts(&broken), 3);

    // Keys for other dates are never fetched
    assert_eq!(
        store.attempts(&delta_key("4012", "1705200000-1_20240114", "part-0000.gz")),
        0
    );

    let written = dir.path().join(&flaky);
    assert_eq!(std::fs::read_to_string(written).unwrap(), flaky);
    assert!(!dir.path().join(&broken).exists());
}

#[tokio::test]
async fn test_summary_lines_for_run() {
    let dir = tempfile::tempdir().unwrap();
    let broken = delta_key("4012", "1705300000-1_20240115", "part-0000.gz");
    let store = Arc::new(
        ScriptedStore::new()
            .with_listing(prefix("4012"), listing("4012"))
            .always_fail(broken.clone()),
    );

    let report = DrainCoordinator::new(store, support::filter(), support::settings(dir.path(), 4, 1))
        .unwrap()
        .run(&partitions()[..1])
        .await
        .unwrap();

    let lines = report.summary_lines();
    assert_eq!(lines[0], format!("Failed downloading: {broken}"));
    assert!(lines[1].starts_with("Processed 1 MSO's, 1 files, in "));
}

#[tokio::test]
async fn test_partition_without_matches_still_counts_as_processed() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ScriptedStore::new().with_listing(
        prefix("4012"),
        vec![delta_key("4012", "1705200000-1_20240114", "part-0000.gz")],
    ));

    let report = DrainCoordinator::new(store, support::filter(), support::settings(dir.path(), 2, 3))
        .unwrap()
        .run(&partitions())
        .await
        .unwrap();

    assert_eq!(report.partitions_processed, 2);
    assert_eq!(report.dispatched, 0);
    assert_eq!(report.succeeded, 0);
    assert!(report.failed_keys.is_empty());
    assert_eq!(report.summary_lines()[0], "No failed downloads");
}

#[tokio::test]
async fn test_keys_under_other_partitions_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    // A listing that leaks another partition's key must not dispatch it
    let foreign = delta_key("9999", "1705300000-1_20240115", "part-0000.gz");
    let mut keys = listing("4012");
    keys.push(foreign.clone());

    let store = Arc::new(ScriptedStore::new().with_listing(prefix("4012"), keys));
    let report = DrainCoordinator::new(
        store.clone(),
        support::filter(),
        support::settings(dir.path(), 2, 3),
    )
    .unwrap()
    .run(&partitions()[..1])
    .await
    .unwrap();

    assert_eq!(report.dispatched, 2);
    assert_eq!(store.attempts(&foreign), 0);
}

#[tokio::test]
async fn test_many_outcomes_are_all_accounted() {
    let dir = tempfile::tempdir().unwrap();
    let keys: Vec<String> = (0..50)
        .map(|i| delta_key("4012", "1705300000-1_20240115", &format!("part-{i:04}.gz")))
        .collect();

    let mut store = ScriptedStore::new().with_listing(prefix("4012"), keys.clone());
    for key in keys.iter().step_by(5) {
        store = store.always_fail(key.clone());
    }
    let store = Arc::new(store);

    let report = DrainCoordinator::new(store, support::filter(), support::settings(dir.path(), 8, 2))
        .unwrap()
        .run(&partitions()[..1])
        .await
        .unwrap();

    assert_eq!(report.dispatched, 50);
    assert_eq!(report.succeeded, 40);
    assert_eq!(report.failed_keys.len(), 10);
    assert!(report.is_balanced());
}

#[tokio::test]
async fn test_panicking_download_is_recorded_as_failed() {
    let dir = tempfile::tempdir().unwrap();
    let keys = listing("4012");
    let panics = keys[0].clone();
    let store = Arc::new(
        ScriptedStore::new()
            .with_listing(prefix("4012"), keys)
            .panic_on(panics.clone()),
    );

    let coordinator =
        DrainCoordinator::new(store, support::filter(), support::settings(dir.path(), 2, 3)).unwrap();
    let report = coordinator.run(&partitions()[..1]).await.unwrap();

    assert_eq!(report.dispatched, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed_keys, vec![panics]);
    assert!(report.is_balanced());
    assert_eq!(coordinator.gate().available(), coordinator.gate().capacity());
}
