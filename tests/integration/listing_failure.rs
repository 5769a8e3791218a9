//! Runs aborted by a failed partition listing

use crate::support::{self, delta_key, prefix, ScriptedStore};
use mso_fetch::downloader::{DrainCoordinator, RunError};
use mso_fetch::store::StoreError;
use mso_fetch::Partition;
use std::sync::Arc;
use std::time::Duration;

fn partitions() -> Vec<Partition> {
    vec![
        Partition::new("4012", "Metro Cable"),
        Partition::new("5001", "Lakeside Fiber"),
        Partition::new("6100", "Valley Broadband"),
    ]
}

#[tokio::test]
async fn test_listing_failure_drains_dispatched_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let first = vec![
        delta_key("4012", "1705300000-1_20240115", "part-0000.gz"),
        delta_key("4012", "1705300000-1_20240115", "part-0001.gz"),
    ];
    let store = Arc::new(
        ScriptedStore::new()
            .with_listing(prefix("4012"), first.clone())
            .fail_listing(prefix("5001"))
            .with_listing(
                prefix("6100"),
                vec![delta_key("6100", "1705300000-1_20240115", "part-0000.gz")],
            )
            .with_delay(Duration::from_millis(20)),
    );

    let result = DrainCoordinator::new(store.clone(), support::filter(), support::settings(dir.path(), 2, 3))
        .unwrap()
        .run(&partitions())
        .await;

    match result {
        Err(RunError::Listing {
            partition,
            source,
            accounted,
        }) => {
            assert_eq!(partition, "5001");
            assert!(matches!(source, StoreError::List { .. }));
            // Slow downloads from the first partition were still counted
            assert_eq!(accounted.succeeded, 2);
            assert!(accounted.failed_keys.is_empty());
        }
        other => panic!("expected listing error, got {other:?}"),
    }

    for key in &first {
        assert!(dir.path().join(key).exists());
    }
    // Nothing after the failing partition is listed
    assert_eq!(store.listed_prefixes(), vec![prefix("4012"), prefix("5001")]);
}

#[tokio::test]
async fn test_first_listing_failure_accounts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ScriptedStore::new().fail_listing(prefix("4012")));

    let err = DrainCoordinator::new(store.clone(), support::filter(), support::settings(dir.path(), 2, 3))
        .unwrap()
        .run(&partitions())
        .await
        .unwrap_err();

    match err {
        RunError::Listing { accounted, .. } => assert_eq!(accounted.total(), 0),
        other => panic!("expected listing error, got {other:?}"),
    }
    assert_eq!(store.total_attempts(), 0);
}

#[tokio::test]
async fn test_listing_error_message_names_partition() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ScriptedStore::new().fail_listing(prefix("4012")));

    let err = DrainCoordinator::new(store, support::filter(), support::settings(dir.path(), 1, 1))
        .unwrap()
        .run(&partitions()[..1])
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("4012"), "{message}");
    assert!(message.contains("access denied"), "{message}");
}
