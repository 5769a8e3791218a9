//! Integration tests for logging and tracing

use crate::support::{self, delta_key, prefix, ScriptedStore};
use mso_fetch::downloader::DrainCoordinator;
use mso_fetch::Partition;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// In-memory sink for formatted log lines
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_tracing_json_format() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("info"))
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(partition = "4012", count = 3, "Number of objects");
    });

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let line = output.lines().next().expect("one JSON record");
    let record: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(record["level"], "INFO");
    assert_eq!(record["fields"]["message"], "Number of objects");
    assert_eq!(record["fields"]["partition"], "4012");
    assert_eq!(record["fields"]["count"], 3);
}

#[test]
fn test_env_filter_parsing() {
    for directive in ["mso_fetch=info", "mso_fetch=warn", "warn,mso_fetch=debug"] {
        let filter = EnvFilter::try_new(directive);
        assert!(filter.is_ok(), "{directive} should parse");
    }
}

#[tokio::test]
async fn test_run_with_debug_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("mso_fetch=debug"))
        .with_test_writer()
        .try_init();

    let dir = tempfile::tempdir().unwrap();
    let flaky = delta_key("4012", "1705300000-1_20240115", "part-0000.gz");
    let store = Arc::new(
        ScriptedStore::new()
            .with_listing(prefix("4012"), vec![flaky.clone()])
            .fail_times(flaky, 1),
    );

    // Every log site on the retry and drain paths must format cleanly
    let report = DrainCoordinator::new(store, support::filter(), support::settings(dir.path(), 1, 2))
        .unwrap()
        .run(&[Partition::new("4012", "Metro Cable")])
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
}
