//! Observability metrics for fetch runs
//!
//! This module records listing volume, fetch attempts, retry backoff and
//! admission gate pressure.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate macros; they are no-ops until a recorder is installed
//! - Optional Prometheus exporter with an HTTP scrape endpoint
//! - Keys are never used as labels to keep cardinality bounded

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Address of the installed exporter, set once
static EXPORTER_ADDR: OnceCell<SocketAddr> = OnceCell::new();

/// Initialize metrics with a Prometheus exporter listening on `addr`
///
/// Idempotent: later calls are ignored once an exporter is installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    if let Some(existing) = EXPORTER_ADDR.get() {
        debug!("Metrics already initialized on {}, skipping", existing);
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "objects_listed_total",
        Unit::Count,
        "Objects returned by partition listings"
    );
    describe_counter!(
        "objects_matched_total",
        Unit::Count,
        "Listed objects selected for download"
    );
    describe_counter!(
        "fetch_attempts_failed_total",
        Unit::Count,
        "Failed download attempts"
    );
    describe_counter!("fetch_retries_total", Unit::Count, "Retries after a failed attempt");
    describe_histogram!(
        "fetch_backoff_seconds",
        Unit::Seconds,
        "Backoff slept before a retry"
    );
    describe_histogram!(
        "admission_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for an admission slot"
    );
    describe_gauge!(
        "admission_permits_available",
        Unit::Count,
        "Admission slots currently free"
    );
    describe_counter!(
        "fetches_completed_total",
        Unit::Count,
        "Objects downloaded successfully"
    );
    describe_counter!(
        "fetches_failed_total",
        Unit::Count,
        "Objects recorded as failed"
    );
    describe_counter!(
        "bytes_downloaded_total",
        Unit::Bytes,
        "Bytes written to local files"
    );

    let _ = EXPORTER_ADDR.set(addr);
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Record the result of listing one partition
pub fn record_listing(partition: &str, listed: usize, matched: usize) {
    counter!("objects_listed_total", "partition" => partition.to_string())
        .increment(listed as u64);
    counter!("objects_matched_total", "partition" => partition.to_string())
        .increment(matched as u64);
}

/// Record a failed attempt followed by a backoff sleep
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!("fetch_retries_total", "attempt" => attempt.to_string()).increment(1);
    histogram!("fetch_backoff_seconds").record(duration.as_secs_f64());

    debug!(
        attempt = attempt,
        backoff_ms = duration.as_millis(),
        "Retry backoff recorded"
    );
}

/// Admission gate metrics helper
#[derive(Default)]
pub struct GateMetrics {
    start_time: Option<Instant>,
}

impl GateMetrics {
    /// Create a new gate metrics instance
    pub fn new() -> Self {
        Self { start_time: None }
    }

    /// Start measuring queue wait time
    pub fn start_acquire(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Record a slot acquisition
    pub fn record_acquired(&mut self) {
        if let Some(start) = self.start_time.take() {
            let wait = start.elapsed();
            histogram!("admission_wait_seconds").record(wait.as_secs_f64());

            if wait.as_millis() > 100 {
                debug!(wait_ms = wait.as_millis(), "Admission slot acquired after wait");
            }
        }
    }

    /// Update the free slots gauge
    pub fn update_available(&self, available: usize) {
        gauge!("admission_permits_available").set(available as f64);
    }
}

/// Per-object fetch metrics
pub struct FetchMetrics {
    partition: String,
    start_time: Instant,
}

impl FetchMetrics {
    /// Start tracking a fetch for an object in `partition`
    pub fn start(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            start_time: Instant::now(),
        }
    }

    /// Record a failed attempt
    pub fn record_attempt_failure(&self) {
        counter!("fetch_attempts_failed_total", "partition" => self.partition.clone())
            .increment(1);
    }

    /// Record a completed download
    pub fn record_success(&self, bytes: u64, attempts: u32) {
        counter!("fetches_completed_total", "partition" => self.partition.clone()).increment(1);
        counter!("bytes_downloaded_total", "partition" => self.partition.clone())
            .increment(bytes);

        debug!(
            partition = %self.partition,
            bytes = bytes,
            attempts = attempts,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Fetch completed"
        );
    }

    /// Record an object that ended up failed
    pub fn record_failure(&self, attempts: u32) {
        counter!("fetches_failed_total", "partition" => self.partition.clone()).increment(1);

        debug!(
            partition = %self.partition,
            attempts = attempts,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Fetch failed"
        );
    }
}
