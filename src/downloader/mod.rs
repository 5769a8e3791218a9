//! Fetch orchestration
//!
//! This module provides the bounded-concurrency engine that downloads every
//! selected object exactly once (with retries) and accounts for each outcome.
//!
//! # Overview
//!
//! A run moves through these stages:
//!
//! 1. **Listing**: keys under each partition's delta prefix are listed and
//!    filtered with [`crate::filter::KeyFilter`]
//! 2. **Dispatch**: each selected key takes a slot from the [`gate::AdmissionGate`]
//!    and is handed to a [`worker::FetchWorker`] task
//! 3. **Collection**: outcomes flow into the [`aggregator::ResultAggregator`]
//! 4. **Drain**: the [`coordinator::DrainCoordinator`] joins every worker,
//!    closes the aggregator, waits for its flush and builds a [`RunReport`]
//!
//! # Quick Start
//!
//! ```no_run
//! use mso_fetch::downloader::{DrainCoordinator, FetchSettings, RetryPolicy};
//! use mso_fetch::filter::{KeyFilter, TargetDate};
//! use mso_fetch::store::ObjectStoreRemote;
//! use mso_fetch::Partition;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(ObjectStoreRemote::s3("us-east-1", "rovi-cdw", None)?);
//! let filter = KeyFilter::new("event/tv_viewership", TargetDate::parse("20240115")?);
//! let settings = FetchSettings::default()
//!     .with_concurrency(4)
//!     .with_retry(RetryPolicy::new(3, Duration::from_secs(10)));
//!
//! let report = DrainCoordinator::new(store, filter, settings)?
//!     .run(&[Partition::new("4012", "Metro Cable")])
//!     .await?;
//! assert_eq!(report.dispatched, report.succeeded + report.failed_keys.len() as u64);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Per-object problems never surface as errors; they end up in
//! [`RunReport::failed_keys`]. [`RunError`] is reserved for conditions that
//! abort the whole run, such as a failed listing.

pub mod aggregator;
pub mod config;
pub mod coordinator;
pub mod gate;
pub mod job;
pub mod report;
pub mod worker;

pub use aggregator::{AggregateTotals, ResultAggregator};
pub use config::{FetchSettings, RetryPolicy};
pub use coordinator::{DrainCoordinator, DrainState};
pub use gate::{AdmissionGate, GateError, GatePermit};
pub use job::{FetchJob, Outcome};
pub use report::RunReport;
pub use worker::FetchWorker;

use crate::store::StoreError;
use std::path::PathBuf;

/// Errors from a single fetch attempt
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Key cannot be mapped to a local path
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// Local directory could not be created
    #[error("could not create folder {path:?}: {source}")]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Local file could not be created
    #[error("failed to create file {path:?}: {source}")]
    CreateFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Remote transfer failed
    #[error("transfer failed: {0}")]
    Transfer(#[from] StoreError),
}

/// Invalid fetch settings
#[derive(Debug, thiserror::Error)]
pub enum FetchSettingsError {
    /// Concurrency out of range
    #[error("concurrency must be between 1 and {max}, got {0}", max = config::MAX_CONCURRENCY)]
    Concurrency(usize),

    /// Max attempts out of range
    #[error("max attempts must be between 1 and {max}, got {0}", max = config::MAX_ATTEMPTS_LIMIT)]
    MaxAttempts(u32),
}

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Settings rejected before the run started
    #[error("invalid settings: {0}")]
    Settings(#[from] FetchSettingsError),

    /// Admission gate failure
    #[error("admission gate error: {0}")]
    Gate(#[from] GateError),

    /// Listing a partition failed. Jobs dispatched before the failure were
    /// drained and are summarised in `accounted`.
    #[error("failed to list objects for partition {partition}: {source}")]
    Listing {
        /// Partition code whose listing failed
        partition: String,
        /// Store error
        source: StoreError,
        /// Totals for jobs dispatched before the failure
        accounted: AggregateTotals,
    },

    /// A collector task did not finish cleanly
    #[error("result aggregator failed: {0}")]
    Aggregator(String),
}
