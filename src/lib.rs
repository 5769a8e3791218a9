//! # MSO Fetch Library
//!
//! Fetches the delta objects that a set of MSO partitions produced on a given
//! date from an object store, mirroring each remote key to a local path.
//!
//! ## Features
//!
//! - **Bounded Concurrency**: An admission gate caps simultaneous downloads
//! - **Per-Object Retry**: Transient failures are retried with a fixed backoff
//! - **Exact Accounting**: Every dispatched job yields exactly one outcome
//! - **Ordered Drain**: Workers are joined before totals are read
//!
//! ## Quick Start
//!
//! ```no_run
//! use mso_fetch::catalog::PartitionCatalog;
//! use mso_fetch::downloader::{DrainCoordinator, FetchSettings};
//! use mso_fetch::filter::{KeyFilter, TargetDate};
//! use mso_fetch::store::ObjectStoreRemote;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let partitions = PartitionCatalog::load("mso-list.csv")?;
//! let store = Arc::new(ObjectStoreRemote::s3("us-east-1", "rovi-cdw", None)?);
//! let filter = KeyFilter::new("event/tv_viewership", TargetDate::parse("20240115")?);
//!
//! let coordinator = DrainCoordinator::new(store, filter, FetchSettings::default())?;
//! let report = coordinator.run(&partitions).await?;
//! println!("{} files downloaded", report.succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`catalog`] - Partition list loading
//! - [`filter`] - Key selection for a partition and date
//! - [`store`] - Remote object store seam (listing and transfer)
//! - [`downloader`] - Admission gate, fetch worker, aggregator, drain coordinator
//! - [`cli`] - Command line surface
//! - [`metrics`] - Optional Prometheus metrics

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// CLI command implementation
pub mod cli;

/// Partition catalog loading
pub mod catalog;

/// Fetch orchestration
pub mod downloader;

/// Remote key selection
pub mod filter;

/// Observability metrics
pub mod metrics;

/// Remote object store access
pub mod store;

pub use catalog::PartitionCatalog;
pub use downloader::{DrainCoordinator, RunReport};
pub use filter::{KeyFilter, TargetDate};

/// A logical source of objects (an MSO) identified by a short code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    /// Short code used in the remote key prefix (e.g., "4012")
    pub code: String,
    /// Human-readable partition name
    pub name: String,
}

impl Partition {
    /// Create a new partition
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    /// Remote prefix holding this partition's delta objects:
    /// `"<base_prefix>/<code>/delta/"`
    pub fn delta_prefix(&self, base_prefix: &str) -> String {
        format!("{}/{}/delta/", base_prefix.trim_end_matches('/'), self.code)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.name)
    }
}
