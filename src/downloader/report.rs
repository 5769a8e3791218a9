//! Final run report

use super::aggregator::AggregateTotals;
use serde::Serialize;
use std::time::Duration;

/// Summary produced once every dispatched job has been accounted for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Partitions listed and dispatched
    pub partitions_processed: usize,
    /// Jobs dispatched across all partitions
    pub dispatched: u64,
    /// Objects downloaded
    pub succeeded: u64,
    /// Keys that exhausted their attempts, in receipt order
    pub failed_keys: Vec<String>,
    /// Wall time of the run
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl RunReport {
    /// Build a report from collected totals
    pub fn new(
        partitions_processed: usize,
        dispatched: u64,
        totals: AggregateTotals,
        elapsed: Duration,
    ) -> Self {
        Self {
            partitions_processed,
            dispatched,
            succeeded: totals.succeeded,
            failed_keys: totals.failed_keys,
            elapsed,
        }
    }

    /// Whether every dispatched job produced exactly one outcome
    pub fn is_balanced(&self) -> bool {
        self.succeeded + self.failed_keys.len() as u64 == self.dispatched
    }

    /// Human-readable summary lines
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = if self.failed_keys.is_empty() {
            vec!["No failed downloads".to_string()]
        } else {
            self.failed_keys
                .iter()
                .map(|key| format!("Failed downloading: {key}"))
                .collect()
        };
        lines.push(format!(
            "Processed {} MSO's, {} files, in {:.3?}",
            self.partitions_processed, self.succeeded, self.elapsed
        ));
        lines
    }
}

fn serialize_secs<S: serde::Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(elapsed.as_secs_f64())
}
