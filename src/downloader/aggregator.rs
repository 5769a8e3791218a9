//! Outcome collection
//!
//! Two collector tasks own the run totals: one counts successes, the other
//! appends failed keys. Producers only ever enqueue on unbounded channels, so
//! reporting never waits on the collectors.
//!
//! Shutdown is two-step. [`ResultAggregator::close`] drops the aggregator's own
//! senders; each collector ends once every [`OutcomeReporter`] clone has also
//! been dropped, so an outcome sent by a still-running worker is never lost.
//! [`ClosingAggregator::flush`] then awaits both collectors. The success
//! collector's completion is the "counting complete" signal.

use super::job::Outcome;
use super::RunError;
use indicatif::ProgressBar;
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Final totals read after the collectors finished
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateTotals {
    /// Objects downloaded
    pub succeeded: u64,
    /// Failed keys in receipt order
    pub failed_keys: Vec<String>,
}

impl AggregateTotals {
    /// Number of outcomes collected
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed_keys.len() as u64
    }
}

/// Running collectors plus the senders that feed them
pub struct ResultAggregator {
    reporter: OutcomeReporter,
    counting_done: JoinHandle<u64>,
    failures_done: JoinHandle<Vec<String>>,
}

impl ResultAggregator {
    /// Spawn both collectors. `progress` advances once per outcome.
    pub fn start(progress: ProgressBar) -> Self {
        let (success_tx, success_rx) = unbounded_channel();
        let (failure_tx, failure_rx) = unbounded_channel();

        let counting_done = tokio::spawn(collect_successes(success_rx, progress.clone()));
        let failures_done = tokio::spawn(collect_failures(failure_rx, progress));

        Self {
            reporter: OutcomeReporter {
                success_tx,
                failure_tx,
            },
            counting_done,
            failures_done,
        }
    }

    /// Handle for one worker to report its outcome
    pub fn reporter(&self) -> OutcomeReporter {
        self.reporter.clone()
    }

    /// Stop accepting new reporters. Collectors keep draining until every
    /// outstanding reporter is gone.
    pub fn close(self) -> ClosingAggregator {
        drop(self.reporter);
        ClosingAggregator {
            counting_done: self.counting_done,
            failures_done: self.failures_done,
        }
    }
}

/// Aggregator whose intake is closed, waiting for its collectors
pub struct ClosingAggregator {
    counting_done: JoinHandle<u64>,
    failures_done: JoinHandle<Vec<String>>,
}

impl ClosingAggregator {
    /// Wait for both collectors and return their totals
    pub async fn flush(self) -> Result<AggregateTotals, RunError> {
        let succeeded = self
            .counting_done
            .await
            .map_err(|e| RunError::Aggregator(format!("success collector: {e}")))?;
        let failed_keys = self
            .failures_done
            .await
            .map_err(|e| RunError::Aggregator(format!("failure collector: {e}")))?;

        Ok(AggregateTotals {
            succeeded,
            failed_keys,
        })
    }
}

/// Sender side handed to a worker task
#[derive(Clone)]
pub struct OutcomeReporter {
    success_tx: UnboundedSender<String>,
    failure_tx: UnboundedSender<String>,
}

impl OutcomeReporter {
    /// Report one outcome. Consumes the reporter so each job reports once.
    pub fn report(self, outcome: Outcome) {
        let sent = match outcome {
            Outcome::Success(key) => self.success_tx.send(key),
            Outcome::Failed(key) => self.failure_tx.send(key),
        };
        if let Err(e) = sent {
            // collectors only stop after every reporter is dropped
            error!(key = %e.0, "Outcome dropped: collector already stopped");
        }
    }
}

async fn collect_successes(mut rx: UnboundedReceiver<String>, progress: ProgressBar) -> u64 {
    let mut downloaded = 0u64;
    while let Some(key) = rx.recv().await {
        downloaded += 1;
        progress.inc(1);
        debug!(key = %key, downloaded, "Success recorded");
    }
    downloaded
}

async fn collect_failures(mut rx: UnboundedReceiver<String>, progress: ProgressBar) -> Vec<String> {
    let mut failed = Vec::new();
    while let Some(key) = rx.recv().await {
        progress.inc(1);
        debug!(key = %key, "Failure recorded");
        failed.push(key);
    }
    failed
}
