//! Drain coordinator
//!
//! Drives a run through its states:
//!
//! ```text
//! Listing -> Dispatching -> (Listing -> Dispatching)* -> AwaitingWorkers
//!   -> ClosingAggregator -> AwaitingAggregatorFlush -> Reporting -> Done
//! ```
//!
//! Ordering is carried by ownership. Dispatch state ([`Dispatch`]) owns the
//! aggregator and the set of outstanding workers; the only way to reach the
//! aggregator's `close` is through [`Dispatch::await_workers`], which joins
//! every worker and reclaims every admission slot first. Totals are only
//! available from [`ClosingAggregator::flush`](super::aggregator::ClosingAggregator::flush).

use super::aggregator::{AggregateTotals, ResultAggregator};
use super::config::FetchSettings;
use super::gate::AdmissionGate;
use super::job::{FetchJob, Outcome};
use super::report::RunReport;
use super::worker::FetchWorker;
use super::RunError;
use crate::filter::KeyFilter;
use crate::metrics::record_listing;
use crate::store::{RemoteStore, StoreError};
use crate::Partition;
use futures::FutureExt;
use indicatif::ProgressBar;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Coordinator states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    /// Listing and filtering a partition's keys
    Listing,
    /// Dispatching jobs for the current partition
    Dispatching,
    /// Joining every dispatched worker
    AwaitingWorkers,
    /// Closing the aggregator's intake
    ClosingAggregator,
    /// Waiting for the collectors to finish
    AwaitingAggregatorFlush,
    /// Building the report
    Reporting,
    /// Terminal
    Done,
}

impl DrainState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_advance_to(self, next: DrainState) -> bool {
        use DrainState::*;
        matches!(
            (self, next),
            (Listing, Dispatching)
                | (Listing, AwaitingWorkers)
                | (Dispatching, Listing)
                | (Dispatching, AwaitingWorkers)
                | (AwaitingWorkers, ClosingAggregator)
                | (ClosingAggregator, AwaitingAggregatorFlush)
                | (AwaitingAggregatorFlush, Reporting)
                | (Reporting, Done)
        )
    }
}

impl fmt::Display for DrainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DrainState::Listing => "LISTING",
            DrainState::Dispatching => "DISPATCHING",
            DrainState::AwaitingWorkers => "AWAITING_WORKERS",
            DrainState::ClosingAggregator => "CLOSING_AGGREGATOR",
            DrainState::AwaitingAggregatorFlush => "AWAITING_AGGREGATOR_FLUSH",
            DrainState::Reporting => "REPORTING",
            DrainState::Done => "DONE",
        };
        write!(f, "{s}")
    }
}

/// Current state plus transition logging
struct StateTracker {
    current: Option<DrainState>,
}

impl StateTracker {
    fn new() -> Self {
        Self { current: None }
    }

    fn enter(&mut self, next: DrainState) {
        if let Some(current) = self.current {
            if current == next {
                return;
            }
            debug_assert!(
                current.can_advance_to(next),
                "illegal drain transition {current} -> {next}"
            );
            debug!(from = %current, to = %next, "Drain state transition");
        } else {
            debug!(to = %next, "Drain state entered");
        }
        self.current = Some(next);
    }
}

/// Outstanding work during listing and dispatch
struct Dispatch {
    aggregator: ResultAggregator,
    workers: JoinSet<()>,
    dispatched: u64,
}

impl Dispatch {
    fn new(aggregator: ResultAggregator) -> Self {
        Self {
            aggregator,
            workers: JoinSet::new(),
            dispatched: 0,
        }
    }

    /// Take a slot, then spawn a worker that reports exactly one outcome
    async fn dispatch(
        &mut self,
        gate: &AdmissionGate,
        worker: Arc<FetchWorker>,
        job: FetchJob,
    ) -> Result<(), RunError> {
        let permit = gate.acquire().await?;
        let reporter = self.aggregator.reporter();

        self.workers.spawn(async move {
            let key = job.key.clone();
            let outcome = AssertUnwindSafe(worker.run(&job))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    error!(key = %key, "Fetch worker panicked");
                    Outcome::Failed(key)
                });
            permit.release();
            debug!(key = %outcome.key(), success = outcome.is_success(), "Job finished");
            reporter.report(outcome);
        });
        self.dispatched += 1;
        Ok(())
    }

    /// Join every worker, then reclaim every slot as a barrier
    async fn await_workers(mut self, gate: &AdmissionGate) -> Result<WorkersDrained, RunError> {
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Fetch task did not complete");
            }
        }
        let barrier = gate.drain().await?;
        debug!(capacity = gate.capacity(), "All admission slots reclaimed");
        drop(barrier);

        Ok(WorkersDrained {
            aggregator: self.aggregator,
            dispatched: self.dispatched,
        })
    }
}

/// Every worker has returned; the aggregator may now be closed
struct WorkersDrained {
    aggregator: ResultAggregator,
    dispatched: u64,
}

/// Orchestrates a full fetch run
pub struct DrainCoordinator {
    store: Arc<dyn RemoteStore>,
    filter: KeyFilter,
    gate: AdmissionGate,
    worker: Arc<FetchWorker>,
    progress: ProgressBar,
}

impl DrainCoordinator {
    /// Create a coordinator. Fails if `settings` are out of range.
    pub fn new(
        store: Arc<dyn RemoteStore>,
        filter: KeyFilter,
        settings: FetchSettings,
    ) -> Result<Self, RunError> {
        settings.validate()?;
        let gate = AdmissionGate::new(settings.concurrency)?;
        let worker = Arc::new(FetchWorker::new(
            store.clone(),
            settings.retry,
            settings.output_root,
        ));

        Ok(Self {
            store,
            filter,
            gate,
            worker,
            progress: ProgressBar::hidden(),
        })
    }

    /// Show progress on `progress`: length grows on dispatch, position on outcome
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Admission gate shared by this coordinator's workers
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Fetch every matching object of `partitions` and report totals.
    ///
    /// A listing failure stops further dispatch; already dispatched jobs are
    /// drained and returned in [`RunError::Listing`] instead of a report.
    pub async fn run(&self, partitions: &[Partition]) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let mut state = StateTracker::new();
        let mut dispatch = Dispatch::new(ResultAggregator::start(self.progress.clone()));
        let mut partitions_processed = 0usize;
        let mut abort: Option<(String, StoreError)> = None;
        let mut gate_failure: Option<RunError> = None;

        'partitions: for partition in partitions {
            state.enter(DrainState::Listing);
            let keys = match self.select_keys(partition).await {
                Ok(keys) => keys,
                Err(e) => {
                    error!(partition = %partition.code, error = %e, "Failed to list objects");
                    abort = Some((partition.code.clone(), e));
                    break;
                }
            };

            state.enter(DrainState::Dispatching);
            for key in keys {
                self.progress.inc_length(1);
                let job = FetchJob::new(key, partition.code.clone());
                if let Err(e) = dispatch.dispatch(&self.gate, self.worker.clone(), job).await {
                    gate_failure = Some(e);
                    break 'partitions;
                }
            }
            partitions_processed += 1;
        }

        info!(
            dispatched = dispatch.dispatched,
            "All files sent to be downloaded. Waiting for completion..."
        );
        state.enter(DrainState::AwaitingWorkers);
        let drained = dispatch.await_workers(&self.gate).await?;

        info!("All download jobs completed, closing outcome collectors");
        state.enter(DrainState::ClosingAggregator);
        let closing = drained.aggregator.close();

        state.enter(DrainState::AwaitingAggregatorFlush);
        let totals = closing.flush().await?;
        self.progress.finish_and_clear();

        if totals.total() != drained.dispatched {
            error!(
                dispatched = drained.dispatched,
                collected = totals.total(),
                "Outcome count does not match dispatched jobs"
            );
        }

        if let Some(e) = gate_failure {
            return Err(e);
        }
        if let Some((partition, source)) = abort {
            return Err(listing_error(partition, source, totals));
        }

        state.enter(DrainState::Reporting);
        let report = RunReport::new(
            partitions_processed,
            drained.dispatched,
            totals,
            started.elapsed(),
        );
        state.enter(DrainState::Done);
        Ok(report)
    }

    /// List a partition and keep the keys that match the filter
    async fn select_keys(&self, partition: &Partition) -> Result<Vec<String>, StoreError> {
        let prefix = partition.delta_prefix(self.filter.base_prefix());
        info!(partition = %partition.code, prefix = %prefix, "Listing partition");

        let mut listed = self.store.list(&prefix).await?;
        listed.sort();
        info!(partition = %partition.code, count = listed.len(), "Number of objects");

        let selected: Vec<String> = listed
            .iter()
            .inspect(|key| debug!(key = %key, "Listed"))
            .filter(|key| self.filter.matches(key, &partition.code))
            .cloned()
            .collect();

        record_listing(&partition.code, listed.len(), selected.len());
        info!(
            partition = %partition.code,
            matched = selected.len(),
            date = %self.filter.date(),
            "Selected objects for download"
        );
        Ok(selected)
    }
}

fn listing_error(partition: String, source: StoreError, accounted: AggregateTotals) -> RunError {
    RunError::Listing {
        partition,
        source,
        accounted,
    }
}
