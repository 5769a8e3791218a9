//! Single-object fetch with retry

use super::config::RetryPolicy;
use super::job::{FetchJob, Outcome};
use super::FetchError;
use crate::metrics::{record_retry_backoff, FetchMetrics};
use crate::store::RemoteStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Downloads one object at a time into the output root
///
/// Attempts run strictly one after another for a given job; a worker never
/// overlaps attempts for the same key.
pub struct FetchWorker {
    store: Arc<dyn RemoteStore>,
    retry: RetryPolicy,
    output_root: PathBuf,
}

impl FetchWorker {
    /// Create a worker writing under `output_root`
    pub fn new(store: Arc<dyn RemoteStore>, retry: RetryPolicy, output_root: PathBuf) -> Self {
        Self {
            store,
            retry,
            output_root,
        }
    }

    /// Fetch `job`, retrying per policy. Always returns exactly one outcome.
    pub async fn run(&self, job: &FetchJob) -> Outcome {
        let metrics = FetchMetrics::start(&job.partition);

        let path = match job.local_path(&self.output_root) {
            Ok(path) => path,
            Err(e) => {
                error!(key = %job.key, error = %e, "Refusing to fetch key");
                metrics.record_failure(0);
                return Outcome::Failed(job.key.clone());
            }
        };

        let max_attempts = self.retry.max_attempts;
        let mut attempt = 0;
        loop {
            attempt += 1;
            info!(key = %job.key, attempt, max_attempts, "Downloading");

            match self.attempt(&job.key, &path).await {
                Ok(bytes) => {
                    info!(key = %job.key, bytes, attempt, "Successfully downloaded");
                    metrics.record_success(bytes, attempt);
                    return Outcome::Success(job.key.clone());
                }
                Err(e) => {
                    metrics.record_attempt_failure();
                    warn!(
                        key = %job.key,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Download attempt failed"
                    );

                    if !self.retry.should_retry(attempt) {
                        break;
                    }

                    info!(
                        key = %job.key,
                        backoff_ms = self.retry.backoff.as_millis(),
                        "Failed, going to sleep before retrying"
                    );
                    record_retry_backoff(self.retry.backoff, attempt);
                    tokio::time::sleep(self.retry.backoff).await;
                }
            }
        }

        remove_partial(&path).await;
        error!(key = %job.key, attempts = attempt, "Giving up on object");
        metrics.record_failure(attempt);
        Outcome::Failed(job.key.clone())
    }

    /// One attempt: create the directory, create the file, transfer
    async fn attempt(&self, key: &str, path: &Path) -> Result<u64, FetchError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| FetchError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|source| FetchError::CreateFile {
                path: path.to_path_buf(),
                source,
            })?;

        let bytes = self.store.download(key, &mut file).await?;
        Ok(bytes)
    }
}

/// Best-effort removal of a partially written file
async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove partial file"),
    }
}
