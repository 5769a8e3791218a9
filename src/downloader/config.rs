//! Fetch configuration constants and settings

use super::FetchSettingsError;
use std::path::PathBuf;
use std::time::Duration;

/// Default maximum download attempts per object.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Upper bound accepted for max attempts.
pub const MAX_ATTEMPTS_LIMIT: u32 = 100;

/// Fixed delay between attempts on the same object.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(10);

/// Default number of objects fetched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Upper bound accepted for the concurrency cap.
pub const MAX_CONCURRENCY: usize = 256;

/// Retry policy applied by every fetch worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before an object is recorded as failed (`>= 1`)
    pub max_attempts: u32,
    /// Sleep between consecutive attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with `max_attempts` and a fixed `backoff`
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Whether another attempt follows failed attempt number `attempt` (1-indexed)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Settings for one fetch run
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Maximum concurrent fetch workers (`>= 1`)
    pub concurrency: usize,
    /// Per-object retry policy
    pub retry: RetryPolicy,
    /// Local directory under which remote keys are mirrored
    pub output_root: PathBuf,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            output_root: PathBuf::from("."),
        }
    }
}

impl FetchSettings {
    /// Set the concurrency cap
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the local output root
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Check bounds on concurrency and attempts
    pub fn validate(&self) -> Result<(), FetchSettingsError> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(FetchSettingsError::Concurrency(self.concurrency));
        }
        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(FetchSettingsError::MaxAttempts(self.retry.max_attempts));
        }
        Ok(())
    }
}
