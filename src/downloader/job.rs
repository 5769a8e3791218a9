//! Fetch jobs and their outcomes

use serde::Serialize;
use std::path::{Component, Path, PathBuf};

use super::FetchError;

/// One remote key selected for download in the current run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    /// Remote object key
    pub key: String,
    /// Code of the partition the key was listed under
    pub partition: String,
}

impl FetchJob {
    /// Create a job for `key` listed under `partition`
    pub fn new(key: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            partition: partition.into(),
        }
    }

    /// Local path mirroring the key under `root`.
    ///
    /// Rejects keys that are empty, absolute, or that would escape `root`.
    pub fn local_path(&self, root: &Path) -> Result<PathBuf, FetchError> {
        let relative = Path::new(&self.key);
        let invalid = self.key.is_empty()
            || self.key.ends_with('/')
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));

        if invalid {
            return Err(FetchError::InvalidKey(self.key.clone()));
        }
        Ok(root.join(relative))
    }
}

/// Terminal result of a job. Produced exactly once per dispatched job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Object downloaded
    Success(String),
    /// Attempts exhausted (or key unusable)
    Failed(String),
}

impl Outcome {
    /// Key the outcome refers to
    pub fn key(&self) -> &str {
        match self {
            Outcome::Success(key) | Outcome::Failed(key) => key,
        }
    }

    /// Whether this is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}
