//! CLI error types and conversions

use crate::catalog::CatalogError;
use crate::downloader::RunError;
use crate::store::StoreError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Partition list could not be loaded
    #[error("catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    /// Object store could not be configured
    #[error("store error: {0}")]
    StoreError(#[from] StoreError),

    /// Run aborted
    #[error("run error: {0}")]
    RunError(#[from] RunError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
