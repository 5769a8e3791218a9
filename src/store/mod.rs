//! Remote object store access
//!
//! [`RemoteStore`] is the seam between the orchestrator and the object store.
//! The production implementation is [`ObjectStoreRemote`]; tests substitute
//! scripted stores.

use async_trait::async_trait;
use tokio::io::AsyncWrite;

pub mod object;

pub use object::ObjectStoreRemote;

/// Object store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store could not be configured
    #[error("store configuration error: {0}")]
    Configuration(String),

    /// Listing under a prefix failed
    #[error("failed to list objects under '{prefix}': {message}")]
    List {
        /// Prefix being listed
        prefix: String,
        /// Error reported by the store
        message: String,
    },

    /// Reading an object failed
    #[error("failed to read object '{key}': {message}")]
    Get {
        /// Object key
        key: String,
        /// Error reported by the store
        message: String,
    },

    /// Writing to the local destination failed
    #[error("failed to write object '{key}' locally: {source}")]
    Write {
        /// Object key
        key: String,
        /// Underlying IO error
        source: std::io::Error,
    },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Local destination a transfer writes into
pub type LocalWriter = dyn AsyncWrite + Send + Unpin;

/// Object store used by the orchestrator. Bound to a single bucket.
///
/// Implementations are shared read-only across concurrent workers.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List every key under `prefix`
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Stream the object at `key` into `dest`, returning bytes written
    async fn download(&self, key: &str, dest: &mut LocalWriter) -> StoreResult<u64>;
}
