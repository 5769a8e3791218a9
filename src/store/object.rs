//! [`RemoteStore`] backed by the `object_store` crate

use super::{LocalWriter, RemoteStore, StoreError, StoreResult};
use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::ObjectStore;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Remote store wrapping any [`ObjectStore`]
#[derive(Clone)]
pub struct ObjectStoreRemote {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreRemote {
    /// Wrap an existing object store
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Build an S3 store for `bucket` in `region`.
    ///
    /// Credentials are read from the standard `AWS_*` environment variables.
    /// `endpoint` points the client at an S3-compatible service instead of AWS.
    pub fn s3(region: &str, bucket: &str, endpoint: Option<&str>) -> StoreResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket);

        if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
            let endpoint_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://")
            {
                endpoint.to_string()
            } else {
                format!("https://{endpoint}")
            };
            builder = builder
                .with_allow_http(endpoint_url.starts_with("http://"))
                .with_endpoint(endpoint_url);
        }

        let store = builder
            .build()
            .map_err(|e| StoreError::Configuration(e.to_string()))?;

        info!(region = %region, bucket = %bucket, "Object store client ready");
        Ok(Self::new(Arc::new(store)))
    }
}

#[async_trait]
impl RemoteStore for ObjectStoreRemote {
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let list_err = |e: object_store::Error| StoreError::List {
            prefix: prefix.to_string(),
            message: e.to_string(),
        };
        // Listed keys are returned raw, so prefixes and keys are parsed, not encoded
        let path = Path::parse(prefix).map_err(|e| list_err(e.into()))?;

        let mut keys: Vec<String> = self
            .store
            .list(Some(&path))
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await
            .map_err(list_err)?;

        keys.sort();
        debug!(prefix = %prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    async fn download(&self, key: &str, dest: &mut LocalWriter) -> StoreResult<u64> {
        let get_err = |e: object_store::Error| StoreError::Get {
            key: key.to_string(),
            message: e.to_string(),
        };
        let write_err = |source: std::io::Error| StoreError::Write {
            key: key.to_string(),
            source,
        };

        let location = Path::parse(key).map_err(|e| get_err(e.into()))?;
        let mut stream = self
            .store
            .get(&location)
            .await
            .map_err(get_err)?
            .into_stream();

        let mut written = 0u64;
        while let Some(chunk) = stream.try_next().await.map_err(get_err)? {
            dest.write_all(&chunk).await.map_err(write_err)?;
            written += chunk.len() as u64;
        }
        dest.flush().await.map_err(write_err)?;

        Ok(written)
    }
}
