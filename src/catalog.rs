//! Partition catalog loading
//!
//! The catalog is a headerless delimited file of `code,name` records. Any
//! problem opening or parsing it is fatal to the run: a partial partition list
//! is never returned.

use crate::Partition;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// File could not be opened
    #[error("could not open partition list {path}: {source}")]
    Open {
        /// Path of the catalog file
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Record could not be read
    #[error("could not read partition list: {0}")]
    Read(#[from] csv::Error),

    /// Record is missing fields or has an empty code
    #[error("malformed partition record on line {line}: {reason}")]
    Malformed {
        /// 1-based line number
        line: u64,
        /// What is wrong with the record
        reason: String,
    },
}

/// Loader for the partition list
pub struct PartitionCatalog;

impl PartitionCatalog {
    /// Load partitions from a file path
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<Partition>, CatalogError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| CatalogError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let partitions = Self::from_reader(file)?;
        debug!(
            path = %path.display(),
            count = partitions.len(),
            "Loaded partition list"
        );
        Ok(partitions)
    }

    /// Parse partitions from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Partition>, CatalogError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut partitions = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let (code, name) = match (record.get(0), record.get(1)) {
                (Some(code), Some(name)) => (code, name),
                _ => {
                    return Err(CatalogError::Malformed {
                        line,
                        reason: format!("expected 2 fields, found {}", record.len()),
                    })
                }
            };

            if code.is_empty() {
                return Err(CatalogError::Malformed {
                    line,
                    reason: "partition code is empty".to_string(),
                });
            }

            if code.contains('/') {
                return Err(CatalogError::Malformed {
                    line,
                    reason: format!("partition code {code:?} contains '/'"),
                });
            }

            partitions.push(Partition::new(code, name));
        }

        Ok(partitions)
    }
}
