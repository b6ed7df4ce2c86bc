//! The `<path>.meta` artifact: ordered item records plus index facts.
//!
//! `items[i]` describes vector row `i`. The count, dimension and a SHA-256
//! fingerprint of the rows are stored alongside so `load` can detect a
//! metadata file that does not belong to the vector store next to it.

use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogItem;
use crate::vector::storage::write_atomic;
use crate::vector::{BackendKind, VectorError, VectorResult};

/// Seconds since the Unix epoch.
#[must_use]
pub fn get_utc_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Serialized form of an index's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Version of the metadata format
    pub version: u32,

    /// Dimension of every stored vector
    pub dimension: usize,

    /// Number of vector rows (and items)
    pub count: usize,

    /// Backend that wrote the vector store; `load` reads only that store
    pub backend: BackendKind,

    /// Fingerprint of the vector rows this metadata was saved with
    pub fingerprint: String,

    /// Embedder that produced the vectors
    pub embedder: String,

    /// Unix timestamp of the build
    pub created_at: u64,

    /// One record per vector row, in row order
    pub items: Vec<CatalogItem>,
}

impl IndexMetadata {
    /// Current metadata version
    pub const CURRENT_VERSION: u32 = 1;

    #[must_use]
    pub fn new(
        dimension: usize,
        backend: BackendKind,
        fingerprint: String,
        embedder: String,
        created_at: u64,
        items: Vec<CatalogItem>,
    ) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            dimension,
            count: items.len(),
            backend,
            fingerprint,
            embedder,
            created_at,
            items,
        }
    }

    /// Save metadata as JSON via an atomic rename.
    pub fn save(&self, path: &Path) -> VectorResult<()> {
        let json = serde_json::to_vec(self)
            .map_err(|e| VectorError::Serialization(format!("Failed to serialize metadata: {e}")))?;
        write_atomic(path, |writer| writer.write_all(&json))
    }

    /// Load metadata, checking version and internal consistency.
    pub fn load(path: &Path) -> VectorResult<Self> {
        if !path.exists() {
            return Err(VectorError::MissingArtifact {
                path: path.to_path_buf(),
            });
        }

        let bytes = std::fs::read(path)?;
        let metadata: Self =
            serde_json::from_slice(&bytes).map_err(|e| VectorError::CorruptArtifact {
                path: path.to_path_buf(),
                reason: format!("Failed to parse metadata: {e}"),
            })?;

        if metadata.version > Self::CURRENT_VERSION {
            return Err(VectorError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                actual: metadata.version,
            });
        }

        if metadata.items.len() != metadata.count {
            return Err(VectorError::CorruptArtifact {
                path: path.to_path_buf(),
                reason: format!(
                    "Metadata lists {} items but records count {}",
                    metadata.items.len(),
                    metadata.count
                ),
            });
        }

        Ok(metadata)
    }
}
