//! The persistent similarity index over a catalog.
//!
//! A [`VectorIndex`] is either empty or populated. `build` and `load` replace
//! the whole state at once; nothing is ever updated in place. Row `i` of the
//! vector store pairs with `items[i]` from build time, through persistence,
//! to every search result.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::CatalogItem;
use crate::config::IndexConfig;
use crate::vector::backend::{BackendKind, FlatMatrix, SearchBackend, load_backend, make_backend};
use crate::vector::metadata::{IndexMetadata, get_utc_timestamp};
use crate::vector::storage::{ArtifactPaths, remove_if_exists};
use crate::vector::{
    HASHING_EMBEDDER_NAME, RowId, VectorDimension, VectorError, VectorResult, normalize_in_place,
};

/// A ranked match returned by [`VectorIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub item: CatalogItem,
    pub score: f32,
    pub row: RowId,
}

/// Summary of a populated index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexInfo {
    pub path: PathBuf,
    pub count: usize,
    pub dimension: usize,
    pub backend: BackendKind,
    pub embedder: String,
    pub created_at: u64,
}

#[derive(Debug)]
struct Populated {
    backend: Box<dyn SearchBackend>,
    items: Vec<CatalogItem>,
    embedder: String,
    created_at: u64,
}

/// Vector index bound to a base path and a fixed dimension.
///
/// Searches take `&self` and may run concurrently. `build` and `load` take
/// `&mut self`; callers that share an index swap whole snapshots instead.
#[derive(Debug)]
pub struct VectorIndex {
    paths: ArtifactPaths,
    dimension: VectorDimension,
    backend_kind: BackendKind,
    embedder_name: String,
    state: Option<Populated>,
}

impl VectorIndex {
    /// Create an empty index rooted at `path`.
    #[must_use]
    pub fn new(path: &Path, dimension: VectorDimension, backend_kind: BackendKind) -> Self {
        Self {
            paths: ArtifactPaths::new(path),
            dimension,
            backend_kind,
            embedder_name: HASHING_EMBEDDER_NAME.to_string(),
            state: None,
        }
    }

    /// Create an empty index from the `[index]` settings section.
    pub fn from_config(config: &IndexConfig) -> VectorResult<Self> {
        let dimension = VectorDimension::new(config.dimension)?;
        let backend_kind = BackendKind::detect(&config.backend)?;
        Ok(Self::new(&config.path, dimension, backend_kind))
    }

    /// Name recorded in the metadata of the next build.
    pub fn set_embedder_name(&mut self, name: impl Into<String>) {
        self.embedder_name = name.into();
    }

    #[must_use]
    pub fn with_embedder_name(mut self, name: impl Into<String>) -> Self {
        self.set_embedder_name(name);
        self
    }

    /// Replace the index with `vectors` and their `items`, then save.
    ///
    /// Rows are normalized to unit length (zero rows stay zero) so inner
    /// product equals cosine similarity. Validation happens before any state
    /// changes. If the save fails, the new state is kept in memory and the
    /// save error is returned.
    pub fn build(&mut self, vectors: &[Vec<f32>], items: Vec<CatalogItem>) -> VectorResult<()> {
        if vectors.len() != items.len() {
            return Err(VectorError::LengthMismatch {
                vectors: vectors.len(),
                metadata: items.len(),
            });
        }

        let dim = self.dimension.get();
        let mut data = Vec::with_capacity(vectors.len() * dim);
        for (row, vector) in vectors.iter().enumerate() {
            self.dimension.validate_vector(vector)?;
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(VectorError::NonFiniteComponent { row });
            }
            let start = data.len();
            data.extend_from_slice(vector);
            normalize_in_place(&mut data[start..]);
        }

        let matrix = FlatMatrix::new(data, self.dimension, vectors.len())?;
        self.state = Some(Populated {
            backend: make_backend(self.backend_kind, matrix),
            items,
            embedder: self.embedder_name.clone(),
            created_at: get_utc_timestamp(),
        });

        tracing::info!(
            "Built {} index with {} vectors (dimension {dim})",
            self.backend_kind,
            vectors.len()
        );

        self.save()
    }

    /// Persist the vector store, then the metadata.
    ///
    /// The metadata records the backend and a fingerprint of the rows. If
    /// the metadata write fails after the store was replaced, the metadata
    /// left on disk names a different fingerprint and `load` rejects the
    /// pair instead of matching rows to the wrong items. The other
    /// backend's vector store is removed afterwards.
    pub fn save(&self) -> VectorResult<()> {
        let state = self.state.as_ref().ok_or(VectorError::EmptyIndex)?;

        let written = state.backend.save(&self.paths)?;

        let metadata = IndexMetadata::new(
            self.dimension.get(),
            state.backend.kind(),
            state.backend.matrix().fingerprint(),
            state.embedder.clone(),
            state.created_at,
            state.items.clone(),
        );
        metadata.save(&self.paths.meta)?;

        let stale = match state.backend.kind() {
            BackendKind::Native => &self.paths.dense,
            BackendKind::Dense => &self.paths.native,
        };
        remove_if_exists(stale)?;

        tracing::info!(
            "Saved index to {} ({} items)",
            written.display(),
            state.items.len()
        );
        Ok(())
    }

    /// Replace the index with the persisted artifacts at its path.
    ///
    /// Metadata is read first, then the vector store of the backend it
    /// names. The store must match the recorded dimension, row count and
    /// fingerprint. The in-memory state changes only if every check passes.
    pub fn load(&mut self) -> VectorResult<()> {
        let metadata = IndexMetadata::load(&self.paths.meta)?;
        if metadata.dimension != self.dimension.get() {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension.get(),
                actual: metadata.dimension,
            });
        }

        let backend = load_backend(&self.paths, metadata.backend)?;
        let matrix = backend.matrix();
        if matrix.dimension() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension.get(),
                actual: matrix.dimension().get(),
            });
        }
        if matrix.rows() != metadata.items.len() {
            return Err(VectorError::CorruptArtifact {
                path: self.paths.meta.clone(),
                reason: format!(
                    "{} metadata records for {} vector rows",
                    metadata.items.len(),
                    matrix.rows()
                ),
            });
        }
        if matrix.fingerprint() != metadata.fingerprint {
            return Err(VectorError::CorruptArtifact {
                path: self.paths.meta.clone(),
                reason: "Metadata fingerprint does not match the vector store; \
                         the two files come from different builds"
                    .to_string(),
            });
        }
        if let Some(position) = matrix.as_slice().iter().position(|v| !v.is_finite()) {
            return Err(VectorError::NonFiniteComponent {
                row: position / self.dimension.get(),
            });
        }

        tracing::info!(
            "Loaded {} index with {} items from {}",
            backend.kind(),
            metadata.items.len(),
            self.paths.meta.display()
        );

        self.state = Some(Populated {
            backend,
            items: metadata.items,
            embedder: metadata.embedder,
            created_at: metadata.created_at,
        });
        Ok(())
    }

    /// Top `k` items by cosine similarity to `query`, best first.
    ///
    /// Equal scores are ordered by ascending row. An empty index yields an
    /// empty result; a query of the wrong dimension is an error.
    pub fn search(&self, query: &[f32], k: usize) -> VectorResult<Vec<SearchResult>> {
        self.dimension.validate_vector(query)?;
        if query.iter().any(|v| !v.is_finite()) {
            return Err(VectorError::NonFiniteComponent { row: 0 });
        }

        let state = match &self.state {
            Some(state) if !state.backend.is_empty() => state,
            _ => {
                tracing::debug!("Search on empty index at {}", self.paths.native.display());
                return Ok(Vec::new());
            }
        };

        let mut query = query.to_vec();
        normalize_in_place(&mut query);

        let k = k.min(state.backend.len());
        state
            .backend
            .top_k(&query, k)?
            .into_iter()
            .map(|hit| {
                let item = state.items.get(hit.row.as_index()).ok_or(
                    VectorError::LengthMismatch {
                        vectors: state.backend.len(),
                        metadata: state.items.len(),
                    },
                )?;
                Ok(SearchResult {
                    item: item.clone(),
                    score: hit.score.get(),
                    row: hit.row,
                })
            })
            .collect()
    }

    /// Number of indexed items; zero when empty.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |state| state.items.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `build` or `load` has succeeded on this instance.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.state.is_some()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Base path of the index artifacts.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.paths.native
    }

    #[must_use]
    pub fn artifact_paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Items in row order.
    #[must_use]
    pub fn items(&self) -> &[CatalogItem] {
        self.state.as_ref().map_or(&[], |state| &state.items)
    }

    #[must_use]
    pub fn info(&self) -> Option<IndexInfo> {
        self.state.as_ref().map(|state| IndexInfo {
            path: self.paths.native.clone(),
            count: state.items.len(),
            dimension: self.dimension.get(),
            backend: state.backend.kind(),
            embedder: state.embedder.clone(),
            created_at: state.created_at,
        })
    }
}
