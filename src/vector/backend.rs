//! Interchangeable search backends.
//!
//! Both backends hold the same unit-normalized row-major matrix and answer
//! the same question: the `k` rows with the highest inner product against a
//! normalized query, ties broken by ascending row. They differ only in how
//! they score (parallel vs. sequential) and in their on-disk format.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::vector::npy::{read_npy, write_npy};
#[cfg(feature = "native-index")]
use crate::vector::storage::write_native;
use crate::vector::storage::{ArtifactPaths, read_native};
use crate::vector::{RowId, Score, VectorDimension, VectorError, VectorResult, inner_product};

/// Which backend holds the vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Parallel flat inner-product index with a native binary format
    Native,
    /// Plain in-memory matrix persisted as `.npy`
    Dense,
}

impl BackendKind {
    /// Whether the native backend was compiled in (`native-index` feature).
    #[must_use]
    pub const fn native_available() -> bool {
        cfg!(feature = "native-index")
    }

    /// Resolve a configured backend name to the backend that will be used.
    ///
    /// This is the only place backend availability is checked. Asking for
    /// `native` without the feature degrades to `Dense` with a warning.
    pub fn detect(requested: &str) -> VectorResult<Self> {
        match requested {
            "auto" => Ok(if Self::native_available() {
                Self::Native
            } else {
                Self::Dense
            }),
            "native" => {
                if Self::native_available() {
                    Ok(Self::Native)
                } else {
                    tracing::warn!(
                        "Native index backend not compiled in (feature 'native-index'), using dense backend"
                    );
                    Ok(Self::Dense)
                }
            }
            "dense" => Ok(Self::Dense),
            other => Err(VectorError::UnknownBackend(other.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Dense => write!(f, "dense"),
        }
    }
}

/// Row-major matrix of unit-normalized vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatMatrix {
    data: Vec<f32>,
    dimension: VectorDimension,
    rows: usize,
}

impl FlatMatrix {
    /// Wraps `data`, which must hold exactly `rows * dimension` values.
    pub fn new(data: Vec<f32>, dimension: VectorDimension, rows: usize) -> VectorResult<Self> {
        if data.len() != rows * dimension.get() {
            return Err(VectorError::DimensionMismatch {
                expected: rows * dimension.get(),
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            dimension,
            rows,
        })
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension.get())
    }

    /// Hex SHA-256 over the shape and the little-endian row bytes.
    ///
    /// Recorded in the index metadata; `load` compares it against the
    /// vector store it reads to tell whether both came from the same save.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.dimension.get() as u64).to_le_bytes());
        hasher.update((self.rows as u64).to_le_bytes());
        for value in &self.data {
            hasher.update(value.to_le_bytes());
        }
        let result = hasher.finalize();
        format!("{result:x}")
    }
}

/// A scored row; `Ord` ranks better hits higher.
///
/// Higher score wins; equal scores prefer the lower row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub row: RowId,
    pub score: Score,
}

impl Ord for Hit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.row.cmp(&self.row))
    }
}

impl PartialOrd for Hit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn hit(row: usize, score: f32) -> VectorResult<Hit> {
    Ok(Hit {
        row: RowId::new(row as u32),
        score: Score::new(score)?,
    })
}

/// Capability shared by the native and dense backends.
pub trait SearchBackend: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> BackendKind;

    fn matrix(&self) -> &FlatMatrix;

    /// Best `k` rows for an already validated, normalized query, best first.
    fn top_k(&self, query: &[f32], k: usize) -> VectorResult<Vec<Hit>>;

    /// Persist the vectors, returning the path written.
    fn save(&self, paths: &ArtifactPaths) -> VectorResult<PathBuf>;

    fn len(&self) -> usize {
        self.matrix().rows()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Plain matrix backend; sequential scan with a bounded min-heap.
#[derive(Debug, Clone)]
pub struct DenseMatrixBackend {
    matrix: FlatMatrix,
}

impl DenseMatrixBackend {
    #[must_use]
    pub fn new(matrix: FlatMatrix) -> Self {
        Self { matrix }
    }

    /// Load from a `.npy` artifact.
    pub fn load(path: &Path) -> VectorResult<Self> {
        let (rows, cols, data) = read_npy(path)?;
        let dimension = VectorDimension::new(cols).map_err(|e| VectorError::CorruptArtifact {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(FlatMatrix::new(data, dimension, rows)?))
    }
}

impl SearchBackend for DenseMatrixBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dense
    }

    fn matrix(&self) -> &FlatMatrix {
        &self.matrix
    }

    fn top_k(&self, query: &[f32], k: usize) -> VectorResult<Vec<Hit>> {
        let keep = k.min(self.matrix.rows());
        if keep == 0 {
            return Ok(Vec::new());
        }

        // Reverse turns the max-heap into a min-heap: the root is the worst kept hit
        let mut heap: BinaryHeap<Reverse<Hit>> = BinaryHeap::with_capacity(keep + 1);
        for (row, vector) in self.matrix.iter_rows().enumerate() {
            let candidate = hit(row, inner_product(query, vector))?;
            if heap.len() < keep {
                heap.push(Reverse(candidate));
            } else if heap.peek().is_some_and(|worst| candidate > worst.0) {
                heap.pop();
                heap.push(Reverse(candidate));
            }
        }

        // Ascending order of Reverse(hit) is descending order of hit
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(best)| best)
            .collect())
    }

    fn save(&self, paths: &ArtifactPaths) -> VectorResult<PathBuf> {
        write_npy(
            &paths.dense,
            self.matrix.rows(),
            self.matrix.dimension().get(),
            self.matrix.as_slice(),
        )?;
        Ok(paths.dense.clone())
    }
}

/// Flat inner-product backend scored in parallel with rayon.
#[cfg(feature = "native-index")]
#[derive(Debug, Clone)]
pub struct NativeFlatBackend {
    matrix: FlatMatrix,
}

#[cfg(feature = "native-index")]
impl NativeFlatBackend {
    #[must_use]
    pub fn new(matrix: FlatMatrix) -> Self {
        Self { matrix }
    }
}

#[cfg(feature = "native-index")]
impl SearchBackend for NativeFlatBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn matrix(&self) -> &FlatMatrix {
        &self.matrix
    }

    fn top_k(&self, query: &[f32], k: usize) -> VectorResult<Vec<Hit>> {
        use rayon::prelude::*;

        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits = self
            .matrix
            .as_slice()
            .par_chunks_exact(self.matrix.dimension().get())
            .enumerate()
            .map(|(row, vector)| hit(row, inner_product(query, vector)))
            .collect::<VectorResult<Vec<Hit>>>()?;

        // Hit's ordering is total, so the unstable sort is still deterministic
        hits.par_sort_unstable_by(|a, b| b.cmp(a));
        hits.truncate(k);
        Ok(hits)
    }

    fn save(&self, paths: &ArtifactPaths) -> VectorResult<PathBuf> {
        write_native(
            &paths.native,
            self.matrix.dimension(),
            self.matrix.rows(),
            self.matrix.as_slice(),
        )?;
        Ok(paths.native.clone())
    }
}

/// Construct the backend for `kind` around `matrix`.
#[must_use]
pub fn make_backend(kind: BackendKind, matrix: FlatMatrix) -> Box<dyn SearchBackend> {
    match kind {
        #[cfg(feature = "native-index")]
        BackendKind::Native => Box::new(NativeFlatBackend::new(matrix)),
        #[cfg(not(feature = "native-index"))]
        BackendKind::Native => Box::new(DenseMatrixBackend::new(matrix)),
        BackendKind::Dense => Box::new(DenseMatrixBackend::new(matrix)),
    }
}

/// Load the vector store written by a `kind` backend.
///
/// Only the store named by `kind` is read, so a leftover file of the other
/// format is never picked up. Without the `native-index` feature a native
/// store is still readable and is served by the dense backend.
pub fn load_backend(
    paths: &ArtifactPaths,
    kind: BackendKind,
) -> VectorResult<Box<dyn SearchBackend>> {
    let matrix = match kind {
        BackendKind::Native => {
            tracing::debug!("Loading native vector store from {}", paths.native.display());
            let (dimension, rows, data) = read_native(&paths.native)?;
            FlatMatrix::new(data, dimension, rows)?
        }
        BackendKind::Dense => {
            tracing::debug!("Loading dense vector store from {}", paths.dense.display());
            DenseMatrixBackend::load(&paths.dense)?.matrix
        }
    };
    Ok(make_backend(kind, matrix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::normalize_in_place;
    use tempfile::TempDir;

    fn matrix(rows: &[Vec<f32>]) -> FlatMatrix {
        let dim = rows[0].len();
        let mut data = Vec::new();
        for row in rows {
            let mut row = row.clone();
            normalize_in_place(&mut row);
            data.extend(row);
        }
        FlatMatrix::new(data, VectorDimension::new(dim).unwrap(), rows.len()).unwrap()
    }

    fn rows_of(hits: &[Hit]) -> Vec<u32> {
        hits.iter().map(|h| h.row.get()).collect()
    }

    #[test]
    fn test_hit_ordering() {
        let a = hit(0, 0.5).unwrap();
        let b = hit(1, 0.5).unwrap();
        let c = hit(2, 0.9).unwrap();
        // Higher score wins, then lower row
        assert!(c > a);
        assert!(a > b);
        // -0.0 and 0.0 tie on score
        assert!(hit(0, -0.0).unwrap() > hit(1, 0.0).unwrap());
    }

    #[test]
    fn test_detect() {
        assert_eq!(BackendKind::detect("dense").unwrap(), BackendKind::Dense);
        let auto = BackendKind::detect("auto").unwrap();
        if BackendKind::native_available() {
            assert_eq!(auto, BackendKind::Native);
        } else {
            assert_eq!(auto, BackendKind::Dense);
        }
        assert!(matches!(
            BackendKind::detect("faiss"),
            Err(VectorError::UnknownBackend(_))
        ));
    }

    #[test]
    fn test_flat_matrix_shape_check() {
        let dim = VectorDimension::new(3).unwrap();
        assert!(FlatMatrix::new(vec![0.0; 5], dim, 2).is_err());
        let m = FlatMatrix::new(vec![0.0; 6], dim, 2).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.as_slice().len(), 6);
    }

    #[test]
    fn test_fingerprint_tracks_rows_and_shape() {
        let a = matrix(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        let swapped = matrix(&[vec![0.0, 1.0], vec![1.0, 0.0]]);
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        assert_ne!(a.fingerprint(), swapped.fingerprint());

        // Same bytes, different shape
        let flat = FlatMatrix::new(vec![1.0, 0.0, 0.0, 1.0], VectorDimension::new(4).unwrap(), 1)
            .unwrap();
        assert_ne!(a.fingerprint(), flat.fingerprint());
    }

    #[test]
    fn test_dense_top_k() {
        let backend = DenseMatrixBackend::new(matrix(&[
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
        ]));
        let hits = backend.top_k(&[1.0, 0.0], 2).unwrap();
        assert_eq!(rows_of(&hits), vec![0, 2]);
        assert!((hits[0].score.get() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dense_ties_by_row() {
        let backend = DenseMatrixBackend::new(matrix(&[
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
        ]));
        let hits = backend.top_k(&[1.0, 0.0], 4).unwrap();
        assert_eq!(rows_of(&hits), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_k_larger_than_rows_and_zero_k() {
        let backend = DenseMatrixBackend::new(matrix(&[vec![1.0, 0.0], vec![0.0, 1.0]]));
        assert_eq!(backend.top_k(&[1.0, 0.0], 10).unwrap().len(), 2);
        assert_eq!(backend.top_k(&[1.0, 0.0], 1 << 40).unwrap().len(), 2);
        assert_eq!(backend.top_k(&[1.0, 0.0], usize::MAX).unwrap().len(), 2);
        assert!(backend.top_k(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dense_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::new(&temp_dir.path().join("index.bin"));
        let backend = DenseMatrixBackend::new(matrix(&[vec![3.0, 4.0], vec![1.0, 0.0]]));

        let written = backend.save(&paths).unwrap();
        assert_eq!(written, paths.dense);
        assert!(!paths.native.exists());

        let loaded = load_backend(&paths, BackendKind::Dense).unwrap();
        assert_eq!(loaded.kind(), BackendKind::Dense);
        assert_eq!(loaded.matrix(), backend.matrix());
    }

    #[test]
    fn test_load_backend_missing() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::new(&temp_dir.path().join("index.bin"));
        for kind in [BackendKind::Dense, BackendKind::Native] {
            assert!(matches!(
                load_backend(&paths, kind),
                Err(VectorError::MissingArtifact { .. })
            ));
        }
    }

    #[cfg(feature = "native-index")]
    #[test]
    fn test_native_matches_dense() {
        let m = matrix(&[
            vec![0.2, 0.9, 0.1],
            vec![0.9, 0.1, 0.0],
            vec![0.2, 0.9, 0.1],
            vec![0.0, 0.0, 1.0],
            vec![0.5, 0.5, 0.5],
        ]);
        let native = NativeFlatBackend::new(m.clone());
        let dense = DenseMatrixBackend::new(m);

        let mut query = vec![0.3, 0.8, 0.2];
        normalize_in_place(&mut query);
        for k in 0..=6 {
            let a = native.top_k(&query, k).unwrap();
            let b = dense.top_k(&query, k).unwrap();
            assert_eq!(a, b, "k = {k}");
        }
    }

    #[cfg(feature = "native-index")]
    #[test]
    fn test_native_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::new(&temp_dir.path().join("index.bin"));
        let backend = NativeFlatBackend::new(matrix(&[vec![1.0, 2.0], vec![2.0, 1.0]]));

        assert_eq!(backend.save(&paths).unwrap(), paths.native);

        let loaded = load_backend(&paths, BackendKind::Native).unwrap();
        assert_eq!(loaded.kind(), BackendKind::Native);
        assert_eq!(loaded.matrix(), backend.matrix());

        // The dense store is not consulted for a native load, and vice versa
        assert!(matches!(
            load_backend(&paths, BackendKind::Dense),
            Err(VectorError::MissingArtifact { .. })
        ));
    }

    #[cfg(feature = "native-index")]
    #[test]
    fn test_native_top_k_huge_k() {
        let backend = NativeFlatBackend::new(matrix(&[vec![1.0, 0.0], vec![0.0, 1.0]]));
        assert_eq!(backend.top_k(&[1.0, 0.0], usize::MAX).unwrap().len(), 2);
    }

    #[test]
    fn test_make_backend_dense() {
        let backend = make_backend(BackendKind::Dense, matrix(&[vec![1.0]]));
        assert_eq!(backend.kind(), BackendKind::Dense);
        assert_eq!(backend.len(), 1);
        assert!(!backend.is_empty());
    }
}
