//! Type-safe wrappers and core types for the vector index.
//!
//! Newtypes here keep dimensions, row positions and scores from being
//! confused with plain integers and floats at the API boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Standard embedding dimension (all-MiniLM-L6-v2 and the hashing embedder).
pub const VECTOR_DIMENSION_384: usize = 384;

/// Position of a vector inside an index.
///
/// Row `i` of the vector store always pairs with metadata record `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u32);

impl RowId {
    /// Creates a row id from a zero-based position.
    #[must_use]
    pub const fn new(row: u32) -> Self {
        Self(row)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the row as a slice index.
    #[must_use]
    pub const fn as_index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cosine similarity score.
///
/// Nominally in `[-1.0, 1.0]`; rounding can push a self-match a few ulps
/// past 1.0, so only NaN is rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score(f32);

impl Score {
    /// Creates a new `Score`, rejecting NaN.
    pub fn new(value: f32) -> Result<Self, VectorError> {
        if value.is_nan() {
            return Err(VectorError::InvalidScore {
                value,
                reason: "Score cannot be NaN",
            });
        }
        Ok(Self(value))
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // NaN is rejected by `new`, so only -0.0 vs 0.0 reaches the fallback
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

/// Type-safe wrapper for vector dimensions.
///
/// Fixed when an index or embedder is constructed and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        if u32::try_from(dim).is_err() {
            return Err(VectorError::InvalidDimension {
                dimension: dim,
                reason: "Vector dimension must fit in 32 bits",
            });
        }
        Ok(Self(dim))
    }

    /// Creates a standard 384-dimensional vector dimension.
    #[must_use]
    pub const fn dimension_384() -> Self {
        Self(VECTOR_DIMENSION_384)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl Default for VectorDimension {
    fn default() -> Self {
        Self::dimension_384()
    }
}

/// Errors that can occur during vector operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error(
        "Vector/metadata length mismatch: {vectors} vectors but {metadata} metadata records\nSuggestion: Pass exactly one metadata record per vector, in the same order"
    )]
    LengthMismatch { vectors: usize, metadata: usize },

    #[error(
        "Non-finite component in row {row}\nSuggestion: Check the embedding model output for NaN or infinite values"
    )]
    NonFiniteComponent { row: usize },

    #[error("Invalid score value: {value}\nReason: {reason}")]
    InvalidScore { value: f32, reason: &'static str },

    #[error("Index artifact not found: {}\nSuggestion: Run 'kitmatch build' to create the index", .path.display())]
    MissingArtifact { path: PathBuf },

    #[error(
        "Index artifact is corrupted: {} ({reason})\nSuggestion: Rebuild the index with 'kitmatch build'", .path.display()
    )]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("Storage error: {0}\nSuggestion: Check disk space and file permissions")]
    Storage(#[from] std::io::Error),

    #[error(
        "Serialization error: {0}\nSuggestion: Check that index metadata is valid and not corrupted"
    )]
    Serialization(String),

    #[error(
        "Failed to initialize embedding model: {0}\nSuggestion: Check network access for the first model download, or set embedding.provider = \"hashing\""
    )]
    ModelInit(String),

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Verify the embedding model is properly initialized"
    )]
    EmbeddingFailed(String),

    #[error("Index is empty: it has not been built or loaded\nSuggestion: Call build() or load() first")]
    EmptyIndex,

    #[error(
        "Unknown search backend '{0}'\nSuggestion: Use one of: auto, native, dense"
    )]
    UnknownBackend(String),

    #[error(
        "Invalid storage version: expected at most {expected}, got {actual}\nSuggestion: Rebuild the index or upgrade kitmatch"
    )]
    VersionMismatch { expected: u32, actual: u32 },
}

/// Result type alias for vector operations
pub type VectorResult<T> = Result<T, VectorError>;

/// Computes the Euclidean norm of a vector.
///
/// Squares are summed in f64, so large finite components do not overflow.
#[must_use]
pub fn l2_norm(vector: &[f32]) -> f32 {
    l2_norm_f64(vector) as f32
}

fn l2_norm_f64(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

/// Scales a vector to unit length in place.
///
/// Zero vectors are left untouched. Any finite input yields a finite unit
/// vector, even when its norm does not fit in an f32.
pub fn normalize_in_place(vector: &mut [f32]) {
    let norm = l2_norm_f64(vector);
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value = (f64::from(*value) / norm) as f32;
        }
    }
}

/// Inner product of two equal-length vectors.
#[must_use]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity between two vectors; 0.0 if either has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let magnitude_a = l2_norm(a);
    let magnitude_b = l2_norm(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    inner_product(a, b) / (magnitude_a * magnitude_b)
}
