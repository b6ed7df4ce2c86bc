//! Text embedding and nearest-neighbor search over a catalog.
//!
//! This module provides the core of the recommendation engine: embedders
//! that turn text into fixed-dimension vectors, and a persistent
//! [`VectorIndex`] answering top-k cosine-similarity queries.
//!
//! # Architecture
//! Vectors are unit-normalized at build time, so search is a plain inner
//! product. Two interchangeable backends hold the matrix: a rayon-parallel
//! native store (feature `native-index`) and a dense `.npy` fallback. Both
//! rank identically, ties broken by ascending row.

mod backend;
mod embedding;
mod index;
mod metadata;
mod npy;
mod storage;
mod types;

// Re-export core types for public API
#[cfg(feature = "native-index")]
pub use backend::NativeFlatBackend;
pub use backend::{
    BackendKind, DenseMatrixBackend, FlatMatrix, Hit, SearchBackend, load_backend, make_backend,
};
pub use embedding::{
    EmbedderKind, EmbeddingGenerator, FastEmbedGenerator, HASHING_EMBEDDER_NAME, HashingEmbedder,
    TextEmbedder, model_to_string, parse_embedding_model, token_bucket,
};
pub use index::{IndexInfo, SearchResult, VectorIndex};
pub use metadata::{IndexMetadata, get_utc_timestamp};
pub use storage::{ArtifactPaths, remove_if_exists, write_atomic};
pub use types::{
    RowId, Score, VECTOR_DIMENSION_384, VectorDimension, VectorError, VectorResult,
    cosine_similarity, inner_product, l2_norm, normalize_in_place,
};
