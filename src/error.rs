//! Error types for catalog ingestion, index building and recommendations
//!
//! Vector-level failures live in [`crate::vector::VectorError`]; this module
//! wraps them together with the failures of the layers built on top.

use crate::vector::VectorError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for catalog and index operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// File system errors
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Catalog errors
    #[error("Failed to parse catalog '{path}': {reason}")]
    CatalogParse { path: PathBuf, reason: String },

    #[error("Duplicate catalog item id '{id}' at position {position}")]
    DuplicateItemId { id: String, position: usize },

    #[error("Catalog item at position {position} is missing '{field}'")]
    MissingField {
        position: usize,
        field: &'static str,
    },

    /// Vector index and embedding errors
    #[error(transparent)]
    Vector(#[from] VectorError),

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },
}

impl IndexError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::FileWrite { .. } => "FILE_WRITE_ERROR",
            Self::CatalogParse { .. } => "CATALOG_PARSE_ERROR",
            Self::DuplicateItemId { .. } => "DUPLICATE_ITEM_ID",
            Self::MissingField { .. } => "MISSING_FIELD",
            Self::Vector(e) => match e {
                VectorError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
                VectorError::LengthMismatch { .. } => "LENGTH_MISMATCH",
                VectorError::MissingArtifact { .. } => "MISSING_INDEX_ARTIFACT",
                VectorError::CorruptArtifact { .. } | VectorError::VersionMismatch { .. } => {
                    "INDEX_CORRUPTED"
                }
                VectorError::Storage(_) => "PERSISTENCE_ERROR",
                VectorError::ModelInit(_) => "INITIALIZATION_FAILURE",
                VectorError::EmbeddingFailed(_) => "EMBEDDING_FAILED",
                _ => "VECTOR_ERROR",
            },
            Self::ConfigError { .. } => "CONFIG_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Vector(VectorError::MissingArtifact { .. }) => vec![
                "Run 'kitmatch build --catalog <file>' to create the index",
                "Check that index.path in .kitmatch/settings.toml points at the right file",
            ],
            Self::Vector(VectorError::CorruptArtifact { .. })
            | Self::Vector(VectorError::VersionMismatch { .. }) => vec![
                "Run 'kitmatch build' to rebuild the index from the catalog",
                "Check for disk errors or concurrent writers",
            ],
            Self::Vector(VectorError::DimensionMismatch { .. }) => vec![
                "Use the same embedding model for building and querying",
                "Check index.dimension in .kitmatch/settings.toml",
            ],
            Self::Vector(VectorError::ModelInit(_)) => vec![
                "Set embedding.provider = \"hashing\" to run without a model",
                "Check network access for the first model download",
            ],
            Self::CatalogParse { .. } | Self::MissingField { .. } => vec![
                "The catalog must be a JSON array of objects",
                "Each item needs id, name, description, price, sport, level and category",
            ],
            Self::DuplicateItemId { .. } => vec!["Give every catalog item a unique id"],
            Self::FileRead { .. } => vec![
                "Check that the file exists and you have read permissions",
                "Ensure the file is not locked by another process",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;
