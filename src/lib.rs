//! The main library module for kitmatch
//!
//! Semantic product recommendations: catalog items are embedded once into a
//! persistent vector index, and user queries are answered by cosine
//! similarity against it.

pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod indexing;
pub mod recommend;
pub mod vector;

// Explicit exports for better API clarity
pub use catalog::{Catalog, CatalogItem};
pub use config::Settings;
pub use error::{IndexError, IndexResult};
pub use indexing::{IndexBuildPipeline, create_item_text};
pub use recommend::{Recommendation, RecommendationService, UserProfile};
pub use vector::{SearchResult, TextEmbedder, VectorIndex};
