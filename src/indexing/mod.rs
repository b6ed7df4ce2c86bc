//! Catalog indexing: text assembly, batch embedding and index build.

pub mod pipeline;
pub mod progress;

pub use pipeline::{IndexBuildPipeline, create_item_text};
pub use progress::BuildStats;
