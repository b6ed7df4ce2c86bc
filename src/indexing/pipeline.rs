//! Catalog-to-index build pipeline.
//!
//! Assembles one text per catalog item, embeds the texts in batches and hands
//! the vectors to [`VectorIndex::build`]. Item order is never changed: the
//! `i`-th text, vector and item all describe the same product.

use crate::catalog::{Catalog, CatalogItem};
use crate::indexing::progress::BuildStats;
use crate::vector::{TextEmbedder, VectorIndex};
use crate::IndexResult;

/// Text embedded for a catalog item: name, description, sport, level, category.
#[must_use]
pub fn create_item_text(item: &CatalogItem) -> String {
    format!(
        "{} {} {} {} {}",
        item.name, item.description, item.sport, item.level, item.category
    )
}

/// Builds a [`VectorIndex`] from a catalog.
pub struct IndexBuildPipeline<'a> {
    embedder: &'a TextEmbedder,
    batch_size: usize,
    progress: Option<Box<dyn Fn(usize, usize) + 'a>>,
}

impl<'a> IndexBuildPipeline<'a> {
    #[must_use]
    pub fn new(embedder: &'a TextEmbedder) -> Self {
        Self {
            embedder,
            batch_size: 256,
            progress: None,
        }
    }

    /// Texts per `embed_batch` call; zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Called with `(embedded, total)` after every batch.
    #[must_use]
    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Embed every item of `catalog` and rebuild `index` from the result.
    pub fn run(&self, catalog: Catalog, index: &mut VectorIndex) -> IndexResult<BuildStats> {
        let mut stats = BuildStats::new();
        let items = catalog.into_items();
        let total = items.len();

        let texts: Vec<String> = items.iter().map(create_item_text).collect();
        let mut vectors = Vec::with_capacity(total);
        for batch in texts.chunks(self.batch_size) {
            let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
            vectors.extend(self.embedder.embed_batch(&refs)?);
            stats.batches += 1;
            if let Some(progress) = &self.progress {
                progress(vectors.len(), total);
            }
        }
        tracing::debug!("Embedded {total} catalog items in {} batches", stats.batches);

        index.set_embedder_name(self.embedder.model_name());
        index.build(&vectors, items)?;

        stats.items_indexed = total;
        stats.stop_timing();
        Ok(stats)
    }
}
