//! Recommendation service: user profiles in, ranked catalog items out.
//!
//! The service is created once per process and shared as
//! `Arc<RecommendationService>`. Queries clone the current index snapshot
//! under a short read lock; `reload` and `rebuild` prepare a fresh
//! [`VectorIndex`] off to the side and swap it in, so in-flight searches
//! finish against the snapshot they started with.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::config::{IndexConfig, SearchConfig, Settings};
use crate::indexing::{BuildStats, IndexBuildPipeline};
use crate::vector::{IndexInfo, SearchResult, TextEmbedder, VectorDimension, VectorIndex};
use crate::{IndexError, IndexResult};

/// Answers to the profiling questionnaire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub sport: String,
    #[serde(default)]
    pub frequency: String,
    pub level: String,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub medical_conditions: Option<String>,
    #[serde(default)]
    pub posture_rating: Option<u8>,
    #[serde(default)]
    pub back_pain: Option<String>,
    #[serde(default)]
    pub sedentary_level: Option<String>,
}

impl UserProfile {
    /// Query text embedded for this profile.
    ///
    /// `"{sport} {level} {goals} {budget} {health}"`, where health lists
    /// back pain and medical conditions when they are given.
    #[must_use]
    pub fn query_text(&self) -> String {
        let mut health = String::new();
        if let Some(back_pain) = self.back_pain.as_deref().filter(|s| !s.is_empty()) {
            health.push_str(" back pain ");
            health.push_str(back_pain);
        }
        if let Some(condition) = self.medical_conditions.as_deref().filter(|s| !s.is_empty()) {
            health.push_str(" condition ");
            health.push_str(condition);
        }

        format!(
            "{} {} {} {} {health}",
            self.sport,
            self.level,
            self.goals.join(" "),
            self.budget
        )
    }
}

/// A recommended product with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image_url: String,
    pub url: String,
    pub score: f32,
}

impl From<SearchResult> for Recommendation {
    fn from(result: SearchResult) -> Self {
        let item = result.item;
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            price: item.price,
            image_url: item.image_url,
            url: item.url,
            score: result.score,
        }
    }
}

/// Process-wide recommendation engine.
#[derive(Debug)]
pub struct RecommendationService {
    embedder: TextEmbedder,
    index: RwLock<Arc<VectorIndex>>,
    index_config: IndexConfig,
    search: SearchConfig,
    batch_size: usize,
}

impl RecommendationService {
    /// Select the embedder from `settings` and open the configured index.
    pub fn new(settings: &Settings) -> IndexResult<Self> {
        let dimension = VectorDimension::new(settings.index.dimension)?;
        let embedder = TextEmbedder::from_config(&settings.embedding, dimension)?;
        Self::with_embedder(settings, embedder)
    }

    /// Open the configured index with an already constructed embedder.
    ///
    /// A missing or unreadable index is not an error: it is logged and the
    /// service answers every query with no recommendations until a
    /// successful `reload` or `rebuild`.
    pub fn with_embedder(settings: &Settings, embedder: TextEmbedder) -> IndexResult<Self> {
        if embedder.dimension().get() != settings.index.dimension {
            return Err(IndexError::ConfigError {
                reason: format!(
                    "Embedder '{}' produces {} dimensions but index.dimension is {}",
                    embedder.model_name(),
                    embedder.dimension().get(),
                    settings.index.dimension
                ),
            });
        }

        let mut index = VectorIndex::from_config(&settings.index)?;
        if let Err(e) = index.load() {
            tracing::warn!("Serving empty recommendations, index not loaded: {e}");
        }

        Ok(Self {
            embedder,
            index: RwLock::new(Arc::new(index)),
            index_config: settings.index.clone(),
            search: settings.search.clone(),
            batch_size: settings.embedding.batch_size,
        })
    }

    /// Current index snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<VectorIndex> {
        Arc::clone(&self.index.read())
    }

    #[must_use]
    pub fn embedder(&self) -> &TextEmbedder {
        &self.embedder
    }

    #[must_use]
    pub fn index_info(&self) -> Option<IndexInfo> {
        self.snapshot().info()
    }

    #[must_use]
    pub fn default_k(&self) -> usize {
        self.search.default_k
    }

    /// Embed `query` and return the best `k` items, propagating failures.
    pub fn try_recommend_text(&self, query: &str, k: usize) -> IndexResult<Vec<Recommendation>> {
        let vector = self.embedder.embed(query)?;
        let results = self.snapshot().search(&vector, k)?;

        let threshold = self.search.threshold;
        Ok(results
            .into_iter()
            .filter(|r| threshold.is_none_or(|min| r.score >= min))
            .map(Recommendation::from)
            .collect())
    }

    /// Like [`try_recommend_text`](Self::try_recommend_text), but a failure
    /// is logged and yields no recommendations.
    #[must_use]
    pub fn recommend_text(&self, query: &str, k: usize) -> Vec<Recommendation> {
        tracing::debug!("Searching for: {query}");
        self.try_recommend_text(query, k).unwrap_or_else(|e| {
            tracing::warn!("Recommendation search failed: {e}");
            Vec::new()
        })
    }

    /// Recommendations for a questionnaire profile.
    #[must_use]
    pub fn recommend(&self, profile: &UserProfile, k: usize) -> Vec<Recommendation> {
        self.recommend_text(&profile.query_text(), k)
    }

    /// Load the persisted index again and swap it in.
    ///
    /// On failure the current snapshot stays in service.
    pub fn reload(&self) -> IndexResult<()> {
        let mut fresh = VectorIndex::from_config(&self.index_config)?;
        fresh.load()?;
        *self.index.write() = Arc::new(fresh);
        Ok(())
    }

    /// Build a new index from `catalog`, persist it and swap it in.
    ///
    /// `progress` receives `(embedded, total)` after each batch.
    pub fn rebuild<F>(&self, catalog: Catalog, progress: F) -> IndexResult<BuildStats>
    where
        F: Fn(usize, usize),
    {
        let mut fresh = VectorIndex::from_config(&self.index_config)?;
        let stats = IndexBuildPipeline::new(&self.embedder)
            .with_batch_size(self.batch_size)
            .with_progress(progress)
            .run(catalog, &mut fresh)?;
        *self.index.write() = Arc::new(fresh);
        Ok(stats)
    }
}
