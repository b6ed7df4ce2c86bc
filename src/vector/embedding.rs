//! Text embedding for catalog items and queries.
//!
//! Two generators implement [`EmbeddingGenerator`]:
//! - [`FastEmbedGenerator`] wraps a pretrained fastembed sentence model.
//! - [`HashingEmbedder`] is a deterministic bag-of-words histogram that needs
//!   no model at all.
//!
//! [`TextEmbedder`] picks one of them once, at construction, and exposes the
//! `embed` / `embed_batch` pair the rest of the crate uses.
//!
//! # Hashing scheme
//!
//! The hashing embedder must produce identical vectors in every process,
//! because an index built by one process is searched by another. It therefore
//! uses a fixed polynomial hash rather than `std::hash`:
//!
//! ```text
//! h = 0
//! for c in token: h = (h * 31 + codepoint(c)) mod D
//! ```
//!
//! Each lower-cased token adds 1.0 to bucket `h`, and the histogram is then
//! L2-normalized (an all-zero histogram stays zero). Tokens are separated by
//! Unicode whitespace and by the information separators U+001C to U+001F,
//! which `char::is_whitespace` alone does not cover.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::config::EmbeddingConfig;
use crate::vector::{VectorDimension, VectorError, VectorResult, normalize_in_place};

/// Name recorded in index metadata for the hashing embedder.
pub const HASHING_EMBEDDER_NAME: &str = "hashing";

/// Trait for generating embeddings from text.
///
/// Implementations must be thread-safe and return exactly one vector per
/// input text, in input order.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts.
    fn generate_embeddings(&self, texts: &[&str]) -> VectorResult<Vec<Vec<f32>>>;

    /// Get the dimension of embeddings produced by this generator.
    #[must_use]
    fn dimension(&self) -> VectorDimension;

    /// Human readable model identifier, stored alongside built indexes.
    fn model_name(&self) -> &str;
}

/// FastEmbed implementation backed by a pretrained sentence model.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
    model_name: String,
}

impl FastEmbedGenerator {
    /// Load `model` into `cache_dir`, downloading it on first use.
    ///
    /// # Errors
    /// Returns [`VectorError::ModelInit`] if the model cannot be loaded, or
    /// [`VectorError::DimensionMismatch`] if its output size is not
    /// `expected_dimension`.
    pub fn new(
        model: EmbeddingModel,
        cache_dir: PathBuf,
        show_download_progress: bool,
        expected_dimension: VectorDimension,
    ) -> VectorResult<Self> {
        let model_name = model_to_string(&model);

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| VectorError::ModelInit(e.to_string()))?;

        // Probe the real output size instead of trusting the model table
        let probe = text_model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| VectorError::ModelInit(e.to_string()))?;
        let actual = probe.first().map(Vec::len).unwrap_or_default();
        if actual != expected_dimension.get() {
            return Err(VectorError::DimensionMismatch {
                expected: expected_dimension.get(),
                actual,
            });
        }

        Ok(Self {
            model: Mutex::new(text_model),
            dimension: expected_dimension,
            model_name,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> VectorResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // fastembed expects owned strings
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, None)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        if embeddings.len() != texts.len() {
            return Err(VectorError::EmbeddingFailed(format!(
                "Model returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }
        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Deterministic hashing bag-of-words embedder.
///
/// Pure function of its input: no model, no randomness, no per-process seed.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: VectorDimension,
}

impl HashingEmbedder {
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self { dimension }
    }

    /// Embed a single text.
    #[must_use]
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let dim = self.dimension.get();
        let mut vector = vec![0.0f32; dim];

        let lowered = text.to_lowercase();
        for token in lowered.split(is_token_separator).filter(|t| !t.is_empty()) {
            vector[token_bucket(token, dim)] += 1.0;
        }

        normalize_in_place(&mut vector);
        vector
    }
}

impl EmbeddingGenerator for HashingEmbedder {
    fn generate_embeddings(&self, texts: &[&str]) -> VectorResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        HASHING_EMBEDDER_NAME
    }
}

fn is_token_separator(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Stable bucket for a token: `h = (h * 31 + codepoint) mod dim`.
#[must_use]
pub fn token_bucket(token: &str, dim: usize) -> usize {
    let modulus = dim as u64;
    let mut h: u64 = 0;
    for c in token.chars() {
        h = (h * 31 + u64::from(u32::from(c))) % modulus;
    }
    h as usize
}

/// Which embedder variant is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    /// Pretrained sentence model
    Model,
    /// Deterministic hashing fallback
    Hashing,
}

impl std::fmt::Display for EmbedderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Hashing => write!(f, "hashing"),
        }
    }
}

/// Text embedder used by the build pipeline and the query path.
///
/// `embed_batch(texts)[i] == embed(texts[i])` holds for every input.
pub struct TextEmbedder {
    generator: Box<dyn EmbeddingGenerator>,
    kind: EmbedderKind,
}

impl std::fmt::Debug for TextEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEmbedder")
            .field("kind", &self.kind)
            .field("model", &self.generator.model_name())
            .field("dimension", &self.generator.dimension())
            .finish()
    }
}

impl TextEmbedder {
    /// Deterministic hashing embedder.
    #[must_use]
    pub fn hashing(dimension: VectorDimension) -> Self {
        Self {
            generator: Box::new(HashingEmbedder::new(dimension)),
            kind: EmbedderKind::Hashing,
        }
    }

    /// Wrap an arbitrary model-backed generator.
    #[must_use]
    pub fn from_generator(generator: Box<dyn EmbeddingGenerator>) -> Self {
        Self {
            generator,
            kind: EmbedderKind::Model,
        }
    }

    /// Select the embedder described by `config`.
    ///
    /// - `hashing`: always the deterministic embedder.
    /// - `model`: the configured fastembed model; initialization errors are returned.
    /// - `auto`: try the model and degrade to hashing if it is unavailable.
    pub fn from_config(config: &EmbeddingConfig, dimension: VectorDimension) -> VectorResult<Self> {
        match config.provider.as_str() {
            "hashing" => Ok(Self::hashing(dimension)),
            "model" => Self::load_model(config, dimension),
            "auto" => match Self::load_model(config, dimension) {
                Ok(embedder) => Ok(embedder),
                Err(e) => {
                    tracing::warn!(
                        "Embedding model '{}' unavailable, falling back to hashing embedder: {e}",
                        config.model
                    );
                    Ok(Self::hashing(dimension))
                }
            },
            other => Err(VectorError::ModelInit(format!(
                "Unknown embedding provider '{other}'. Expected one of: auto, model, hashing"
            ))),
        }
    }

    fn load_model(config: &EmbeddingConfig, dimension: VectorDimension) -> VectorResult<Self> {
        let model = parse_embedding_model(&config.model)?;
        let cache_dir = config.resolved_cache_dir();
        tracing::debug!(
            "Loading embedding model {} from {}",
            config.model,
            cache_dir.display()
        );
        let generator =
            FastEmbedGenerator::new(model, cache_dir, config.show_download_progress, dimension)?;
        tracing::info!("Using embedding model {}", generator.model_name());
        Ok(Self::from_generator(Box::new(generator)))
    }

    /// Embed one text.
    pub fn embed(&self, text: &str) -> VectorResult<Vec<f32>> {
        self.generator
            .generate_embeddings(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| VectorError::EmbeddingFailed("Model returned no embedding".to_string()))
    }

    /// Embed several texts, preserving order.
    pub fn embed_batch(&self, texts: &[&str]) -> VectorResult<Vec<Vec<f32>>> {
        let embeddings = self.generator.generate_embeddings(texts)?;
        if embeddings.len() != texts.len() {
            return Err(VectorError::EmbeddingFailed(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.generator.dimension()
    }

    #[must_use]
    pub fn kind(&self) -> EmbedderKind {
        self.kind
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }
}

/// Parse a configured model name into a fastembed model.
///
/// Only 384-dimensional models are listed, matching the default index size.
pub fn parse_embedding_model(name: &str) -> VectorResult<EmbeddingModel> {
    match name {
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" => Ok(EmbeddingModel::BGESmallENV15),
        "MultilingualE5Small" => Ok(EmbeddingModel::MultilingualE5Small),
        other => Err(VectorError::ModelInit(format!(
            "Unknown embedding model '{other}'. Supported: AllMiniLML6V2, AllMiniLML12V2, BGESmallENV15, MultilingualE5Small"
        ))),
    }
}

/// Inverse of [`parse_embedding_model`].
#[must_use]
pub fn model_to_string(model: &EmbeddingModel) -> String {
    match model {
        EmbeddingModel::AllMiniLML6V2 => "AllMiniLML6V2".to_string(),
        EmbeddingModel::AllMiniLML12V2 => "AllMiniLML12V2".to_string(),
        EmbeddingModel::BGESmallENV15 => "BGESmallENV15".to_string(),
        EmbeddingModel::MultilingualE5Small => "MultilingualE5Small".to_string(),
        other => format!("{other:?}"),
    }
}
