//! Configuration module for kitmatch.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.kitmatch/settings.toml`)
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `KM_` and use double underscores
//! to separate nested levels:
//! - `KM_INDEX__PATH=/srv/kitmatch/index.bin` sets `index.path`
//! - `KM_EMBEDDING__PROVIDER=hashing` sets `embedding.provider`
//! - `KM_SEARCH__DEFAULT_K=10` sets `search.default_k`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, IndexResult};
use crate::vector::VECTOR_DIMENSION_384;

/// Directory holding the settings file, searched for in ancestor directories.
pub const CONFIG_DIR: &str = ".kitmatch";

/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .kitmatch is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Vector index location and backend
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Query defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Catalog source
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IndexConfig {
    /// Base path of the index artifacts (`<path>`, `<path>.npy`, `<path>.meta`)
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// Embedding dimension the index is built for
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Search backend: "auto", "native" or "dense"
    #[serde(default = "default_backend")]
    pub backend: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Embedder: "auto" (model, falling back to hashing), "model" or "hashing"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where downloaded model files are cached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Number of catalog texts embedded per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Show a progress bar while the model downloads
    #[serde(default = "default_false")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Number of results when no `k` is given
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Results scoring below this are dropped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct CatalogConfig {
    /// Default catalog JSON for `kitmatch build`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".kitmatch/index.bin")
}
fn default_dimension() -> usize {
    VECTOR_DIMENSION_384
}
fn default_backend() -> String {
    "auto".to_string()
}
fn default_provider() -> String {
    "auto".to_string()
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_batch_size() -> usize {
    256
}
fn default_k() -> usize {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            debug: false,
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            dimension: default_dimension(),
            backend: default_backend(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            cache_dir: None,
            batch_size: default_batch_size(),
            show_download_progress: false,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            threshold: None,
        }
    }
}

impl EmbeddingConfig {
    /// Model cache directory: the configured one, else the user cache dir.
    #[must_use]
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .map(|dir| dir.join("kitmatch").join("models"))
                .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("models"))
        })
    }
}

/// `KM_INDEX__PATH` -> `index.path`
fn env_provider() -> Env {
    // Double underscore separates nested levels, single underscore stays
    Env::prefixed("KM_").map(|key| key.as_str().to_lowercase().replace("__", ".").into())
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        let mut settings = Self::figment(&config_path).extract::<Settings>().map_err(Box::new)?;
        if settings.workspace_root.is_none() {
            settings.workspace_root = Self::workspace_root();
        }
        settings.resolve_paths();
        Ok(settings)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        let mut settings = Self::figment(path.as_ref())
            .extract::<Settings>()
            .map_err(Box::new)?;
        if settings.workspace_root.is_none() {
            settings.workspace_root = path
                .as_ref()
                .parent()
                .filter(|dir| dir.ends_with(CONFIG_DIR))
                .and_then(Path::parent)
                .map(Path::to_path_buf);
        }
        settings.resolve_paths();
        Ok(settings)
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(env_provider())
    }

    /// Make relative paths relative to the workspace root.
    fn resolve_paths(&mut self) {
        let Some(root) = self.workspace_root.clone() else {
            return;
        };
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        };
        resolve(&mut self.index.path);
        if let Some(path) = self.catalog.path.as_mut() {
            resolve(path);
        }
        if let Some(path) = self.embedding.cache_dir.as_mut() {
            resolve(path);
        }
    }

    /// Find the workspace config by looking for a .kitmatch directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Get the workspace root directory (where .kitmatch is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> IndexResult<String> {
        toml::to_string_pretty(self).map_err(|e| IndexError::ConfigError {
            reason: format!("Failed to serialize settings: {e}"),
        })
    }

    /// Create `.kitmatch/settings.toml` under `dir` with the commented defaults.
    pub fn init_config_file(dir: &Path, force: bool) -> IndexResult<PathBuf> {
        let config_path = dir.join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err(IndexError::ConfigError {
                reason: format!(
                    "Configuration file already exists at {}. Use --force to overwrite",
                    config_path.display()
                ),
            });
        }

        write_config(&config_path, &Self::default_toml())?;
        tracing::info!("Wrote configuration to {}", config_path.display());
        Ok(config_path)
    }

    /// Default settings file with explanatory comments.
    #[must_use]
    pub fn default_toml() -> String {
        format!(
            r#"# Kitmatch Configuration File

# Version of the configuration schema
version = {version}

# Global debug mode
debug = false

[index]
# Base path of the index artifacts, relative to the workspace root.
# The vector store is written to <path> (native) or <path>.npy (dense),
# item metadata to <path>.meta.
path = "{path}"

# Embedding dimension; must match the embedder output
dimension = {dimension}

# Search backend: "auto" (native when compiled in), "native" or "dense"
backend = "{backend}"

[embedding]
# "auto" tries the model and falls back to the hashing embedder,
# "model" requires the model, "hashing" never downloads anything
provider = "{provider}"

# Model to use for embeddings
model = "{model}"

# Model download cache (defaults to the user cache directory)
# cache_dir = "/var/cache/kitmatch/models"

# Catalog texts embedded per batch
batch_size = {batch_size}

show_download_progress = false

[search]
# Results returned when no -k is given
default_k = {default_k}

# Drop results scoring below this cosine similarity (0.0 to 1.0)
# threshold = 0.2

[catalog]
# Default catalog JSON for 'kitmatch build'
# path = "data/products.json"
"#,
            version = default_version(),
            path = default_index_path().display(),
            dimension = default_dimension(),
            backend = default_backend(),
            provider = default_provider(),
            model = default_embedding_model(),
            batch_size = default_batch_size(),
            default_k = default_k(),
        )
    }
}

fn write_config(path: &Path, contents: &str) -> IndexResult<()> {
    let write_err = |source| IndexError::FileWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, contents).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.index.path, PathBuf::from(".kitmatch/index.bin"));
        assert_eq!(settings.index.dimension, 384);
        assert_eq!(settings.index.backend, "auto");
        assert_eq!(settings.embedding.provider, "auto");
        assert_eq!(settings.embedding.batch_size, 256);
        assert_eq!(settings.search.default_k, 5);
        assert!(settings.search.threshold.is_none());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[index]
path = "/srv/kitmatch/faiss_index.bin"
backend = "dense"

[embedding]
provider = "hashing"

[search]
threshold = 0.25
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(
            settings.index.path,
            PathBuf::from("/srv/kitmatch/faiss_index.bin")
        );
        assert_eq!(settings.index.backend, "dense");
        assert_eq!(settings.embedding.provider, "hashing");
        assert_eq!(settings.search.threshold, Some(0.25));
        // Untouched values keep their defaults
        assert_eq!(settings.index.dimension, 384);
        assert_eq!(settings.embedding.model, "AllMiniLML6V2");
    }

    #[test]
    fn test_relative_paths_resolve_against_workspace() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_DIR).join(CONFIG_FILE);
        fs::create_dir_all(config_path.parent().unwrap()).unwrap();
        fs::write(
            &config_path,
            "[index]\npath = \"data/index.bin\"\n[catalog]\npath = \"data/products.json\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.workspace_root.as_deref(), Some(temp_dir.path()));
        assert_eq!(settings.index.path, temp_dir.path().join("data/index.bin"));
        assert_eq!(
            settings.catalog.path,
            Some(temp_dir.path().join("data/products.json"))
        );
    }

    #[test]
    fn test_to_toml_round_trips() {
        let mut settings = Settings::default();
        settings.index.backend = "dense".to_string();
        settings.search.default_k = 12;
        settings.search.threshold = Some(0.25);

        let rendered = settings.to_toml().unwrap();
        assert!(rendered.contains("default_k = 12"));

        let parsed: Settings = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_default_toml_matches_defaults() {
        let parsed: Settings = toml::from_str(&Settings::default_toml()).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn test_init_config_file() {
        let temp_dir = TempDir::new().unwrap();

        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
        assert!(path.exists());
        assert!(path.ends_with(".kitmatch/settings.toml"));

        // Refuses to overwrite without force
        assert!(matches!(
            Settings::init_config_file(temp_dir.path(), false),
            Err(IndexError::ConfigError { .. })
        ));
        assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "[embedding]\nbatch_size = 64\n").unwrap();

        unsafe {
            std::env::set_var("KM_EMBEDDING__BATCH_SIZE", "8");
        }
        let settings = Settings::load_from(&config_path).unwrap();
        unsafe {
            std::env::remove_var("KM_EMBEDDING__BATCH_SIZE");
        }

        assert_eq!(settings.embedding.batch_size, 8);
    }

    #[test]
    fn test_resolved_cache_dir() {
        let explicit = EmbeddingConfig {
            cache_dir: Some(PathBuf::from("/tmp/models")),
            ..EmbeddingConfig::default()
        };
        assert_eq!(explicit.resolved_cache_dir(), PathBuf::from("/tmp/models"));

        let implicit = EmbeddingConfig::default().resolved_cache_dir();
        assert!(implicit.ends_with("models"));
    }
}
