//! Catalog records and JSON catalog ingestion.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{IndexError, IndexResult};

/// One recommendable product.
///
/// `id` identifies the item for presentation; the index itself only uses the
/// item's position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub url: String,
    pub sport: String,
    pub level: String,
    pub category: String,
}

/// Catalog ids are strings, but exported product tables often carry integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
    })
}

/// An ordered, validated list of catalog items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    /// Validate and wrap `items`, keeping their order.
    pub fn new(items: Vec<CatalogItem>) -> IndexResult<Self> {
        let mut seen = HashSet::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            if item.id.trim().is_empty() {
                return Err(IndexError::MissingField {
                    position,
                    field: "id",
                });
            }
            if !seen.insert(item.id.as_str()) {
                return Err(IndexError::DuplicateItemId {
                    id: item.id.clone(),
                    position,
                });
            }
        }
        Ok(Self { items })
    }

    /// Parse a JSON array of catalog records.
    pub fn from_json_str(json: &str) -> IndexResult<Self> {
        Self::parse(json, Path::new("<inline>"))
    }

    /// Read a JSON array of catalog records from disk.
    pub fn from_json_file(path: &Path) -> IndexResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| IndexError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::parse(&json, path)?;
        tracing::info!(
            "Loaded {} catalog items from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    fn parse(json: &str, path: &Path) -> IndexResult<Self> {
        let items: Vec<CatalogItem> =
            serde_json::from_str(json).map_err(|e| IndexError::CatalogParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::new(items)
    }

    #[must_use]
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<CatalogItem> {
        self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
