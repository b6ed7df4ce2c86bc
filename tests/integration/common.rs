use std::fs;
use std::path::{Path, PathBuf};

use kitmatch::Settings;
use tempfile::TempDir;

pub const CATALOG_JSON: &str = r#"[
  {"id": "run-1", "name": "Trail Shoe", "description": "Lightweight running shoe",
   "price": 89.9, "image_url": "https://img.example.com/run-1.jpg",
   "url": "https://shop.example.com/run-1", "sport": "Running", "level": "Beginner",
   "category": "Shoes"},
  {"id": "gym-1", "name": "Power Bench", "description": "Heavy weightlifting bench",
   "price": 249.0, "image_url": "https://img.example.com/gym-1.jpg",
   "url": "https://shop.example.com/gym-1", "sport": "Fitness", "level": "Advanced",
   "category": "Equipment"},
  {"id": "yoga-1", "name": "Starter Mat", "description": "Yoga mat for beginners",
   "price": 24.5, "image_url": "https://img.example.com/yoga-1.jpg",
   "url": "https://shop.example.com/yoga-1", "sport": "Yoga", "level": "Beginner",
   "category": "Mats"},
  {"id": 42, "name": "Jump Rope", "description": "Speed rope for boxing conditioning",
   "price": 12, "sport": "Boxing", "level": "Intermediate", "category": "Accessories"}
]"#;

/// Isolated workspace with a catalog file and hashing-embedder settings.
pub struct TestWorkspace {
    pub dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let workspace = Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        };
        workspace.add_file("data/products.json", CATALOG_JSON);
        workspace
    }

    pub fn add_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.path().join("data/products.json")
    }

    pub fn settings(&self, backend: &str) -> Settings {
        let mut settings = Settings::default();
        settings.index.path = self.path().join("index/faiss_index.bin");
        settings.index.backend = backend.to_string();
        settings.embedding.provider = "hashing".to_string();
        settings.catalog.path = Some(self.catalog_path());
        settings
    }
}
