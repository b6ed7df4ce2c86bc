//! Model-backed embedder checks; these download the fastembed model.

use kitmatch::config::EmbeddingConfig;
use kitmatch::vector::{BackendKind, EmbedderKind, TextEmbedder, VectorDimension, VectorIndex};
use kitmatch::{Catalog, IndexBuildPipeline};
use tempfile::TempDir;

/// Get a unique cache directory for each test to avoid conflicts
fn get_test_cache_dir(test_name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "kitmatch_test_fastembed_{}_{}",
        test_name,
        std::process::id()
    ))
}

fn model_config(test_name: &str) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: "model".to_string(),
        cache_dir: Some(get_test_cache_dir(test_name)),
        ..EmbeddingConfig::default()
    }
}

#[test]
#[ignore = "Downloads 86MB model - run with --ignored for model embedder tests"]
fn test_model_batch_matches_single() {
    let embedder =
        TextEmbedder::from_config(&model_config("batch"), VectorDimension::dimension_384())
            .unwrap();
    assert_eq!(embedder.kind(), EmbedderKind::Model);
    assert_eq!(embedder.model_name(), "AllMiniLML6V2");

    let texts = ["Lightweight running shoe", "Yoga mat for beginners"];
    let batch = embedder.embed_batch(&texts).unwrap();
    for (text, vector) in texts.iter().zip(&batch) {
        let single = embedder.embed(text).unwrap();
        assert_eq!(single.len(), 384);
        for (a, b) in single.iter().zip(vector) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}

#[test]
#[ignore = "Downloads 86MB model - run with --ignored for model embedder tests"]
fn test_model_ranks_paraphrase_first() {
    let embedder =
        TextEmbedder::from_config(&model_config("rank"), VectorDimension::dimension_384())
            .unwrap();
    let catalog = Catalog::from_json_str(
        r#"[
        {"id": "1", "name": "Trail Shoe", "description": "Lightweight running shoe",
         "price": 89.9, "sport": "Running", "level": "Beginner", "category": "Shoes"},
        {"id": "2", "name": "Power Bench", "description": "Heavy weightlifting bench",
         "price": 249.0, "sport": "Fitness", "level": "Advanced", "category": "Equipment"},
        {"id": "3", "name": "Starter Mat", "description": "Yoga mat for beginners",
         "price": 24.5, "sport": "Yoga", "level": "Beginner", "category": "Mats"}
    ]"#,
    )
    .unwrap();

    let dir = TempDir::new().unwrap();
    let mut index = VectorIndex::new(
        &dir.path().join("index.bin"),
        VectorDimension::dimension_384(),
        BackendKind::Dense,
    );
    IndexBuildPipeline::new(&embedder)
        .run(catalog, &mut index)
        .unwrap();

    let query = embedder.embed("bench for lifting heavy weights").unwrap();
    let results = index.search(&query, 3).unwrap();
    assert_eq!(results[0].item.id, "2");
    assert!(results[0].score > results[1].score);
}
