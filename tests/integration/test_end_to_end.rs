//! Catalog file to recommendations, across independent instances.

use kitmatch::vector::{BackendKind, TextEmbedder, VECTOR_DIMENSION_384, VectorDimension, VectorIndex};
use kitmatch::{Catalog, IndexBuildPipeline, RecommendationService, UserProfile};

use crate::common::TestWorkspace;

#[test]
fn test_build_from_file_then_query_from_new_instance() {
    let workspace = TestWorkspace::new();
    let settings = workspace.settings("dense");

    let catalog = Catalog::from_json_file(&workspace.catalog_path()).unwrap();
    assert_eq!(catalog.len(), 4);

    let embedder = TextEmbedder::hashing(VectorDimension::dimension_384());
    let mut index = VectorIndex::from_config(&settings.index).unwrap();
    IndexBuildPipeline::new(&embedder)
        .run(catalog, &mut index)
        .unwrap();

    // A separately constructed embedder and index, as another process would have
    let other_embedder = TextEmbedder::hashing(VectorDimension::dimension_384());
    let mut reopened = VectorIndex::from_config(&settings.index).unwrap();
    reopened.load().unwrap();

    let query = other_embedder.embed("Heavy weightlifting bench").unwrap();
    let results = reopened.search(&query, 4).unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].item.id, "gym-1");
    assert_eq!(results[0].row.get(), 1);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    // Presentation fields survive persistence untouched
    let rope = results.iter().find(|r| r.item.id == "42").unwrap();
    assert_eq!(rope.item.price, 12.0);
    assert_eq!(rope.item.url, "");
}

#[test]
fn test_hashing_embedder_is_stable_across_instances() {
    let a = TextEmbedder::hashing(VectorDimension::dimension_384());
    let b = TextEmbedder::hashing(VectorDimension::dimension_384());

    let text = "Lightweight running shoe for trail RUNNING";
    assert_eq!(a.embed(text).unwrap(), b.embed(text).unwrap());

    // "ab" hashes to (97 * 31 + 98) mod 384 = 33, "a" to 97
    let v = a.embed("ab AB a").unwrap();
    assert_eq!(v.len(), VECTOR_DIMENSION_384);
    let norm = 5.0f32.sqrt();
    assert!((v[33] - 2.0 / norm).abs() < 1e-6);
    assert!((v[97] - 1.0 / norm).abs() < 1e-6);
    assert_eq!(v.iter().filter(|x| **x != 0.0).count(), 2);

    assert!(a.embed("").unwrap().iter().all(|x| *x == 0.0));
    assert!(a.embed("   \t\n").unwrap().iter().all(|x| *x == 0.0));
}

#[test]
fn test_service_over_built_index() {
    let workspace = TestWorkspace::new();
    let settings = workspace.settings("auto");

    let service = RecommendationService::new(&settings).unwrap();
    assert!(service.recommend_text("yoga", 3).is_empty());

    let catalog = Catalog::from_json_file(&workspace.catalog_path()).unwrap();
    service.rebuild(catalog, |_, _| {}).unwrap();

    let info = service.index_info().unwrap();
    assert_eq!(info.count, 4);
    assert_eq!(info.embedder, "hashing");
    let expected = if BackendKind::native_available() {
        BackendKind::Native
    } else {
        BackendKind::Dense
    };
    assert_eq!(info.backend, expected);

    let profile = UserProfile {
        sport: "Boxing".to_string(),
        level: "Intermediate".to_string(),
        goals: vec!["conditioning".to_string()],
        budget: "Low".to_string(),
        ..UserProfile::default()
    };
    let recommendations = service.recommend(&profile, 2);
    assert_eq!(recommendations[0].id, "42");
    assert_eq!(recommendations[0].name, "Jump Rope");
}

#[test]
fn test_empty_catalog_index() {
    let workspace = TestWorkspace::new();
    let settings = workspace.settings("dense");
    let embedder = TextEmbedder::hashing(VectorDimension::dimension_384());

    let mut index = VectorIndex::from_config(&settings.index).unwrap();
    IndexBuildPipeline::new(&embedder)
        .run(Catalog::from_json_str("[]").unwrap(), &mut index)
        .unwrap();

    let mut reopened = VectorIndex::from_config(&settings.index).unwrap();
    reopened.load().unwrap();
    let query = embedder.embed("anything at all").unwrap();
    assert!(reopened.search(&query, 5).unwrap().is_empty());
}
