//! Randomized checks that both backends and both storage formats agree.

use kitmatch::CatalogItem;
use kitmatch::vector::{BackendKind, VectorDimension, VectorIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

const DIM: usize = 32;

fn random_rows(rng: &mut StdRng, rows: usize) -> Vec<Vec<f32>> {
    (0..rows)
        .map(|_| (0..DIM).map(|_| rng.random_range(-1.0f32..1.0)).collect())
        .collect()
}

fn items(count: usize) -> Vec<CatalogItem> {
    (0..count)
        .map(|i| CatalogItem {
            id: format!("item-{i}"),
            name: format!("Item {i}"),
            description: String::new(),
            price: i as f64,
            image_url: String::new(),
            url: String::new(),
            sport: String::new(),
            level: String::new(),
            category: String::new(),
        })
        .collect()
}

fn build(dir: &TempDir, kind: BackendKind, rows: &[Vec<f32>]) -> VectorIndex {
    let mut index = VectorIndex::new(
        &dir.path().join("index.bin"),
        VectorDimension::new(DIM).unwrap(),
        kind,
    );
    index.build(rows, items(rows.len())).unwrap();
    index
}

fn reload(index: &VectorIndex) -> VectorIndex {
    let mut fresh = VectorIndex::new(index.path(), index.dimension(), BackendKind::Dense);
    fresh.load().unwrap();
    fresh
}

fn assert_same_ranking(a: &VectorIndex, b: &VectorIndex, query: &[f32], k: usize) {
    let left = a.search(query, k).unwrap();
    let right = b.search(query, k).unwrap();
    assert_eq!(left.len(), right.len());
    for (l, r) in left.iter().zip(&right) {
        assert_eq!(l.row, r.row);
        assert_eq!(l.item, r.item);
        assert!((l.score - r.score).abs() < 1e-6);
    }
}

#[test]
fn test_round_trip_preserves_rankings() {
    let mut rng = StdRng::seed_from_u64(7);
    let rows = random_rows(&mut rng, 200);
    let dir = TempDir::new().unwrap();
    let index = build(&dir, BackendKind::Dense, &rows);
    let reloaded = reload(&index);

    for _ in 0..20 {
        let query = random_rows(&mut rng, 1).remove(0);
        let k = rng.random_range(1..=25);
        assert_same_ranking(&index, &reloaded, &query, k);
    }
}

#[test]
fn test_results_are_sorted_and_bounded() {
    let mut rng = StdRng::seed_from_u64(11);
    let rows = random_rows(&mut rng, 50);
    let dir = TempDir::new().unwrap();
    let index = build(&dir, BackendKind::Dense, &rows);

    for k in [1, 10, 50, 80] {
        let query = random_rows(&mut rng, 1).remove(0);
        let results = index.search(&query, k).unwrap();
        assert_eq!(results.len(), k.min(50));
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for result in &results {
            assert_eq!(result.item.id, format!("item-{}", result.row.get()));
            assert!(result.score <= 1.0 + 1e-5 && result.score >= -1.0 - 1e-5);
        }
    }
}

#[test]
fn test_duplicate_rows_rank_by_insertion_order() {
    let mut rng = StdRng::seed_from_u64(3);
    let base = random_rows(&mut rng, 1).remove(0);
    // Power-of-two scaling is exact, so every row normalizes to the same vector
    let rows: Vec<Vec<f32>> = (0..6)
        .map(|shift| base.iter().map(|v| v * (1u32 << shift) as f32).collect())
        .collect();
    let dir = TempDir::new().unwrap();
    let index = build(&dir, BackendKind::Dense, &rows);

    let results = index.search(&base, 6).unwrap();
    let rows: Vec<u32> = results.iter().map(|r| r.row.get()).collect();
    assert_eq!(rows, vec![0, 1, 2, 3, 4, 5]);
}

#[cfg(feature = "native-index")]
#[test]
fn test_native_and_dense_agree() {
    let mut rng = StdRng::seed_from_u64(42);
    let rows = random_rows(&mut rng, 300);

    let native_dir = TempDir::new().unwrap();
    let dense_dir = TempDir::new().unwrap();
    let native = build(&native_dir, BackendKind::Native, &rows);
    let dense = build(&dense_dir, BackendKind::Dense, &rows);
    assert_eq!(native.info().unwrap().backend, BackendKind::Native);
    assert_eq!(dense.info().unwrap().backend, BackendKind::Dense);

    let native_reloaded = reload(&native);
    for _ in 0..30 {
        let query = random_rows(&mut rng, 1).remove(0);
        let k = rng.random_range(0..=40);
        assert_same_ranking(&native, &dense, &query, k);
        assert_same_ranking(&native_reloaded, &dense, &query, k);
    }
}
