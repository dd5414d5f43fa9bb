//! Ranking tests: store search must agree with a naive reference ranking.

use medimate_store::{Embedder, Result, StoreError, VectorStore};
use rand::Rng;
use std::collections::HashMap;
use tempfile::TempDir;

/// Returns pre-assigned vectors for known texts.
struct Lookup {
    vectors: HashMap<String, Vec<f64>>,
}

impl Embedder for Lookup {
    fn embed_query(&self, text: &str) -> Result<Vec<f64>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| StoreError::Embedding(format!("unknown text: {}", text)))
    }
}

fn random_vector(rng: &mut impl Rng, dim: usize) -> Vec<f64> {
    (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn reference_cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    dot / (na * nb)
}

fn check_ranking(n: usize, dim: usize, k: usize, num_queries: usize) {
    let mut rng = rand::thread_rng();
    let mut vectors = HashMap::new();
    let docs: Vec<String> = (0..n).map(|i| format!("doc {}", i)).collect();
    for doc in &docs {
        vectors.insert(doc.clone(), random_vector(&mut rng, dim));
    }
    let queries: Vec<String> = (0..num_queries).map(|i| format!("query {}", i)).collect();
    for q in &queries {
        vectors.insert(q.clone(), random_vector(&mut rng, dim));
    }

    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(
        dir.path(),
        Some(Box::new(Lookup {
            vectors: vectors.clone(),
        })),
    )
    .unwrap();
    assert!(store.add_texts(&docs, &[], Some("bench")).unwrap());

    for q in &queries {
        let mut expected: Vec<(&str, f64)> = docs
            .iter()
            .map(|d| (d.as_str(), reference_cosine(&vectors[q], &vectors[d])))
            .collect();
        expected.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        expected.truncate(k);

        let results = store.search(q, None, Some("bench"), k).unwrap();
        assert_eq!(results.len(), k.min(n));
        for (got, (text, score)) in results.iter().zip(&expected) {
            assert_eq!(got.text(), Some(*text));
            assert!((got.score - score).abs() < 1e-9);
        }
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn test_ranking_small_collection() {
    check_ranking(20, 8, 5, 20);
}

#[test]
fn test_ranking_k_exceeds_collection() {
    check_ranking(3, 16, 10, 5);
}

#[test]
fn test_ranking_larger_collection() {
    check_ranking(500, 64, 10, 10);
}
