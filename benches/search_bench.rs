//! Benchmarks for collection search

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use medimate_store::{Embedder, Result, VectorStore};
use tempfile::TempDir;

const DIM: usize = 768;

/// Spreads a text's bytes over a fixed-size vector; stable per text.
struct ByteSpread;

impl Embedder for ByteSpread {
    fn embed_query(&self, text: &str) -> Result<Vec<f64>> {
        let mut v = vec![0.0; DIM];
        for (i, b) in text.bytes().enumerate() {
            v[(i * 31 + b as usize) % DIM] += b as f64;
        }
        Ok(v)
    }
}

fn benchmark_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    for size in [100, 1000, 5000].iter() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path(), Some(Box::new(ByteSpread))).unwrap();

        let texts: Vec<String> = (0..*size)
            .map(|i| format!("chunk {} of prescription {}", i, i % 17))
            .collect();
        store.add_texts(&texts, &[], None).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                store
                    .search(black_box("dosage for prescription 3"), None, None, black_box(5))
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_search);
criterion_main!(benches);
