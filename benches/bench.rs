//! Criterion benchmarks for Kiosk.
//!
//! Covers the CPU-bound parts of a search:
//! - Score fusion over vector and keyword hit lists
//! - Keyword index lookups
//! - End-to-end search over the in-memory stores

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use kiosk::catalog::{MemoryCatalog, ProductStore};
use kiosk::embedding::{HashingEmbedder, TextEmbedder};
use kiosk::hybrid::{HybridRetriever, HybridSearchConfig, ResultMerger};
use kiosk::keyword_index::{InvertedKeywordIndex, KeywordIndex};
use kiosk::product::{Product, ScoredId};
use kiosk::vector_index::{DistanceMetric, FlatIndexConfig, FlatVectorIndex, VectorIndex};
use tokio::runtime::Runtime;

const DIMENSION: usize = 256;

/// Generate a catalog of products with overlapping vocabularies.
fn generate_products(count: usize) -> Vec<Product> {
    let adjectives = [
        "warm", "light", "dark", "red", "waterproof", "soft", "wool", "leather", "running",
        "hiking", "winter", "summer",
    ];
    let nouns = [
        "coat", "jacket", "shoes", "boots", "scarf", "hat", "gloves", "sweater", "shirt",
    ];

    (0..count)
        .map(|i| {
            let adjective = adjectives[i % adjectives.len()];
            let other = adjectives[(i / 3) % adjectives.len()];
            let noun = nouns[i % nouns.len()];
            Product::new(
                format!("p{i:05}"),
                format!("{adjective} {noun} {i}"),
                format!("A {other} {adjective} {noun} for every day"),
                10.0 + (i % 90) as f64,
                format!("{adjective}_{noun}_{i}.png"),
            )
        })
        .collect()
}

/// Hit list with descending scores and a partial overlap with its sibling.
fn generate_hits(count: usize, offset: usize, scale: f32) -> Vec<ScoredId> {
    (0..count)
        .map(|i| ScoredId::new(format!("p{:05}", i + offset), scale * (count - i) as f32))
        .collect()
}

fn build_retriever(runtime: &Runtime, products: &[Product]) -> HybridRetriever {
    runtime.block_on(async {
        let embedder = Arc::new(HashingEmbedder::new(DIMENSION).unwrap());
        let vectors = Arc::new(FlatVectorIndex::new(FlatIndexConfig {
            dimension: DIMENSION,
            metric: DistanceMetric::Cosine,
        }));
        let keywords = Arc::new(InvertedKeywordIndex::default());
        let catalog = Arc::new(MemoryCatalog::new());

        for product in products {
            let vector = embedder.embed(&product.search_text()).await.unwrap();
            catalog.insert(vec![product.clone()]).await.unwrap();
            vectors.upsert(vec![product.embedding_record(vector)]).await.unwrap();
            keywords.upsert(vec![product.keyword_document()]).await.unwrap();
        }

        HybridRetriever::new(
            embedder,
            vectors,
            keywords,
            catalog,
            HybridSearchConfig::default(),
        )
        .unwrap()
    })
}

fn bench_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("fusion");
    let merger = ResultMerger::new(&HybridSearchConfig::default());

    for size in [3, 10, 100, 1000] {
        let vector_hits = generate_hits(size, 0, 0.001);
        let keyword_hits = generate_hits(size, size / 2, 1.5);
        group.throughput(Throughput::Elements((size * 2) as u64));
        group.bench_with_input(BenchmarkId::new("weighted", size), &size, |b, _| {
            b.iter(|| merger.fuse(black_box(&vector_hits), black_box(&keyword_hits)))
        });
    }
    group.finish();
}

fn bench_keyword_index(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let index = InvertedKeywordIndex::default();
    let documents: Vec<_> = generate_products(5000)
        .iter()
        .map(Product::keyword_document)
        .collect();
    runtime.block_on(index.upsert(documents)).unwrap();

    let mut group = c.benchmark_group("keyword_index");
    for query in ["coat", "warm coat", "waterproof leather boots"] {
        group.bench_with_input(BenchmarkId::new("query", query), &query, |b, query| {
            b.iter(|| runtime.block_on(index.query_keyword(black_box(query), 10)))
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("hybrid_search");
    group.sample_size(20);

    for size in [100, 1000, 5000] {
        let retriever = build_retriever(&runtime, &generate_products(size));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("memory", size), &size, |b, _| {
            b.iter(|| runtime.block_on(retriever.search(black_box("warm winter coat"))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fusion, bench_keyword_index, bench_search);
criterion_main!(benches);
