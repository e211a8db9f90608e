//! Engram Storage Benchmarks
//!
//! Benchmarks for the cache and tiered read path using Criterion.
//! Run with: cargo bench -p engram-core

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use engram_core::{
    FeatureVector, LruCache, MemoryTier, PatternData, PatternId, PatternNode, PatternType,
    TierManager, TieredStorage, TieredStorageConfig,
};
use tempfile::TempDir;

fn sample_node(dim: usize) -> PatternNode {
    let features: Vec<f32> = (0..dim).map(|i| (i as f32).sin()).collect();
    PatternNode::new(PatternData::from_features(features), PatternType::Atomic)
}

fn bench_lru_get_hit(c: &mut Criterion) {
    let cache: LruCache<PatternId, Arc<PatternNode>> = LruCache::new(1024);
    let ids: Vec<PatternId> = (0..512)
        .map(|_| {
            let node = Arc::new(sample_node(64));
            let id = node.id();
            cache.put(id, node);
            id
        })
        .collect();

    c.bench_function("lru_get_hit_512", |b| {
        b.iter(|| {
            for id in &ids {
                black_box(cache.get(id));
            }
        })
    });
}

fn bench_node_encode(c: &mut Criterion) {
    let node = sample_node(256);

    c.bench_function("node_encode_256d", |b| {
        b.iter(|| {
            black_box(node.encode_to_vec().unwrap());
        })
    });
}

fn bench_node_decode(c: &mut Criterion) {
    let node = sample_node(256);
    let bytes = node.encode_to_vec().unwrap();

    c.bench_function("node_decode_256d", |b| {
        b.iter(|| {
            black_box(PatternNode::decode(&mut bytes.as_slice()).unwrap());
        })
    });
}

fn bench_cosine_activation(c: &mut Criterion) {
    let node = sample_node(256);
    let input = FeatureVector::new((0..256).map(|i| (i as f32).cos()).collect());

    c.bench_function("compute_activation_256d", |b| {
        b.iter(|| {
            black_box(node.compute_activation(&input));
        })
    });
}

fn bench_cached_tiered_read(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(TierManager::new(Some(dir.path().to_path_buf())).unwrap());
    let storage = TieredStorage::new(manager, None, TieredStorageConfig::default()).unwrap();

    let node = sample_node(64);
    let id = node.id();
    storage.store_pattern(&node, MemoryTier::Warm);
    // Warm the cache so the loop measures the hit path
    storage.get_pattern(id);

    c.bench_function("tiered_get_cached", |b| {
        b.iter(|| {
            black_box(storage.get_pattern(id));
        })
    });
}

fn bench_warm_tier_read(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(TierManager::new(Some(dir.path().to_path_buf())).unwrap());

    let node = sample_node(64);
    let id = node.id();
    manager.put(&node, MemoryTier::Warm);

    c.bench_function("warm_tier_load", |b| {
        b.iter(|| {
            black_box(manager.tier(MemoryTier::Warm).load_pattern(id));
        })
    });
}

criterion_group!(
    benches,
    bench_lru_get_hit,
    bench_node_encode,
    bench_node_decode,
    bench_cosine_activation,
    bench_cached_tiered_read,
    bench_warm_tier_read,
);
criterion_main!(benches);
