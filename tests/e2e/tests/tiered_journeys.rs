//! Tiered storage journeys
//!
//! End-to-end walks through the storage hierarchy: store/load round
//! trips against real tier files, transparent read-through, promotion,
//! prefetching, eviction, and crash recovery.

use std::sync::Arc;

use engram_core::{
    AssociationKind, MemoryTier, TierManager, TieredStorage, TieredStorageConfig,
};
use engram_e2e_tests::fixtures::{StorageHarness, pattern, pattern_batch};

#[test]
fn warm_store_load_round_trip() {
    let harness = StorageHarness::new();
    let node = pattern(vec![1.0, 2.0, 3.0]);
    let id = node.id();

    assert!(harness.storage.store_pattern(&node, MemoryTier::Warm));
    assert_eq!(harness.manager.tier(MemoryTier::Warm).pattern_count(), 1);

    let loaded = harness
        .manager
        .tier(MemoryTier::Warm)
        .load_pattern(id)
        .expect("pattern readable from warm tier");
    assert_eq!(loaded, node);

    let file = harness
        .root()
        .join("warm")
        .join("patterns")
        .join(format!("{}.pat", id.to_hex()));
    assert!(file.exists(), "expected {}", file.display());
}

#[test]
fn transparent_read_through_from_archive() {
    let harness = StorageHarness::new();
    let node = pattern(vec![0.5, 0.25]);
    let id = node.id();

    // Resides only in the archive
    harness.storage.store_pattern(&node, MemoryTier::Archive);
    assert_eq!(harness.storage.pattern_tier(id), Some(MemoryTier::Archive));

    let first = harness.storage.get_pattern(id).expect("read-through");
    assert_eq!(*first, node);
    let stats = harness.storage.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 0);

    // Second read is a cache hit; misses unchanged
    harness.storage.get_pattern(id).expect("cached");
    let stats = harness.storage.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    // Reads never move the pattern
    assert_eq!(harness.storage.pattern_tier(id), Some(MemoryTier::Archive));
}

#[test]
fn repeated_access_promotes_toward_active() {
    let config = TieredStorageConfig {
        promotion_access_threshold: 3,
        enable_prefetching: false,
        ..TieredStorageConfig::default()
    };
    let harness = StorageHarness::with_config(config);
    let node = pattern(vec![1.0, 1.0, 2.0]);
    let id = node.id();
    harness.storage.store_pattern(&node, MemoryTier::Cold);

    for _ in 0..3 {
        harness
            .storage
            .get_pattern_with_promotion(id)
            .expect("pattern present");
    }

    // On the fourth access the pattern already resides one tier up
    let fourth = harness.storage.get_pattern_with_promotion(id).unwrap();
    assert_eq!(*fourth, node);
    assert_eq!(harness.storage.pattern_tier(id), Some(MemoryTier::Warm));
    assert!(harness.storage.cache_stats().promotions >= 1);
    assert!(!harness.manager.tier(MemoryTier::Cold).has_pattern(id));
}

#[test]
fn prefetch_loads_associated_patterns() {
    let harness = StorageHarness::new();
    let a = pattern(vec![1.0, 0.0]);
    let b = pattern(vec![0.0, 1.0]);
    let c = pattern(vec![1.0, 1.0]);
    let (ida, idb, idc) = (a.id(), b.id(), c.id());

    for node in [&a, &b, &c] {
        harness.storage.store_pattern(node, MemoryTier::Cold);
    }
    harness
        .matrix
        .add_or_reinforce(ida, idb, AssociationKind::Semantic, 0.9);
    harness
        .matrix
        .add_or_reinforce(ida, idc, AssociationKind::Semantic, 0.8);

    harness.storage.prefetch_associations(ida, 1);

    let stats = harness.storage.cache_stats();
    assert_eq!(stats.prefetch_patterns_loaded, 2);

    // B and C are now cache hits
    harness.storage.get_pattern(idb).unwrap();
    harness.storage.get_pattern(idc).unwrap();
    assert_eq!(harness.storage.cache_stats().hits, 2);
}

#[test]
fn eviction_follows_lru_order() {
    let config = TieredStorageConfig {
        cache_capacity: 2,
        enable_prefetching: false,
        ..TieredStorageConfig::default()
    };
    let harness = StorageHarness::with_config(config);
    let nodes = pattern_batch(3, 4);

    for node in &nodes {
        harness.storage.store_pattern(node, MemoryTier::Warm);
        harness.storage.get_pattern(node.id());
    }

    // X (oldest) was evicted; Y and Z remain
    assert_eq!(harness.storage.cache_size(), 2);
    assert_eq!(harness.storage.cache_stats().evictions, 1);

    let stats_before = harness.storage.cache_stats();
    harness.storage.get_pattern(nodes[0].id());
    // The evicted id misses and falls through to the tiers again
    assert_eq!(harness.storage.cache_stats().misses, stats_before.misses + 1);
}

#[test]
fn remove_purges_tiers_and_cache() {
    let harness = StorageHarness::new();
    let node = pattern(vec![2.0, 4.0]);
    let id = node.id();

    harness.storage.store_pattern(&node, MemoryTier::Warm);
    harness.storage.get_pattern(id);

    assert!(harness.storage.remove_pattern(id));
    assert!(!harness.storage.has_pattern(id));
    assert!(harness.storage.get_pattern(id).is_none());
    for tier in MemoryTier::ALL {
        assert!(!harness.manager.tier(tier).has_pattern(id));
    }
}

#[test]
fn disk_tiers_survive_reopen() {
    let root = tempfile::TempDir::new().unwrap();
    let warm = pattern(vec![1.0]);
    let archived = pattern(vec![2.0]);

    {
        let manager = Arc::new(TierManager::new(Some(root.path().to_path_buf())).unwrap());
        manager.put(&warm, MemoryTier::Warm);
        manager.put(&archived, MemoryTier::Archive);
    }

    // A fresh manager over the same root rebuilds indices from disk
    let manager = Arc::new(TierManager::new(Some(root.path().to_path_buf())).unwrap());
    assert_eq!(manager.find_tier(warm.id()), Some(MemoryTier::Warm));
    assert_eq!(manager.find_tier(archived.id()), Some(MemoryTier::Archive));
    assert_eq!(manager.get(warm.id()).unwrap().0, warm);
    assert_eq!(manager.get(archived.id()).unwrap().0, archived);

    let storage =
        TieredStorage::new(Arc::clone(&manager), None, TieredStorageConfig::default()).unwrap();
    assert_eq!(*storage.get_pattern(archived.id()).unwrap(), archived);
}

#[test]
fn crash_duplicates_resolve_to_hotter_tier() {
    let root = tempfile::TempDir::new().unwrap();
    let node = pattern(vec![3.0]);
    let id = node.id();

    {
        let manager = TierManager::new(Some(root.path().to_path_buf())).unwrap();
        // Simulate a crash between migration write and delete
        manager.put(&node, MemoryTier::Warm);
        manager.put(&node, MemoryTier::Cold);
    }

    let reopened = TierManager::new(Some(root.path().to_path_buf())).unwrap();
    assert_eq!(reopened.find_tier(id), Some(MemoryTier::Warm));
    assert!(!reopened.tier(MemoryTier::Cold).has_pattern(id));
    assert_eq!(reopened.pattern_count(), 1);
}

#[test]
fn config_round_trips_through_json() {
    let config = TieredStorageConfig {
        cache_capacity: 128,
        promotion_access_threshold: 5,
        prefetch_max_depth: 2,
        ..TieredStorageConfig::default()
    };

    let json = serde_json::to_string(&config).unwrap();
    let parsed: TieredStorageConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.cache_capacity, 128);
    assert_eq!(parsed.promotion_access_threshold, 5);
    assert_eq!(parsed.prefetch_max_depth, 2);
    assert!(parsed.validate().is_ok());

    let harness = StorageHarness::with_config(parsed);
    assert_eq!(harness.storage.cache_capacity(), 128);
}

#[test]
fn migration_preserves_node_statistics() {
    let harness = StorageHarness::new();
    let node = pattern(vec![1.0, 2.0]);
    let id = node.id();
    node.record_access();
    node.record_access();
    node.set_confidence_score(0.85);
    node.add_sub_pattern(pattern(vec![9.0]).id());

    harness.storage.store_pattern(&node, MemoryTier::Archive);
    assert!(harness.manager.migrate(id, MemoryTier::Archive, MemoryTier::Warm));
    assert!(harness.manager.migrate(id, MemoryTier::Warm, MemoryTier::Active));

    let (resident, tier) = harness.manager.get(id).unwrap();
    assert_eq!(tier, MemoryTier::Active);
    assert_eq!(resident, node);
    assert_eq!(resident.access_count(), 2);
    assert_eq!(resident.confidence_score(), 0.85);
    assert_eq!(resident.sub_patterns().len(), 1);
}
