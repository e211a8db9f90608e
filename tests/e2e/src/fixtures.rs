//! Test fixtures
//!
//! Isolated storage hierarchies rooted in temporary directories, cleaned
//! up on drop, plus helpers for building patterns with known content.

use std::sync::Arc;

use engram_core::{
    AssociationMatrix, PatternData, PatternNode, PatternType, TierManager, TieredStorage,
    TieredStorageConfig,
};
use tempfile::TempDir;

/// A complete storage stack over a temporary on-disk root
///
/// The temporary directory lives as long as the harness; dropping the
/// harness deletes every tier file.
pub struct StorageHarness {
    /// Transparent access layer under test
    pub storage: TieredStorage,
    /// Tier hierarchy shared with the storage layer
    pub manager: Arc<TierManager>,
    /// Association graph feeding the prefetcher
    pub matrix: Arc<AssociationMatrix>,
    /// Keeps the on-disk root alive
    _root: TempDir,
}

impl StorageHarness {
    /// Harness with default configuration
    pub fn new() -> Self {
        Self::with_config(TieredStorageConfig::default())
    }

    /// Harness with a custom configuration
    pub fn with_config(config: TieredStorageConfig) -> Self {
        let root = TempDir::new().expect("failed to create temp storage root");
        let manager =
            Arc::new(TierManager::new(Some(root.path().to_path_buf())).expect("tier manager"));
        let matrix = Arc::new(AssociationMatrix::new());
        let storage = TieredStorage::new(
            Arc::clone(&manager),
            Some(Arc::clone(&matrix)),
            config,
        )
        .expect("tiered storage");

        Self {
            storage,
            manager,
            matrix,
            _root: root,
        }
    }

    /// Path to the on-disk root
    pub fn root(&self) -> &std::path::Path {
        self._root.path()
    }
}

impl Default for StorageHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Atomic pattern with the given features
pub fn pattern(features: Vec<f32>) -> PatternNode {
    PatternNode::new(PatternData::from_features(features), PatternType::Atomic)
}

/// A batch of distinct patterns with one-hot-ish feature vectors
pub fn pattern_batch(count: usize, dimension: usize) -> Vec<PatternNode> {
    (0..count)
        .map(|i| {
            let features: Vec<f32> = (0..dimension)
                .map(|j| if j == i % dimension { 1.0 } else { 0.1 })
                .collect();
            pattern(features)
        })
        .collect()
}
