//! # Engram Core
//!
//! A pattern-and-association store with transparent multi-tier storage.
//! Learned patterns (feature-bearing records with statistics) and the
//! directed associations between them are indexed across a four-level
//! hierarchy:
//!
//! - **Active** (RAM): hot patterns, sub-microsecond reads
//! - **Warm** (SSD): file-per-entity, around 10 µs
//! - **Cold** (HDD): same layout on slower media, around 1 ms
//! - **Archive**: zlib-compressed records, around 10 ms
//!
//! Three subsystems cooperate:
//!
//! - **Tiered storage**: four backends behind [`TierStore`], a
//!   [`TierManager`] that routes and migrates, and [`TieredStorage`] with
//!   an LRU front cache, access-driven promotion, and association-graph
//!   prefetching
//! - **Pattern graph**: [`PatternNode`] entities with atomic statistics
//!   and a stable binary form, plus the [`AssociationMatrix`] edge index
//! - **Temporal learning**: [`TemporalLearner`] folds activation streams
//!   into per-pair delay statistics with Welford's online algorithm
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use engram_core::prelude::*;
//!
//! // Tier hierarchy rooted at the platform data directory
//! let manager = Arc::new(TierManager::new(None)?);
//! let matrix = Arc::new(AssociationMatrix::new());
//! let storage = TieredStorage::new(
//!     Arc::clone(&manager),
//!     Some(Arc::clone(&matrix)),
//!     TieredStorageConfig::default(),
//! )?;
//!
//! // Store a pattern and read it back through the cache
//! let node = PatternNode::new(PatternData::from_features(vec![1.0, 2.0, 3.0]), PatternType::Atomic);
//! let id = node.id();
//! storage.store_pattern(&node, MemoryTier::Warm);
//! let loaded = storage.get_pattern(id).unwrap();
//! ```
//!
//! Concurrency model: plain threads, no event loop. Disk tiers block the
//! calling thread; each tier guards its own index with a reader-writer
//! lock, and node statistics are relaxed atomics. [`TemporalLearner`] is
//! the one deliberately unsynchronized component.

#![cfg_attr(docsrs, feature(doc_cfg))]
// Only warn about missing docs for public items exported from the crate root
// Internal struct fields and enum variants don't need documentation
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod association;
pub mod cache;
pub mod error;
pub mod pattern;
pub mod similarity;
pub mod storage;

mod wire;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Pattern graph primitives
pub use pattern::{
    ContextVector, Duration, FeatureVector, Modality, PatternData, PatternId, PatternNode,
    PatternPair, PatternType, Timestamp,
};

// Association layer
pub use association::{
    AssociationEdge, AssociationKind, AssociationMatrix, TemporalConfig, TemporalLearner,
    TemporalStats,
};

// Cache
pub use cache::{LruCache, LruStats};

// Storage hierarchy
pub use storage::{
    AccessUtility, ActiveTier, ArchiveTier, CacheStats, FileTier, MemoryBackend, MemoryTier,
    PatternDatabase, TierBackend, TierManager, TierStore, TieredStorage, TieredStorageConfig,
};

// Similarity metrics
pub use similarity::{
    ContextVectorSimilarity, HierarchicalSimilarity, MetadataSimilarity, SimilarityMetric,
    StatisticalProfile, StatisticalProfileSimilarity, TemporalSimilarity, TypeSimilarity,
};

// Errors
pub use error::{EngramError, Result};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AssociationEdge, AssociationKind, AssociationMatrix, EngramError, FeatureVector,
        MemoryTier, PatternData, PatternDatabase, PatternId, PatternNode, PatternType, Result,
        TemporalConfig, TemporalLearner, TierManager, TierStore, TieredStorage,
        TieredStorageConfig, Timestamp,
    };
}
