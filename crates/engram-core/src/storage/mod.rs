//! Tiered storage
//!
//! Four storage backends behind one trait, each with its own latency
//! envelope:
//!
//! 1. Active (RAM): hot patterns, target read under 100 ns
//! 2. Warm (SSD): recently used, target read under 10 µs
//! 3. Cold (HDD): rarely accessed, target read under 1 ms
//! 4. Archive (compressed disk): long-term, target read under 10 ms
//!
//! The [`TierManager`] owns the hierarchy and moves entries between
//! levels; [`TieredStorage`] puts an LRU cache and an association-graph
//! prefetcher in front of it.

mod active;
mod database;
mod disk;
mod manager;
mod tiered;

pub use active::ActiveTier;
pub use database::{MemoryBackend, PatternDatabase, TierBackend};
pub use disk::{ArchiveTier, FileTier};
pub use manager::{AccessUtility, TierManager};
pub use tiered::{CacheStats, TieredStorage, TieredStorageConfig};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::association::AssociationEdge;
use crate::pattern::{PatternId, PatternNode, PatternPair};

// ============================================================================
// MEMORY TIER
// ============================================================================

/// Storage tier levels, ordered hottest first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTier {
    /// RAM-based, fastest
    Active = 0,
    /// SSD-based, fast
    Warm = 1,
    /// HDD-based, slow
    Cold = 2,
    /// Compressed disk, slowest
    Archive = 3,
}

impl MemoryTier {
    /// All tiers, hottest first
    pub const ALL: [MemoryTier; 4] = [
        MemoryTier::Active,
        MemoryTier::Warm,
        MemoryTier::Cold,
        MemoryTier::Archive,
    ];

    /// Tier name
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTier::Active => "active",
            MemoryTier::Warm => "warm",
            MemoryTier::Cold => "cold",
            MemoryTier::Archive => "archive",
        }
    }

    /// Position in the hierarchy (0 = hottest)
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Tier for an index, if in range
    pub fn from_index(index: usize) -> Option<MemoryTier> {
        MemoryTier::ALL.get(index).copied()
    }

    /// One level closer to Active, or `None` from Active
    pub fn promoted(&self) -> Option<MemoryTier> {
        match self {
            MemoryTier::Active => None,
            MemoryTier::Warm => Some(MemoryTier::Active),
            MemoryTier::Cold => Some(MemoryTier::Warm),
            MemoryTier::Archive => Some(MemoryTier::Cold),
        }
    }

    /// One level further from Active, or `None` from Archive
    pub fn demoted(&self) -> Option<MemoryTier> {
        match self {
            MemoryTier::Active => Some(MemoryTier::Warm),
            MemoryTier::Warm => Some(MemoryTier::Cold),
            MemoryTier::Cold => Some(MemoryTier::Archive),
            MemoryTier::Archive => None,
        }
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MemoryTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(MemoryTier::Active),
            "warm" => Ok(MemoryTier::Warm),
            "cold" => Ok(MemoryTier::Cold),
            "archive" => Ok(MemoryTier::Archive),
            other => Err(format!("Unknown tier: {other}")),
        }
    }
}

// ============================================================================
// TIER STORE TRAIT
// ============================================================================

/// Storage backend contract shared by all four tiers
///
/// Failure policy: tiers never propagate errors. Internal failures become
/// `false` or `None` at this boundary (logged via `tracing`), so a miss
/// and a failed read are indistinguishable to callers by design.
pub trait TierStore: Send + Sync {
    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    /// Store a pattern. Returns true on success.
    fn store_pattern(&self, pattern: &PatternNode) -> bool;

    /// Load a pattern, if present and readable
    fn load_pattern(&self, id: PatternId) -> Option<PatternNode>;

    /// Remove a pattern. Returns true if it was present.
    fn remove_pattern(&self, id: PatternId) -> bool;

    /// Whether a pattern is present
    fn has_pattern(&self, id: PatternId) -> bool;

    /// Snapshot of every pattern id in this tier
    fn pattern_ids(&self) -> Vec<PatternId>;

    // ------------------------------------------------------------------
    // Associations
    // ------------------------------------------------------------------

    /// Store an association. Returns true on success.
    fn store_association(&self, edge: &AssociationEdge) -> bool;

    /// Load an association by its directed key
    fn load_association(&self, source: PatternId, target: PatternId) -> Option<AssociationEdge>;

    /// Remove an association. Returns true if it was present.
    fn remove_association(&self, source: PatternId, target: PatternId) -> bool;

    /// Whether an association is present
    fn has_association(&self, source: PatternId, target: PatternId) -> bool;

    /// Snapshot of every directed association key in this tier
    fn association_keys(&self) -> Vec<PatternPair>;

    // ------------------------------------------------------------------
    // Batch operations (semantically per-item loops)
    // ------------------------------------------------------------------

    /// Store many patterns. Returns how many succeeded.
    fn store_patterns_batch(&self, patterns: &[PatternNode]) -> usize {
        patterns.iter().filter(|p| self.store_pattern(p)).count()
    }

    /// Load many patterns. Missing ids are skipped.
    fn load_patterns_batch(&self, ids: &[PatternId]) -> Vec<PatternNode> {
        ids.iter().filter_map(|id| self.load_pattern(*id)).collect()
    }

    /// Remove many patterns. Returns how many were present.
    fn remove_patterns_batch(&self, ids: &[PatternId]) -> usize {
        ids.iter().filter(|id| self.remove_pattern(**id)).count()
    }

    /// Store many associations. Returns how many succeeded.
    fn store_associations_batch(&self, edges: &[AssociationEdge]) -> usize {
        edges.iter().filter(|e| self.store_association(e)).count()
    }

    // ------------------------------------------------------------------
    // Statistics & maintenance
    // ------------------------------------------------------------------

    /// Number of patterns resident in this tier
    fn pattern_count(&self) -> usize;

    /// Number of associations resident in this tier
    fn association_count(&self) -> usize;

    /// Approximate bytes used (RAM for Active, disk for the rest)
    fn estimate_memory_usage(&self) -> usize;

    /// This backend's level in the hierarchy
    fn tier_level(&self) -> MemoryTier;

    /// This backend's name
    fn tier_name(&self) -> &'static str {
        self.tier_level().as_str()
    }

    /// Reduce fragmentation or table overhead. Best effort.
    fn compact(&self);

    /// Drop every pattern and association in this tier
    fn clear(&self);

    /// Flush pending writes. All current backends write synchronously, so
    /// this is a no-op for every tier.
    fn flush(&self) {}
}

// ============================================================================
// TESTS
// ============================================================================
