//! Tier manager
//!
//! Owns the four tier backends, routes lookups through them hottest-first,
//! and moves entries between levels. Migration is read, write, then delete:
//! a failed write preserves the source, and a failed delete leaves a
//! transient duplicate plus a queued compensating delete that is drained on
//! later operations. Duplicate residency after a crash is resolved by
//! keeping the copy closest to the active tier.
//!
//! Per-id migrations are serialized by a sharded lock table keyed on the
//! id's own random bits.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::association::AssociationEdge;
use crate::error::{EngramError, Result};
use crate::pattern::{Duration, PatternId, PatternNode, Timestamp};
use crate::storage::{ActiveTier, ArchiveTier, FileTier, MemoryTier, TierStore};

const LOCK_SHARDS: usize = 64;

// ============================================================================
// ID LOCK TABLE
// ============================================================================

/// Sharded per-id critical sections for migration
struct IdLockTable {
    shards: Vec<Mutex<()>>,
}

impl IdLockTable {
    fn new() -> Self {
        Self {
            shards: (0..LOCK_SHARDS).map(|_| Mutex::new(())).collect(),
        }
    }

    fn lock_for(&self, id: PatternId) -> MutexGuard<'_, ()> {
        let (hi, lo) = id.words();
        let shard = ((hi ^ lo) as usize) % self.shards.len();
        self.shards[shard].lock().expect("id lock shard")
    }
}

// ============================================================================
// TIER MANAGER
// ============================================================================

/// Owner and router of the four storage tiers
pub struct TierManager {
    tiers: [Box<dyn TierStore>; 4],
    locks: IdLockTable,
    /// Compensating deletes queued after a failed migration step 3
    pending_deletes: Mutex<Vec<(PatternId, MemoryTier)>>,
}

impl TierManager {
    /// Create a manager rooted at `root`, or at the platform data
    /// directory when `None`
    ///
    /// Layout under the root: `warm/`, `cold/`, and `archive/` file trees;
    /// the active tier lives in memory. Startup rebuilds each disk tier's
    /// index and resolves any duplicate residency left by a crash.
    pub fn new(root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(r) => r,
            None => {
                let dirs = ProjectDirs::from("io", "engram", "engram").ok_or_else(|| {
                    EngramError::InvalidConfig(
                        "could not determine a platform data directory".to_string(),
                    )
                })?;
                dirs.data_dir().to_path_buf()
            }
        };
        std::fs::create_dir_all(&root)?;

        let manager = Self {
            tiers: [
                Box::new(ActiveTier::new()),
                Box::new(FileTier::warm(root.join("warm"))?),
                Box::new(FileTier::cold(root.join("cold"))?),
                Box::new(ArchiveTier::new(root.join("archive"))?),
            ],
            locks: IdLockTable::new(),
            pending_deletes: Mutex::new(Vec::new()),
        };
        let resolved = manager.resolve_duplicates();
        if resolved > 0 {
            info!(resolved, "resolved duplicate tier residency at startup");
        }
        Ok(manager)
    }

    /// Borrow one tier backend
    pub fn tier(&self, level: MemoryTier) -> &dyn TierStore {
        self.tiers[level.index()].as_ref()
    }

    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    /// Store a pattern in the given tier
    pub fn put(&self, pattern: &PatternNode, tier: MemoryTier) -> bool {
        let _guard = self.locks.lock_for(pattern.id());
        self.tier(tier).store_pattern(pattern)
    }

    /// Find a pattern, searching active through archive. Returns the node
    /// with the tier it was found in.
    pub fn get(&self, id: PatternId) -> Option<(PatternNode, MemoryTier)> {
        for tier in &self.tiers {
            if let Some(node) = tier.load_pattern(id) {
                return Some((node, tier.tier_level()));
            }
        }
        None
    }

    /// Purge a pattern from every tier. Returns true if any copy existed.
    pub fn remove(&self, id: PatternId) -> bool {
        let _guard = self.locks.lock_for(id);
        let mut removed = false;
        for tier in &self.tiers {
            removed |= tier.remove_pattern(id);
        }
        removed
    }

    /// Tier currently holding a pattern, hottest first
    pub fn find_tier(&self, id: PatternId) -> Option<MemoryTier> {
        self.tiers
            .iter()
            .find(|t| t.has_pattern(id))
            .map(|t| t.tier_level())
    }

    // ------------------------------------------------------------------
    // Associations
    // ------------------------------------------------------------------

    /// Store an association in the given tier
    pub fn put_association(&self, edge: &AssociationEdge, tier: MemoryTier) -> bool {
        self.tier(tier).store_association(edge)
    }

    /// Find an association, searching active through archive
    pub fn get_association(
        &self,
        source: PatternId,
        target: PatternId,
    ) -> Option<(AssociationEdge, MemoryTier)> {
        for tier in &self.tiers {
            if let Some(edge) = tier.load_association(source, target) {
                return Some((edge, tier.tier_level()));
            }
        }
        None
    }

    /// Purge an association from every tier
    pub fn remove_association(&self, source: PatternId, target: PatternId) -> bool {
        let mut removed = false;
        for tier in &self.tiers {
            removed |= tier.remove_association(source, target);
        }
        removed
    }

    // ------------------------------------------------------------------
    // Migration
    // ------------------------------------------------------------------

    /// Move a pattern between tiers
    ///
    /// Guarantees an at-least-once destination write and an at-most-once
    /// final source delete. A failed destination write leaves the source
    /// untouched and returns false. A failed source delete still counts as
    /// a completed migration: the duplicate is transient and a
    /// compensating delete is queued.
    pub fn migrate(&self, id: PatternId, from: MemoryTier, to: MemoryTier) -> bool {
        if from == to {
            return true;
        }
        self.drain_pending_deletes();

        let _guard = self.locks.lock_for(id);
        let Some(node) = self.tier(from).load_pattern(id) else {
            return false;
        };
        if !self.tier(to).store_pattern(&node) {
            warn!(id = %id, from = %from, to = %to, "migration write failed; source preserved");
            return false;
        }
        if self.tier(from).remove_pattern(id) {
            info!(id = %id, from = %from, to = %to, "migrated pattern");
        } else {
            warn!(id = %id, from = %from, "migration delete failed; compensating delete queued");
            self.pending_deletes
                .lock()
                .expect("pending delete queue")
                .push((id, from));
        }
        true
    }

    /// Retry queued compensating deletes from earlier migrations
    pub fn drain_pending_deletes(&self) {
        let pending: Vec<(PatternId, MemoryTier)> = {
            let mut queue = self.pending_deletes.lock().expect("pending delete queue");
            std::mem::take(&mut *queue)
        };
        for (id, tier) in pending {
            // A missing entry means the delete already happened; either
            // way the duplicate is gone
            self.tier(tier).remove_pattern(id);
        }
    }

    /// Resolve duplicate residency by keeping the copy closest to the
    /// active tier. Returns how many copies were deleted.
    pub fn resolve_duplicates(&self) -> usize {
        let mut removed = 0;
        for (level, tier) in self.tiers.iter().enumerate() {
            for id in tier.pattern_ids() {
                for lower in self.tiers.iter().skip(level + 1) {
                    if lower.has_pattern(id) && lower.remove_pattern(id) {
                        info!(
                            id = %id,
                            keep = tier.tier_name(),
                            drop = lower.tier_name(),
                            "resolved duplicate residency"
                        );
                        removed += 1;
                    }
                }
            }
        }
        removed
    }

    // ------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------

    /// Patterns across all tiers
    pub fn pattern_count(&self) -> usize {
        self.tiers.iter().map(|t| t.pattern_count()).sum()
    }

    /// Associations across all tiers
    pub fn association_count(&self) -> usize {
        self.tiers.iter().map(|t| t.association_count()).sum()
    }

    /// Approximate bytes across all tiers
    pub fn estimate_memory_usage(&self) -> usize {
        self.tiers.iter().map(|t| t.estimate_memory_usage()).sum()
    }

    /// Clear every tier
    pub fn clear(&self) {
        for tier in &self.tiers {
            tier.clear();
        }
        self.pending_deletes
            .lock()
            .expect("pending delete queue")
            .clear();
    }

    /// Flush every tier
    pub fn flush(&self) {
        for tier in &self.tiers {
            tier.flush();
        }
    }
}

// ============================================================================
// ACCESS UTILITY
// ============================================================================

/// Access-density scoring used to drive demotion and promotion sweeps
///
/// Pure policy: scores a node's usage statistics into [0, 1] and maps the
/// score onto a recommended tier. Callers own the sweep loop and invoke
/// [`TierManager::migrate`] with the recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessUtility {
    /// Weight of the access-count component
    pub access_weight: f32,
    /// Weight of the recency component
    pub recency_weight: f32,
    /// Access count at which the count component reaches one half
    pub access_saturation: u32,
    /// Half-life of the recency component
    pub recency_half_life: Duration,
}

impl Default for AccessUtility {
    fn default() -> Self {
        Self {
            access_weight: 0.6,
            recency_weight: 0.4,
            access_saturation: 10,
            recency_half_life: Duration::from_mins(60),
        }
    }
}

impl AccessUtility {
    /// Utility of a node at `now`, in [0, 1]
    pub fn score(&self, node: &PatternNode, now: Timestamp) -> f32 {
        let count = node.access_count() as f32;
        let access = count / (count + self.access_saturation.max(1) as f32);

        let idle = (now - node.last_accessed()).as_secs_f64().max(0.0);
        let half_life = self.recency_half_life.as_secs_f64().max(1e-6);
        let recency = 0.5_f64.powf(idle / half_life) as f32;

        let total_weight = self.access_weight + self.recency_weight;
        if total_weight <= 0.0 {
            return 0.0;
        }
        (self.access_weight * access + self.recency_weight * recency) / total_weight
    }

    /// Tier recommended for a node with the given utility score
    pub fn recommend_tier(&self, score: f32) -> MemoryTier {
        match score {
            s if s >= 0.75 => MemoryTier::Active,
            s if s >= 0.5 => MemoryTier::Warm,
            s if s >= 0.25 => MemoryTier::Cold,
            _ => MemoryTier::Archive,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
