//! Transparent tiered access
//!
//! [`TieredStorage`] fronts the tier hierarchy with an LRU cache and an
//! association-graph prefetcher:
//!
//! - reads check the cache, then fall through the tiers hottest-first
//! - repeatedly accessed patterns are promoted one level toward active
//! - a fresh tier hit prefetches the strongest associated patterns into
//!   the cache, bounded by depth and count, best-effort
//!
//! Cached nodes are shared through `Arc`; a cached copy is not a tier
//! residence and never changes where a pattern lives.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::association::AssociationMatrix;
use crate::cache::LruCache;
use crate::error::{EngramError, Result};
use crate::pattern::{PatternId, PatternNode};
use crate::storage::{MemoryTier, TierManager};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Tiered storage tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieredStorageConfig {
    /// LRU cache capacity in patterns
    pub cache_capacity: usize,
    /// Promote patterns toward the active tier on repeated access
    pub enable_auto_promotion: bool,
    /// Accesses to a single id before promotion fires
    pub promotion_access_threshold: usize,
    /// Prefetch associated patterns after tier hits
    pub enable_prefetching: bool,
    /// Association-graph hops per prefetch (0 disables)
    pub prefetch_max_depth: usize,
    /// Hard cap on patterns loaded per prefetch
    pub prefetch_max_patterns: usize,
}

impl Default for TieredStorageConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 10_000,
            enable_auto_promotion: true,
            promotion_access_threshold: 3,
            enable_prefetching: true,
            prefetch_max_depth: 1,
            prefetch_max_patterns: 10,
        }
    }
}

impl TieredStorageConfig {
    /// Reject nonsensical settings
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(EngramError::InvalidConfig(
                "cache_capacity must be at least 1".into(),
            ));
        }
        if self.promotion_access_threshold == 0 {
            return Err(EngramError::InvalidConfig(
                "promotion_access_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Counters for the transparent access layer
///
/// Individually consistent; the snapshot as a whole is not atomic.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    /// Cache lookups that hit
    pub hits: u64,
    /// Cache lookups that missed
    pub misses: u64,
    /// Cache entries displaced by capacity pressure
    pub evictions: u64,
    /// Promotions scheduled by repeated access
    pub promotions: u64,
    /// Prefetch operations triggered
    pub prefetch_requests: u64,
    /// Patterns loaded into the cache by prefetching
    pub prefetch_patterns_loaded: u64,
}

impl CacheStats {
    /// hits / (hits + misses), 0 when idle
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

// ============================================================================
// TIERED STORAGE
// ============================================================================

/// Transparent access layer over the tier hierarchy
pub struct TieredStorage {
    config: RwLock<TieredStorageConfig>,
    manager: Arc<TierManager>,
    associations: Option<Arc<AssociationMatrix>>,
    cache: LruCache<PatternId, Arc<PatternNode>>,

    /// Sliding per-id access counts for promotion decisions
    access_counts: RwLock<HashMap<PatternId, usize>>,

    promotions: AtomicU64,
    prefetch_requests: AtomicU64,
    prefetch_patterns_loaded: AtomicU64,
}

impl TieredStorage {
    /// Create the access layer over a tier manager
    ///
    /// The association matrix is optional; without one, prefetching is
    /// silently disabled.
    pub fn new(
        manager: Arc<TierManager>,
        associations: Option<Arc<AssociationMatrix>>,
        config: TieredStorageConfig,
    ) -> Result<Self> {
        config.validate()?;
        let cache = LruCache::new(config.cache_capacity);
        Ok(Self {
            config: RwLock::new(config),
            manager,
            associations,
            cache,
            access_counts: RwLock::new(HashMap::new()),
            promotions: AtomicU64::new(0),
            prefetch_requests: AtomicU64::new(0),
            prefetch_patterns_loaded: AtomicU64::new(0),
        })
    }

    // ------------------------------------------------------------------
    // Pattern access
    // ------------------------------------------------------------------

    /// Get a pattern from the cache or any tier
    ///
    /// A tier hit populates the cache and, when enabled, prefetches the
    /// pattern's strongest associations. Never changes tier residence.
    pub fn get_pattern(&self, id: PatternId) -> Option<Arc<PatternNode>> {
        if let Some(hit) = self.cache.get(&id) {
            return Some(hit);
        }

        let (node, _tier) = self.manager.get(id)?;
        let node = Arc::new(node);
        self.cache.put(id, Arc::clone(&node));

        let (enabled, depth) = {
            let config = self.config.read().expect("config lock");
            (config.enable_prefetching, config.prefetch_max_depth)
        };
        if enabled && depth > 0 {
            self.prefetch_associations(id, depth);
        }

        Some(node)
    }

    /// Get a pattern and count the access toward automatic promotion
    ///
    /// Once an id's sliding access count reaches the configured threshold,
    /// it is migrated one tier toward active and the count resets.
    pub fn get_pattern_with_promotion(&self, id: PatternId) -> Option<Arc<PatternNode>> {
        let node = self.get_pattern(id)?;
        if self.config.read().expect("config lock").enable_auto_promotion {
            self.record_promotion_access(id);
        }
        Some(node)
    }

    /// Store a pattern in the given tier, invalidating any cached copy so
    /// the next read observes the stored version
    pub fn store_pattern(&self, pattern: &PatternNode, tier: MemoryTier) -> bool {
        let stored = self.manager.put(pattern, tier);
        if stored {
            self.cache.remove(&pattern.id());
        }
        stored
    }

    /// Store a pattern in the active tier
    pub fn store_pattern_active(&self, pattern: &PatternNode) -> bool {
        self.store_pattern(pattern, MemoryTier::Active)
    }

    /// Remove a pattern from every tier and from the cache
    pub fn remove_pattern(&self, id: PatternId) -> bool {
        let removed = self.manager.remove(id);
        self.cache.remove(&id);
        self.access_counts
            .write()
            .expect("access count lock")
            .remove(&id);
        removed
    }

    /// Whether a pattern exists in any tier
    pub fn has_pattern(&self, id: PatternId) -> bool {
        self.manager.find_tier(id).is_some()
    }

    /// Tier a pattern currently resides in
    pub fn pattern_tier(&self, id: PatternId) -> Option<MemoryTier> {
        self.manager.find_tier(id)
    }

    // ------------------------------------------------------------------
    // Promotion
    // ------------------------------------------------------------------

    fn record_promotion_access(&self, id: PatternId) {
        let threshold = self
            .config
            .read()
            .expect("config lock")
            .promotion_access_threshold;

        let count = {
            let mut counts = self.access_counts.write().expect("access count lock");
            let entry = counts.entry(id).or_insert(0);
            *entry += 1;
            *entry
        };
        if count < threshold {
            return;
        }

        // Threshold reached: reset the window and promote one level if
        // the pattern is not already active
        self.access_counts
            .write()
            .expect("access count lock")
            .remove(&id);

        let Some(current) = self.manager.find_tier(id) else {
            return;
        };
        let Some(target) = current.promoted() else {
            return;
        };
        if self.manager.migrate(id, current, target) {
            self.promotions.fetch_add(1, Ordering::Relaxed);
            info!(id = %id, from = %current, to = %target, "promoted pattern on access");
        }
    }

    // ------------------------------------------------------------------
    // Prefetching
    // ------------------------------------------------------------------

    /// Prefetch patterns associated with `id` into the cache
    ///
    /// Follows outbound associations strongest-first up to `max_depth`
    /// hops, loading at most `prefetch_max_patterns` patterns. Best-effort:
    /// failures and misses are ignored, and promotion is never triggered.
    pub fn prefetch_associations(&self, id: PatternId, max_depth: usize) {
        let Some(matrix) = &self.associations else {
            return;
        };
        if max_depth == 0 {
            return;
        }
        self.prefetch_requests.fetch_add(1, Ordering::Relaxed);

        let budget = self
            .config
            .read()
            .expect("config lock")
            .prefetch_max_patterns;
        let mut visited = HashSet::from([id]);
        let mut loaded = 0usize;
        self.prefetch_level(matrix, id, 1, max_depth, budget, &mut visited, &mut loaded);
        if loaded > 0 {
            debug!(anchor = %id, loaded, "prefetched associated patterns");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn prefetch_level(
        &self,
        matrix: &AssociationMatrix,
        id: PatternId,
        depth: usize,
        max_depth: usize,
        budget: usize,
        visited: &mut HashSet<PatternId>,
        loaded: &mut usize,
    ) {
        for edge in matrix.outgoing_of(id) {
            if *loaded >= budget {
                return;
            }
            let target = edge.target();
            if !visited.insert(target) {
                continue;
            }
            if self.load_into_cache(target) {
                *loaded += 1;
                self.prefetch_patterns_loaded.fetch_add(1, Ordering::Relaxed);
                if depth < max_depth {
                    self.prefetch_level(matrix, target, depth + 1, max_depth, budget, visited, loaded);
                }
            }
        }
    }

    /// Prefetch explicit ids into the cache
    pub fn prefetch_patterns(&self, ids: &[PatternId]) {
        self.prefetch_requests.fetch_add(1, Ordering::Relaxed);
        for id in ids {
            if self.load_into_cache(*id) {
                self.prefetch_patterns_loaded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Pull a pattern into the cache without counting cache statistics or
    /// access tracking. Returns true if a tier load happened.
    fn load_into_cache(&self, id: PatternId) -> bool {
        if self.cache.contains(&id) {
            return false;
        }
        match self.manager.get(id) {
            Some((node, _tier)) => {
                self.cache.put(id, Arc::new(node));
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Cache management
    // ------------------------------------------------------------------

    /// Drop every cached pattern. Tier contents are unaffected.
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.access_counts
            .write()
            .expect("access count lock")
            .clear();
    }

    /// Counter snapshot
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.cache.hits(),
            misses: self.cache.misses(),
            evictions: self.cache.evictions(),
            promotions: self.promotions.load(Ordering::Relaxed),
            prefetch_requests: self.prefetch_requests.load(Ordering::Relaxed),
            prefetch_patterns_loaded: self.prefetch_patterns_loaded.load(Ordering::Relaxed),
        }
    }

    /// Patterns currently cached
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Cache capacity in patterns
    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Replace the cache capacity, dropping current contents
    pub fn set_cache_capacity(&self, capacity: usize) {
        self.cache.set_capacity(capacity);
        self.config.write().expect("config lock").cache_capacity = capacity.max(1);
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Current configuration
    pub fn config(&self) -> TieredStorageConfig {
        self.config.read().expect("config lock").clone()
    }

    /// Replace the configuration. Cache capacity changes take effect
    /// immediately and drop cached contents.
    pub fn set_config(&self, config: TieredStorageConfig) -> Result<()> {
        config.validate()?;
        let capacity_changed = {
            let mut current = self.config.write().expect("config lock");
            let changed = current.cache_capacity != config.cache_capacity;
            *current = config;
            changed
        };
        if capacity_changed {
            let capacity = self.config.read().expect("config lock").cache_capacity;
            self.cache.set_capacity(capacity);
        }
        Ok(())
    }

    /// Borrow the underlying tier manager
    pub fn manager(&self) -> &TierManager {
        &self.manager
    }
}

// ============================================================================
// TESTS
// ============================================================================
