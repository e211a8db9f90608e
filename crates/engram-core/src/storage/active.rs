//! Active tier
//!
//! In-memory hash tables for the hottest patterns and associations.
//! Reads take the shared lock only as long as the clone; nothing here
//! touches the disk, so `flush` is a no-op.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::association::AssociationEdge;
use crate::pattern::{PatternId, PatternNode, PatternPair};
use crate::storage::{MemoryTier, TierStore};

/// Rough per-entry bookkeeping overhead of the backing hash tables
const ENTRY_OVERHEAD: usize = 48;

/// RAM-backed storage tier
#[derive(Default)]
pub struct ActiveTier {
    patterns: RwLock<HashMap<PatternId, PatternNode>>,
    associations: RwLock<HashMap<PatternPair, AssociationEdge>>,
}

impl ActiveTier {
    /// Empty tier
    pub fn new() -> Self {
        Self::default()
    }
}

impl TierStore for ActiveTier {
    fn store_pattern(&self, pattern: &PatternNode) -> bool {
        self.patterns
            .write()
            .expect("pattern table lock")
            .insert(pattern.id(), pattern.clone());
        true
    }

    fn load_pattern(&self, id: PatternId) -> Option<PatternNode> {
        self.patterns
            .read()
            .expect("pattern table lock")
            .get(&id)
            .cloned()
    }

    fn remove_pattern(&self, id: PatternId) -> bool {
        self.patterns
            .write()
            .expect("pattern table lock")
            .remove(&id)
            .is_some()
    }

    fn has_pattern(&self, id: PatternId) -> bool {
        self.patterns
            .read()
            .expect("pattern table lock")
            .contains_key(&id)
    }

    fn pattern_ids(&self) -> Vec<PatternId> {
        self.patterns
            .read()
            .expect("pattern table lock")
            .keys()
            .copied()
            .collect()
    }

    fn store_association(&self, edge: &AssociationEdge) -> bool {
        self.associations
            .write()
            .expect("association table lock")
            .insert((edge.source(), edge.target()), edge.clone());
        true
    }

    fn load_association(&self, source: PatternId, target: PatternId) -> Option<AssociationEdge> {
        self.associations
            .read()
            .expect("association table lock")
            .get(&(source, target))
            .cloned()
    }

    fn remove_association(&self, source: PatternId, target: PatternId) -> bool {
        self.associations
            .write()
            .expect("association table lock")
            .remove(&(source, target))
            .is_some()
    }

    fn has_association(&self, source: PatternId, target: PatternId) -> bool {
        self.associations
            .read()
            .expect("association table lock")
            .contains_key(&(source, target))
    }

    fn association_keys(&self) -> Vec<PatternPair> {
        self.associations
            .read()
            .expect("association table lock")
            .keys()
            .copied()
            .collect()
    }

    fn pattern_count(&self) -> usize {
        self.patterns.read().expect("pattern table lock").len()
    }

    fn association_count(&self) -> usize {
        self.associations
            .read()
            .expect("association table lock")
            .len()
    }

    fn estimate_memory_usage(&self) -> usize {
        let patterns = self.patterns.read().expect("pattern table lock");
        let associations = self.associations.read().expect("association table lock");
        let pattern_bytes: usize = patterns
            .values()
            .map(|p| p.estimate_memory_usage() + ENTRY_OVERHEAD)
            .sum();
        let association_bytes =
            associations.len() * (std::mem::size_of::<AssociationEdge>() + ENTRY_OVERHEAD);
        pattern_bytes + association_bytes
    }

    fn tier_level(&self) -> MemoryTier {
        MemoryTier::Active
    }

    fn compact(&self) {
        self.patterns.write().expect("pattern table lock").shrink_to_fit();
        self.associations
            .write()
            .expect("association table lock")
            .shrink_to_fit();
    }

    fn clear(&self) {
        self.patterns.write().expect("pattern table lock").clear();
        self.associations
            .write()
            .expect("association table lock")
            .clear();
    }
}

// ============================================================================
// TESTS
// ============================================================================
