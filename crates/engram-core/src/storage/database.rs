//! Pattern database interface
//!
//! The contract consumed by the policy layers that create, refine, and
//! prune patterns. Two implementations: [`MemoryBackend`], a plain
//! concurrent map used as the canonical backend in tests, and
//! [`TierBackend`], which adapts any tier backend to the same interface.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{EngramError, Result};
use crate::pattern::{PatternId, PatternNode};
use crate::storage::TierStore;

// ============================================================================
// TRAIT
// ============================================================================

/// Store of patterns keyed by id
///
/// Implementations need not preserve insertion order in `find_all`.
pub trait PatternDatabase: Send + Sync {
    /// Insert a pattern
    fn store(&self, node: &PatternNode) -> Result<()>;

    /// Load a pattern by id
    fn load(&self, id: PatternId) -> Result<PatternNode>;

    /// Replace a stored pattern
    fn update(&self, node: &PatternNode) -> Result<()>;

    /// Remove a pattern by id
    fn remove(&self, id: PatternId) -> Result<()>;

    /// Ids of every stored pattern, in no particular order
    fn find_all(&self) -> Vec<PatternId>;

    /// Number of stored patterns
    fn count(&self) -> usize;
}

// ============================================================================
// MEMORY BACKEND
// ============================================================================

/// Concurrent in-memory pattern database
#[derive(Default)]
pub struct MemoryBackend {
    patterns: RwLock<HashMap<PatternId, PatternNode>>,
}

impl MemoryBackend {
    /// Empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl PatternDatabase for MemoryBackend {
    fn store(&self, node: &PatternNode) -> Result<()> {
        self.patterns
            .write()
            .expect("pattern map lock")
            .insert(node.id(), node.clone());
        Ok(())
    }

    fn load(&self, id: PatternId) -> Result<PatternNode> {
        self.patterns
            .read()
            .expect("pattern map lock")
            .get(&id)
            .cloned()
            .ok_or_else(|| EngramError::NotFound(id.to_hex()))
    }

    fn update(&self, node: &PatternNode) -> Result<()> {
        let mut patterns = self.patterns.write().expect("pattern map lock");
        if !patterns.contains_key(&node.id()) {
            return Err(EngramError::NotFound(node.id().to_hex()));
        }
        patterns.insert(node.id(), node.clone());
        Ok(())
    }

    fn remove(&self, id: PatternId) -> Result<()> {
        self.patterns
            .write()
            .expect("pattern map lock")
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EngramError::NotFound(id.to_hex()))
    }

    fn find_all(&self) -> Vec<PatternId> {
        self.patterns
            .read()
            .expect("pattern map lock")
            .keys()
            .copied()
            .collect()
    }

    fn count(&self) -> usize {
        self.patterns.read().expect("pattern map lock").len()
    }
}

// ============================================================================
// TIER BACKEND ADAPTER
// ============================================================================

/// Adapter exposing a tier backend through the database interface
pub struct TierBackend<T: TierStore> {
    tier: T,
}

impl<T: TierStore> TierBackend<T> {
    /// Wrap a tier
    pub fn new(tier: T) -> Self {
        Self { tier }
    }

    /// Borrow the underlying tier
    pub fn tier(&self) -> &T {
        &self.tier
    }

    /// Unwrap the underlying tier
    pub fn into_inner(self) -> T {
        self.tier
    }
}

impl<T: TierStore> PatternDatabase for TierBackend<T> {
    fn store(&self, node: &PatternNode) -> Result<()> {
        if self.tier.store_pattern(node) {
            Ok(())
        } else {
            Err(EngramError::Io(std::io::Error::other(format!(
                "tier {} rejected pattern {}",
                self.tier.tier_name(),
                node.id()
            ))))
        }
    }

    fn load(&self, id: PatternId) -> Result<PatternNode> {
        self.tier
            .load_pattern(id)
            .ok_or_else(|| EngramError::NotFound(id.to_hex()))
    }

    fn update(&self, node: &PatternNode) -> Result<()> {
        if !self.tier.has_pattern(node.id()) {
            return Err(EngramError::NotFound(node.id().to_hex()));
        }
        self.store(node)
    }

    fn remove(&self, id: PatternId) -> Result<()> {
        if self.tier.remove_pattern(id) {
            Ok(())
        } else {
            Err(EngramError::NotFound(id.to_hex()))
        }
    }

    fn find_all(&self) -> Vec<PatternId> {
        self.tier.pattern_ids()
    }

    fn count(&self) -> usize {
        self.tier.pattern_count()
    }
}

// ============================================================================
// TESTS
// ============================================================================
