//! Association matrix
//!
//! Sparse directed adjacency over the pattern graph: a forward map from
//! source to `target -> edge`, plus a reverse index so incoming queries do
//! not scan the whole matrix. One reader-writer lock guards both; reads
//! are concurrent, writes exclusive.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::association::{AssociationEdge, AssociationKind};
use crate::pattern::{PatternId, Timestamp};

#[derive(Default)]
struct MatrixInner {
    forward: HashMap<PatternId, HashMap<PatternId, AssociationEdge>>,
    reverse: HashMap<PatternId, HashSet<PatternId>>,
    edge_count: usize,
}

/// Sparse directed association graph
#[derive(Default)]
pub struct AssociationMatrix {
    inner: RwLock<MatrixInner>,
}

impl AssociationMatrix {
    /// Empty matrix
    pub fn new() -> Self {
        Self::default()
    }

    /// Reinforce the `(source, target)` edge by `delta`, creating it with
    /// the given kind if absent. Returns the edge's new raw strength.
    pub fn add_or_reinforce(
        &self,
        source: PatternId,
        target: PatternId,
        kind: AssociationKind,
        delta: f32,
    ) -> f32 {
        let mut inner = self.inner.write().expect("matrix lock");
        let MatrixInner {
            forward,
            reverse,
            edge_count,
        } = &mut *inner;

        let targets = forward.entry(source).or_default();
        if !targets.contains_key(&target) {
            targets.insert(target, AssociationEdge::new(source, target, kind));
            *edge_count += 1;
            reverse.entry(target).or_default().insert(source);
        }
        let edge = targets.get_mut(&target).expect("present");
        edge.reinforce(delta);
        edge.raw_strength()
    }

    /// Insert or replace a fully formed edge
    pub fn insert(&self, edge: AssociationEdge) {
        let mut inner = self.inner.write().expect("matrix lock");
        let (source, target) = (edge.source(), edge.target());
        if inner
            .forward
            .entry(source)
            .or_default()
            .insert(target, edge)
            .is_none()
        {
            inner.edge_count += 1;
        }
        inner.reverse.entry(target).or_default().insert(source);
    }

    /// Copy of the `(source, target)` edge, if present
    pub fn get(&self, source: PatternId, target: PatternId) -> Option<AssociationEdge> {
        let inner = self.inner.read().expect("matrix lock");
        inner.forward.get(&source)?.get(&target).cloned()
    }

    /// Remove an edge. Returns true if it was present.
    pub fn remove_edge(&self, source: PatternId, target: PatternId) -> bool {
        let mut inner = self.inner.write().expect("matrix lock");
        let (removed, source_empty) = match inner.forward.get_mut(&source) {
            Some(targets) => (targets.remove(&target).is_some(), targets.is_empty()),
            None => (false, false),
        };
        if !removed {
            return false;
        }
        if source_empty {
            inner.forward.remove(&source);
        }
        let target_empty = match inner.reverse.get_mut(&target) {
            Some(sources) => {
                sources.remove(&source);
                sources.is_empty()
            }
            None => false,
        };
        if target_empty {
            inner.reverse.remove(&target);
        }
        inner.edge_count -= 1;
        true
    }

    /// Outbound edges of a pattern, strongest first (by decayed strength)
    pub fn outgoing_of(&self, source: PatternId) -> Vec<AssociationEdge> {
        let now = Timestamp::now();
        let inner = self.inner.read().expect("matrix lock");
        let mut edges: Vec<AssociationEdge> = inner
            .forward
            .get(&source)
            .map(|targets| targets.values().cloned().collect())
            .unwrap_or_default();
        edges.sort_by(|a, b| {
            b.strength_at(now)
                .partial_cmp(&a.strength_at(now))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.target().cmp(&b.target()))
        });
        edges
    }

    /// Inbound edges of a pattern, strongest first (by decayed strength)
    pub fn incoming_of(&self, target: PatternId) -> Vec<AssociationEdge> {
        let now = Timestamp::now();
        let inner = self.inner.read().expect("matrix lock");
        let mut edges: Vec<AssociationEdge> = inner
            .reverse
            .get(&target)
            .map(|sources| {
                sources
                    .iter()
                    .filter_map(|s| inner.forward.get(s)?.get(&target).cloned())
                    .collect()
            })
            .unwrap_or_default();
        edges.sort_by(|a, b| {
            b.strength_at(now)
                .partial_cmp(&a.strength_at(now))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source().cmp(&b.source()))
        });
        edges
    }

    /// Remove every edge whose decayed strength has fallen below
    /// `min_strength`. Returns the number removed.
    pub fn prune_below(&self, min_strength: f32) -> usize {
        let now = Timestamp::now();
        let mut inner = self.inner.write().expect("matrix lock");

        let mut doomed: Vec<(PatternId, PatternId)> = Vec::new();
        for (source, targets) in &inner.forward {
            for (target, edge) in targets {
                if edge.strength_at(now) < min_strength {
                    doomed.push((*source, *target));
                }
            }
        }

        for (source, target) in &doomed {
            let source_empty = match inner.forward.get_mut(source) {
                Some(targets) => {
                    targets.remove(target);
                    targets.is_empty()
                }
                None => false,
            };
            if source_empty {
                inner.forward.remove(source);
            }
            let target_empty = match inner.reverse.get_mut(target) {
                Some(sources) => {
                    sources.remove(source);
                    sources.is_empty()
                }
                None => false,
            };
            if target_empty {
                inner.reverse.remove(target);
            }
        }
        inner.edge_count -= doomed.len();
        doomed.len()
    }

    /// Total number of edges
    pub fn edge_count(&self) -> usize {
        self.inner.read().expect("matrix lock").edge_count
    }

    /// Number of patterns with at least one outbound edge
    pub fn source_count(&self) -> usize {
        self.inner.read().expect("matrix lock").forward.len()
    }

    /// Visit every edge under the read lock
    pub fn for_each_edge<F: FnMut(&AssociationEdge)>(&self, mut f: F) {
        let inner = self.inner.read().expect("matrix lock");
        for targets in inner.forward.values() {
            for edge in targets.values() {
                f(edge);
            }
        }
    }

    /// Snapshot of every edge
    pub fn edges(&self) -> Vec<AssociationEdge> {
        let mut out = Vec::with_capacity(self.edge_count());
        self.for_each_edge(|e| out.push(e.clone()));
        out
    }

    /// Drop everything
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("matrix lock");
        inner.forward.clear();
        inner.reverse.clear();
        inner.edge_count = 0;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_or_reinforce_creates_then_strengthens() {
        let matrix = AssociationMatrix::new();
        let (a, b) = (PatternId::generate(), PatternId::generate());

        let s1 = matrix.add_or_reinforce(a, b, AssociationKind::Temporal, 0.3);
        assert!((s1 - 0.3).abs() < 1e-4);
        let s2 = matrix.add_or_reinforce(a, b, AssociationKind::Temporal, 0.3);
        assert!(s2 > s1);
        assert_eq!(matrix.edge_count(), 1);

        let edge = matrix.get(a, b).unwrap();
        assert_eq!(edge.kind(), AssociationKind::Temporal);
    }

    #[test]
    fn test_edges_are_directed() {
        let matrix = AssociationMatrix::new();
        let (a, b) = (PatternId::generate(), PatternId::generate());
        matrix.add_or_reinforce(a, b, AssociationKind::Semantic, 0.5);

        assert!(matrix.get(a, b).is_some());
        assert!(matrix.get(b, a).is_none());
    }

    #[test]
    fn test_outgoing_sorted_by_strength() {
        let matrix = AssociationMatrix::new();
        let a = PatternId::generate();
        let b = PatternId::generate();
        let c = PatternId::generate();
        let d = PatternId::generate();

        matrix.add_or_reinforce(a, b, AssociationKind::Semantic, 0.9);
        matrix.add_or_reinforce(a, c, AssociationKind::Semantic, 0.8);
        matrix.add_or_reinforce(a, d, AssociationKind::Semantic, 0.95);

        let out: Vec<PatternId> = matrix.outgoing_of(a).iter().map(|e| e.target()).collect();
        assert_eq!(out, vec![d, b, c]);
    }

    #[test]
    fn test_incoming_uses_reverse_index() {
        let matrix = AssociationMatrix::new();
        let a = PatternId::generate();
        let b = PatternId::generate();
        let c = PatternId::generate();

        matrix.add_or_reinforce(a, c, AssociationKind::Semantic, 0.4);
        matrix.add_or_reinforce(b, c, AssociationKind::Semantic, 0.7);

        let incoming: Vec<PatternId> = matrix.incoming_of(c).iter().map(|e| e.source()).collect();
        assert_eq!(incoming, vec![b, a]);
        assert!(matrix.incoming_of(a).is_empty());
    }

    #[test]
    fn test_remove_edge_cleans_both_indices() {
        let matrix = AssociationMatrix::new();
        let (a, b) = (PatternId::generate(), PatternId::generate());
        matrix.add_or_reinforce(a, b, AssociationKind::Semantic, 0.5);

        assert!(matrix.remove_edge(a, b));
        assert!(!matrix.remove_edge(a, b));
        assert_eq!(matrix.edge_count(), 0);
        assert!(matrix.outgoing_of(a).is_empty());
        assert!(matrix.incoming_of(b).is_empty());
    }

    #[test]
    fn test_prune_below() {
        let matrix = AssociationMatrix::new();
        let a = PatternId::generate();
        let strong = PatternId::generate();
        let weak = PatternId::generate();

        matrix.add_or_reinforce(a, strong, AssociationKind::Semantic, 0.9);
        matrix.add_or_reinforce(a, weak, AssociationKind::Semantic, 0.1);

        let removed = matrix.prune_below(0.5);
        assert_eq!(removed, 1);
        assert!(matrix.get(a, strong).is_some());
        assert!(matrix.get(a, weak).is_none());
        assert_eq!(matrix.edge_count(), 1);
    }

    #[test]
    fn test_clear() {
        let matrix = AssociationMatrix::new();
        let (a, b) = (PatternId::generate(), PatternId::generate());
        matrix.add_or_reinforce(a, b, AssociationKind::Semantic, 0.5);
        matrix.clear();
        assert_eq!(matrix.edge_count(), 0);
        assert_eq!(matrix.source_count(), 0);
    }
}
