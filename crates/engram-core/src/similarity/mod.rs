//! Similarity metrics
//!
//! A pluggable family of scalar metrics over pattern data. Every metric
//! returns a value in [0, 1] and is symmetric unless it declares
//! otherwise. The trait covers the common dense-data entry points; each
//! metric also exposes its natural specialized input (context vectors,
//! timestamps, sub-pattern sets, statistical profiles, types), and
//! [`MetadataSimilarity`] combines a registered collection into one score.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pattern::{
    ContextVector, FeatureVector, PatternData, PatternId, PatternNode, PatternType, Timestamp,
};

// ============================================================================
// TRAIT
// ============================================================================

/// A symmetric scalar similarity in [0, 1]
pub trait SimilarityMetric: Send + Sync {
    /// Similarity of two pattern data envelopes
    fn compute(&self, a: &PatternData, b: &PatternData) -> f32;

    /// Similarity of two dense feature vectors
    fn compute_from_features(&self, a: &FeatureVector, b: &FeatureVector) -> f32;

    /// Metric name
    fn name(&self) -> &'static str;

    /// Whether `compute(a, b) == compute(b, a)` holds
    fn is_symmetric(&self) -> bool {
        true
    }
}

/// Cosine similarity folded into [0, 1]: negative similarity means no
/// meaningful relation, and a dimension mismatch degrades to zero.
fn feature_similarity(a: &FeatureVector, b: &FeatureVector) -> f32 {
    a.cosine_similarity(b)
        .map(|cos| cos.clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

// ============================================================================
// CONTEXT VECTOR SIMILARITY
// ============================================================================

/// Cosine over sparse context vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextVectorSimilarity;

impl ContextVectorSimilarity {
    /// New metric
    pub fn new() -> Self {
        Self
    }

    /// Similarity of two sparse context vectors
    pub fn compute_from_context(&self, a: &ContextVector, b: &ContextVector) -> f32 {
        let norms = a.l2_norm() * b.l2_norm();
        if norms == 0.0 {
            return 0.0;
        }
        (a.dot(b) / norms).clamp(0.0, 1.0)
    }
}

impl SimilarityMetric for ContextVectorSimilarity {
    fn compute(&self, a: &PatternData, b: &PatternData) -> f32 {
        self.compute_from_features(a.features(), b.features())
    }

    fn compute_from_features(&self, a: &FeatureVector, b: &FeatureVector) -> f32 {
        feature_similarity(a, b)
    }

    fn name(&self) -> &'static str {
        "ContextVector"
    }
}

// ============================================================================
// TEMPORAL SIMILARITY
// ============================================================================

/// Proximity in time, linear decay inside a configurable window
#[derive(Debug, Clone, Copy)]
pub struct TemporalSimilarity {
    window_ms: i64,
}

impl Default for TemporalSimilarity {
    fn default() -> Self {
        Self { window_ms: 1000 }
    }
}

impl TemporalSimilarity {
    /// Metric with the given window in milliseconds (clamped to >= 1)
    pub fn new(window_ms: i64) -> Self {
        Self {
            window_ms: window_ms.max(1),
        }
    }

    /// Similarity of two instants: 1 at zero distance, 0 outside the
    /// window
    pub fn compute_from_timestamps(&self, a: Timestamp, b: Timestamp) -> f32 {
        let distance_ms = (a - b).as_millis().abs();
        if distance_ms >= self.window_ms {
            return 0.0;
        }
        1.0 - distance_ms as f32 / self.window_ms as f32
    }

    /// Similarity of two nodes by their last access instants
    pub fn compute_for_nodes(&self, a: &PatternNode, b: &PatternNode) -> f32 {
        self.compute_from_timestamps(a.last_accessed(), b.last_accessed())
    }
}

impl SimilarityMetric for TemporalSimilarity {
    fn compute(&self, _a: &PatternData, _b: &PatternData) -> f32 {
        // Pattern data carries no temporal information
        0.0
    }

    fn compute_from_features(&self, _a: &FeatureVector, _b: &FeatureVector) -> f32 {
        0.0
    }

    fn name(&self) -> &'static str {
        "Temporal"
    }
}

// ============================================================================
// HIERARCHICAL SIMILARITY
// ============================================================================

/// Jaccard similarity over sub-pattern sets
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchicalSimilarity;

impl HierarchicalSimilarity {
    /// New metric
    pub fn new() -> Self {
        Self
    }

    /// Jaccard similarity of two sub-pattern lists. Two leaves (both
    /// empty) count as structurally identical.
    pub fn compute_from_sub_patterns(&self, a: &[PatternId], b: &[PatternId]) -> f32 {
        let set_a: HashSet<_> = a.iter().copied().collect();
        let set_b: HashSet<_> = b.iter().copied().collect();
        let union = set_a.union(&set_b).count();
        if union == 0 {
            return 1.0;
        }
        set_a.intersection(&set_b).count() as f32 / union as f32
    }

    /// Similarity of two nodes by their sub-pattern sets
    pub fn compute_for_nodes(&self, a: &PatternNode, b: &PatternNode) -> f32 {
        self.compute_from_sub_patterns(&a.sub_patterns(), &b.sub_patterns())
    }
}

impl SimilarityMetric for HierarchicalSimilarity {
    fn compute(&self, _a: &PatternData, _b: &PatternData) -> f32 {
        // Pattern data carries no structure; the node-level entry point
        // is the meaningful one
        0.0
    }

    fn compute_from_features(&self, _a: &FeatureVector, _b: &FeatureVector) -> f32 {
        0.0
    }

    fn name(&self) -> &'static str {
        "Hierarchical"
    }
}

// ============================================================================
// STATISTICAL PROFILE SIMILARITY
// ============================================================================

/// Usage profile of a pattern
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatisticalProfile {
    /// Recorded accesses
    pub access_count: u32,
    /// Confidence score
    pub confidence: f32,
    /// Base activation
    pub base_activation: f32,
    /// Age in milliseconds
    pub age_ms: i64,
}

impl StatisticalProfile {
    /// Profile of a live node
    pub fn from_node(node: &PatternNode) -> Self {
        Self {
            access_count: node.access_count(),
            confidence: node.confidence_score(),
            base_activation: node.base_activation(),
            age_ms: node.age().as_millis(),
        }
    }
}

/// Weighted agreement of usage statistics
///
/// Component weights are normalized to sum to one at construction.
#[derive(Debug, Clone)]
pub struct StatisticalProfileSimilarity {
    weights: [f32; 4],
}

impl Default for StatisticalProfileSimilarity {
    fn default() -> Self {
        Self::new([1.0, 1.0, 0.5, 0.5])
    }
}

impl StatisticalProfileSimilarity {
    /// Metric with weights for [access count, confidence, base
    /// activation, age]. Non-positive weight sums fall back to defaults.
    pub fn new(weights: [f32; 4]) -> Self {
        let sum: f32 = weights.iter().sum();
        if sum <= 0.0 {
            return Self::default();
        }
        Self {
            weights: weights.map(|w| w / sum),
        }
    }

    /// Similarity of two profiles
    pub fn compute_from_profiles(&self, a: &StatisticalProfile, b: &StatisticalProfile) -> f32 {
        let access = ratio_similarity(a.access_count as f32, b.access_count as f32);
        let confidence = 1.0 - (a.confidence - b.confidence).abs().clamp(0.0, 1.0);
        let activation = 1.0 - (a.base_activation - b.base_activation).abs().clamp(0.0, 1.0);
        let age = ratio_similarity(a.age_ms as f32, b.age_ms as f32);

        let score = self.weights[0] * access
            + self.weights[1] * confidence
            + self.weights[2] * activation
            + self.weights[3] * age;
        score.clamp(0.0, 1.0)
    }

    /// Similarity of two nodes by their usage profiles
    pub fn compute_for_nodes(&self, a: &PatternNode, b: &PatternNode) -> f32 {
        self.compute_from_profiles(
            &StatisticalProfile::from_node(a),
            &StatisticalProfile::from_node(b),
        )
    }
}

/// Agreement of two non-negative magnitudes: 1 when equal, shrinking
/// toward 0 as they diverge
fn ratio_similarity(a: f32, b: f32) -> f32 {
    let max = a.max(b);
    if max <= 0.0 {
        return 1.0;
    }
    1.0 - (a - b).abs() / max
}

impl SimilarityMetric for StatisticalProfileSimilarity {
    fn compute(&self, _a: &PatternData, _b: &PatternData) -> f32 {
        // Statistics live on the node, not the data envelope
        0.0
    }

    fn compute_from_features(&self, _a: &FeatureVector, _b: &FeatureVector) -> f32 {
        0.0
    }

    fn name(&self) -> &'static str {
        "StatisticalProfile"
    }
}

// ============================================================================
// TYPE SIMILARITY
// ============================================================================

/// Agreement of pattern types, strict or hierarchy-aware
#[derive(Debug, Clone, Copy)]
pub struct TypeSimilarity {
    strict: bool,
}

impl Default for TypeSimilarity {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl TypeSimilarity {
    /// Strict matching: only identical types score 1
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Hierarchy-aware matching: aggregate types (composite and meta)
    /// score 0.5 against each other
    pub fn hierarchy_aware() -> Self {
        Self { strict: false }
    }

    /// Similarity of two types
    pub fn compute_from_types(&self, a: PatternType, b: PatternType) -> f32 {
        if a == b {
            return 1.0;
        }
        if !self.strict && Self::are_related(a, b) {
            return 0.5;
        }
        0.0
    }

    /// Similarity of two nodes by type
    pub fn compute_for_nodes(&self, a: &PatternNode, b: &PatternNode) -> f32 {
        self.compute_from_types(a.node_type(), b.node_type())
    }

    fn are_related(a: PatternType, b: PatternType) -> bool {
        matches!(
            (a, b),
            (PatternType::Composite, PatternType::Meta) | (PatternType::Meta, PatternType::Composite)
        )
    }
}

impl SimilarityMetric for TypeSimilarity {
    fn compute(&self, a: &PatternData, b: &PatternData) -> f32 {
        // Data envelopes carry a modality, the closest analogue of type
        if a.modality() == b.modality() { 1.0 } else { 0.0 }
    }

    fn compute_from_features(&self, _a: &FeatureVector, _b: &FeatureVector) -> f32 {
        0.0
    }

    fn name(&self) -> &'static str {
        "Type"
    }
}

// ============================================================================
// METADATA SIMILARITY (COMPOSITE)
// ============================================================================

/// Weighted combination of registered metrics
pub struct MetadataSimilarity {
    metrics: Vec<(Arc<dyn SimilarityMetric>, f32)>,
}

impl Default for MetadataSimilarity {
    /// Combine context and type agreement with equal weight
    fn default() -> Self {
        let mut combined = Self::empty();
        combined.add_metric(Arc::new(ContextVectorSimilarity::new()), 1.0);
        combined.add_metric(Arc::new(TypeSimilarity::default()), 1.0);
        combined
    }
}

impl MetadataSimilarity {
    /// Composite with no registered metrics (scores 0 until populated)
    pub fn empty() -> Self {
        Self {
            metrics: Vec::new(),
        }
    }

    /// Register a metric with a weight. Non-positive weights are ignored.
    pub fn add_metric(&mut self, metric: Arc<dyn SimilarityMetric>, weight: f32) {
        if weight > 0.0 {
            self.metrics.push((metric, weight));
        }
    }

    /// Drop every registered metric
    pub fn clear(&mut self) {
        self.metrics.clear();
    }

    /// Number of registered metrics
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// True when no metric is registered
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    fn weighted<F: Fn(&dyn SimilarityMetric) -> f32>(&self, score: F) -> f32 {
        let total: f32 = self.metrics.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let sum: f32 = self
            .metrics
            .iter()
            .map(|(m, w)| w * score(m.as_ref()))
            .sum();
        (sum / total).clamp(0.0, 1.0)
    }
}

impl SimilarityMetric for MetadataSimilarity {
    fn compute(&self, a: &PatternData, b: &PatternData) -> f32 {
        self.weighted(|m| m.compute(a, b))
    }

    fn compute_from_features(&self, a: &FeatureVector, b: &FeatureVector) -> f32 {
        self.weighted(|m| m.compute_from_features(a, b))
    }

    fn name(&self) -> &'static str {
        "Metadata"
    }

    fn is_symmetric(&self) -> bool {
        self.metrics.iter().all(|(m, _)| m.is_symmetric())
    }
}

// ============================================================================
// TESTS
// ============================================================================
