//! Feature vectors
//!
//! Dense fixed-dimension `f32` vectors for pattern content, and sparse
//! string-keyed context vectors for metadata similarity. Neither type is
//! internally synchronized; concurrent mutation needs an external lock.

use std::collections::HashMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{EngramError, Result};
use crate::wire;

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// Dense sequence of `f32` features
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    /// Wrap an existing value buffer
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// All-zero vector of the given dimension
    pub fn zeros(dimension: usize) -> Self {
        Self {
            values: vec![0.0; dimension],
        }
    }

    /// Dimension of the vector
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// True for zero-dimension vectors
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Element access
    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    /// Borrow the raw values
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Mutable access to the raw values
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Euclidean (L2) norm
    pub fn l2_norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Cosine similarity in [-1, 1]
    ///
    /// Zero-norm vectors compare as 0. Fails with `DimensionMismatch` when
    /// the dimensions differ.
    pub fn cosine_similarity(&self, other: &FeatureVector) -> Result<f32> {
        self.check_dimension(other)?;

        let dot: f32 = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a * b)
            .sum();
        let norms = self.l2_norm() * other.l2_norm();
        if norms == 0.0 {
            return Ok(0.0);
        }
        Ok((dot / norms).clamp(-1.0, 1.0))
    }

    /// Euclidean distance. Fails with `DimensionMismatch` when the
    /// dimensions differ.
    pub fn euclidean_distance(&self, other: &FeatureVector) -> Result<f32> {
        self.check_dimension(other)?;

        let sum: f32 = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Ok(sum.sqrt())
    }

    fn check_dimension(&self, other: &FeatureVector) -> Result<()> {
        if self.values.len() != other.values.len() {
            return Err(EngramError::DimensionMismatch {
                expected: self.values.len(),
                actual: other.values.len(),
            });
        }
        Ok(())
    }

    /// Encode as u32 length then `length x f32`, little-endian
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        wire::write_u32(w, self.values.len() as u32)?;
        for v in &self.values {
            wire::write_f32(w, *v)?;
        }
        Ok(())
    }

    /// Decode the wire form
    pub fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let len = wire::checked_len(wire::read_u32(r)? as usize, "feature vector")?;
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(wire::read_f32(r)?);
        }
        Ok(Self { values })
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

// ============================================================================
// CONTEXT VECTOR
// ============================================================================

/// Sparse map of named dimensions to weights
///
/// Used for metadata-based similarity where patterns carry tags or derived
/// context rather than dense features.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextVector {
    weights: HashMap<String, f32>,
}

impl ContextVector {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one dimension's weight
    pub fn set(&mut self, dimension: impl Into<String>, weight: f32) {
        self.weights.insert(dimension.into(), weight);
    }

    /// Weight of a dimension, if present
    pub fn get(&self, dimension: &str) -> Option<f32> {
        self.weights.get(dimension).copied()
    }

    /// Drop a dimension
    pub fn remove(&mut self, dimension: &str) -> Option<f32> {
        self.weights.remove(dimension)
    }

    /// Number of non-zero dimensions
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True when no dimension is set
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Iterate over (dimension, weight) entries
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// L2 norm over the sparse weights
    pub fn l2_norm(&self) -> f32 {
        self.weights.values().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Dot product over the shared dimensions
    pub fn dot(&self, other: &ContextVector) -> f32 {
        // Iterate the smaller map
        let (small, large) = if self.weights.len() <= other.weights.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .weights
            .iter()
            .filter_map(|(k, v)| large.weights.get(k).map(|w| v * w))
            .sum()
    }
}

impl FromIterator<(String, f32)> for ContextVector {
    fn from_iter<I: IntoIterator<Item = (String, f32)>>(iter: I) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
