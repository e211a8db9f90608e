//! Association edges
//!
//! Directed weighted links between patterns. Strength decays
//! exponentially with time since the last reinforcement; the decay is
//! applied lazily on read so reinforcement is the only write.

use std::fmt;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{EngramError, Result};
use crate::pattern::{PatternId, Timestamp};
use crate::wire;

/// Default decay rate, per second
pub const DEFAULT_DECAY_RATE: f32 = 0.01;

// ============================================================================
// ASSOCIATION KIND
// ============================================================================

/// Kind of relationship an edge encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationKind {
    /// Learned from activation timing (A tends to precede B)
    Temporal,
    /// Learned from content similarity
    #[default]
    Semantic,
    /// Parent/child composition link
    Hierarchical,
    /// Co-location in the input space
    Spatial,
}

impl AssociationKind {
    /// String name
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationKind::Temporal => "temporal",
            AssociationKind::Semantic => "semantic",
            AssociationKind::Hierarchical => "hierarchical",
            AssociationKind::Spatial => "spatial",
        }
    }

    pub(crate) fn as_byte(&self) -> u8 {
        match self {
            AssociationKind::Temporal => 0,
            AssociationKind::Semantic => 1,
            AssociationKind::Hierarchical => 2,
            AssociationKind::Spatial => 3,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(AssociationKind::Temporal),
            1 => Ok(AssociationKind::Semantic),
            2 => Ok(AssociationKind::Hierarchical),
            3 => Ok(AssociationKind::Spatial),
            other => Err(EngramError::Corruption(format!(
                "unknown association kind byte {other}"
            ))),
        }
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ASSOCIATION EDGE
// ============================================================================

/// Directed weighted edge between two patterns
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationEdge {
    source: PatternId,
    target: PatternId,
    kind: AssociationKind,
    strength: f32,
    last_reinforced: Timestamp,
    decay_rate: f32,
}

impl AssociationEdge {
    /// New edge with zero strength, reinforced now
    pub fn new(source: PatternId, target: PatternId, kind: AssociationKind) -> Self {
        Self {
            source,
            target,
            kind,
            strength: 0.0,
            last_reinforced: Timestamp::now(),
            decay_rate: DEFAULT_DECAY_RATE,
        }
    }

    /// New edge with an initial strength, clamped to [0, 1]
    pub fn with_strength(
        source: PatternId,
        target: PatternId,
        kind: AssociationKind,
        strength: f32,
    ) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
            ..Self::new(source, target, kind)
        }
    }

    /// Source pattern
    pub fn source(&self) -> PatternId {
        self.source
    }

    /// Target pattern
    pub fn target(&self) -> PatternId {
        self.target
    }

    /// Relationship kind
    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    /// Strength as last stored, before decay
    pub fn raw_strength(&self) -> f32 {
        self.strength
    }

    /// Instant of the last reinforcement
    pub fn last_reinforced(&self) -> Timestamp {
        self.last_reinforced
    }

    /// Decay rate, per second
    pub fn decay_rate(&self) -> f32 {
        self.decay_rate
    }

    /// Replace the decay rate (negative rates are clamped to zero)
    pub fn set_decay_rate(&mut self, rate: f32) {
        self.decay_rate = rate.max(0.0);
    }

    /// Effective strength at `now`: the stored strength attenuated by
    /// `exp(-decay_rate * seconds_since_reinforcement)`
    pub fn strength_at(&self, now: Timestamp) -> f32 {
        let elapsed = (now - self.last_reinforced).as_secs_f64().max(0.0);
        let decayed = self.strength as f64 * (-self.decay_rate as f64 * elapsed).exp();
        decayed as f32
    }

    /// Add `delta` on top of the decayed strength, saturating at 1, and
    /// refresh the reinforcement instant
    pub fn reinforce(&mut self, delta: f32) {
        self.reinforce_at(delta, Timestamp::now());
    }

    /// [`reinforce`](Self::reinforce) at an explicit instant
    pub fn reinforce_at(&mut self, delta: f32, now: Timestamp) {
        self.strength = (self.strength_at(now) + delta).clamp(0.0, 1.0);
        self.last_reinforced = now;
    }

    /// Encode: source id, target id, kind byte, strength f32,
    /// last reinforced i64 µs, decay rate f32. Little-endian.
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        self.source.encode(w)?;
        self.target.encode(w)?;
        wire::write_u8(w, self.kind.as_byte())?;
        wire::write_f32(w, self.strength)?;
        wire::write_i64(w, self.last_reinforced.to_micros())?;
        wire::write_f32(w, self.decay_rate)
    }

    /// Encode into a fresh buffer
    pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(45);
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode the wire form
    pub fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let source = PatternId::decode(r)?;
        let target = PatternId::decode(r)?;
        let kind = AssociationKind::from_byte(wire::read_u8(r)?)?;
        let strength = wire::read_f32(r)?;
        let last_reinforced = Timestamp::from_micros(wire::read_i64(r)?);
        let decay_rate = wire::read_f32(r)?;
        Ok(Self {
            source,
            target,
            kind,
            strength,
            last_reinforced,
            decay_rate,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Duration;

    #[test]
    fn test_reinforce_saturates() {
        let mut edge = AssociationEdge::new(
            PatternId::generate(),
            PatternId::generate(),
            AssociationKind::Semantic,
        );
        let now = Timestamp::now();
        edge.reinforce_at(0.6, now);
        edge.reinforce_at(0.6, now);
        assert_eq!(edge.raw_strength(), 1.0);
        assert_eq!(edge.last_reinforced(), now);
    }

    #[test]
    fn test_decay_is_lazy_and_monotone() {
        let now = Timestamp::now();
        let mut edge = AssociationEdge::with_strength(
            PatternId::generate(),
            PatternId::generate(),
            AssociationKind::Temporal,
            0.8,
        );
        edge.reinforce_at(0.0, now);

        let later = now + Duration::from_secs(10);
        let much_later = now + Duration::from_secs(100);
        let s0 = edge.strength_at(now);
        let s1 = edge.strength_at(later);
        let s2 = edge.strength_at(much_later);

        assert!((s0 - 0.8).abs() < 1e-6);
        assert!(s1 < s0);
        assert!(s2 < s1);
        // Reading never mutates the stored strength
        assert_eq!(edge.raw_strength(), 0.8);
    }

    #[test]
    fn test_reinforce_applies_decay_first() {
        let now = Timestamp::now();
        let mut edge = AssociationEdge::with_strength(
            PatternId::generate(),
            PatternId::generate(),
            AssociationKind::Semantic,
            1.0,
        );
        edge.reinforce_at(0.0, now);

        let later = now + Duration::from_secs(60);
        edge.reinforce_at(0.1, later);
        let expected = (1.0_f64 * (-0.01 * 60.0_f64).exp() + 0.1) as f32;
        assert!((edge.raw_strength() - expected).abs() < 1e-4);
        assert_eq!(edge.last_reinforced(), later);
    }

    #[test]
    fn test_clock_skew_does_not_inflate() {
        let now = Timestamp::now();
        let mut edge = AssociationEdge::with_strength(
            PatternId::generate(),
            PatternId::generate(),
            AssociationKind::Semantic,
            0.5,
        );
        edge.reinforce_at(0.0, now);
        // A reader with a clock behind the reinforcement sees no growth
        let earlier = now - Duration::from_secs(5);
        assert!((edge.strength_at(earlier) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_wire_roundtrip() {
        let mut edge = AssociationEdge::with_strength(
            PatternId::generate(),
            PatternId::generate(),
            AssociationKind::Hierarchical,
            0.42,
        );
        edge.set_decay_rate(0.05);
        let buf = edge.encode_to_vec().unwrap();
        assert_eq!(buf.len(), 16 + 16 + 1 + 4 + 8 + 4);
        assert_eq!(AssociationEdge::decode(&mut buf.as_slice()).unwrap(), edge);
    }
}
