//! Pattern node - the unit of storage
//!
//! A pattern couples immutable identity and data with atomically updated
//! usage statistics and a mutex-guarded sub-pattern list. Statistics use
//! relaxed ordering throughout; they are observational and tolerate races.
//! A node lives in exactly one home tier at a time; cached copies are
//! shared through `Arc`, never by aliasing the tier's copy.

use std::fmt;
use std::io::{Read, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{EngramError, Result};
use crate::pattern::{Duration, FeatureVector, PatternData, PatternId, Timestamp};
use crate::wire;

// ============================================================================
// PATTERN TYPE
// ============================================================================

/// Structural classification of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// Leaf pattern learned directly from observations
    #[default]
    Atomic,
    /// Composition of sub-patterns
    Composite,
    /// Pattern over patterns (higher-order structure)
    Meta,
}

impl PatternType {
    /// String name
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Atomic => "atomic",
            PatternType::Composite => "composite",
            PatternType::Meta => "meta",
        }
    }

    pub(crate) fn as_byte(&self) -> u8 {
        match self {
            PatternType::Atomic => 0,
            PatternType::Composite => 1,
            PatternType::Meta => 2,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(PatternType::Atomic),
            1 => Ok(PatternType::Composite),
            2 => Ok(PatternType::Meta),
            other => Err(EngramError::Corruption(format!(
                "unknown pattern type byte {other}"
            ))),
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ATOMIC F32 HELPERS
// ============================================================================

// f32 statistics are stored bit-cast in AtomicU32 words, relaxed ordering.

fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

fn store_f32(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

// ============================================================================
// PATTERN NODE
// ============================================================================

/// Default activation threshold for new nodes
pub const DEFAULT_ACTIVATION_THRESHOLD: f32 = 0.5;

/// Default confidence score for new nodes
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// A pattern with statistics and hierarchical structure
pub struct PatternNode {
    // Immutable identity and content
    id: PatternId,
    data: PatternData,
    node_type: PatternType,
    creation: Timestamp,

    // Activation parameters and statistics (atomic, relaxed)
    activation_threshold: AtomicU32,
    base_activation: AtomicU32,
    confidence: AtomicU32,
    last_accessed: AtomicU64,
    access_count: AtomicU32,

    // Ordered, duplicate-free sub-pattern ids
    sub_patterns: Mutex<Vec<PatternId>>,
}

impl PatternNode {
    /// Create a node with a fresh id
    pub fn new(data: PatternData, node_type: PatternType) -> Self {
        Self::with_id(PatternId::generate(), data, node_type)
    }

    /// Create a node with an explicit id
    pub fn with_id(id: PatternId, data: PatternData, node_type: PatternType) -> Self {
        let creation = Timestamp::now();
        Self {
            id,
            data,
            node_type,
            creation,
            activation_threshold: AtomicU32::new(DEFAULT_ACTIVATION_THRESHOLD.to_bits()),
            base_activation: AtomicU32::new(0.0_f32.to_bits()),
            confidence: AtomicU32::new(DEFAULT_CONFIDENCE.to_bits()),
            last_accessed: AtomicU64::new(creation.to_micros() as u64),
            access_count: AtomicU32::new(0),
            sub_patterns: Mutex::new(Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    /// Pattern identity
    pub fn id(&self) -> PatternId {
        self.id
    }

    /// Pattern content
    pub fn data(&self) -> &PatternData {
        &self.data
    }

    /// Structural type
    pub fn node_type(&self) -> PatternType {
        self.node_type
    }

    /// Creation instant
    pub fn creation_time(&self) -> Timestamp {
        self.creation
    }

    /// Activation threshold
    pub fn activation_threshold(&self) -> f32 {
        load_f32(&self.activation_threshold)
    }

    /// Set the activation threshold
    pub fn set_activation_threshold(&self, threshold: f32) {
        store_f32(&self.activation_threshold, threshold);
    }

    /// Base activation level
    pub fn base_activation(&self) -> f32 {
        load_f32(&self.base_activation)
    }

    /// Set the base activation level
    pub fn set_base_activation(&self, activation: f32) {
        store_f32(&self.base_activation, activation);
    }

    /// Confidence score in [0, 1]
    pub fn confidence_score(&self) -> f32 {
        load_f32(&self.confidence)
    }

    /// Set the confidence score, clamped to [0, 1]
    pub fn set_confidence_score(&self, score: f32) {
        store_f32(&self.confidence, score.clamp(0.0, 1.0));
    }

    /// Shift the confidence score by `delta`, clamped to [0, 1]
    pub fn update_confidence(&self, delta: f32) {
        let updated = (self.confidence_score() + delta).clamp(0.0, 1.0);
        store_f32(&self.confidence, updated);
    }

    /// Instant of the most recent recorded access
    pub fn last_accessed(&self) -> Timestamp {
        Timestamp::from_micros(self.last_accessed.load(Ordering::Relaxed) as i64)
    }

    /// Number of recorded accesses
    pub fn access_count(&self) -> u32 {
        self.access_count.load(Ordering::Relaxed)
    }

    /// Age since creation
    pub fn age(&self) -> Duration {
        Timestamp::now() - self.creation
    }

    // ------------------------------------------------------------------
    // Statistics updates
    // ------------------------------------------------------------------

    /// Record an access now: bumps the access count and refreshes the
    /// last-accessed instant
    pub fn record_access(&self) {
        self.last_accessed
            .store(Timestamp::now().to_micros() as u64, Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Bump the access count without touching the last-accessed instant
    pub fn increment_access_count(&self, count: u32) {
        self.access_count.fetch_add(count, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // Sub-patterns
    // ------------------------------------------------------------------

    /// Snapshot of the sub-pattern ids, in insertion order
    pub fn sub_patterns(&self) -> Vec<PatternId> {
        self.sub_patterns.lock().expect("sub-pattern lock").clone()
    }

    /// Append a sub-pattern id unless already present
    pub fn add_sub_pattern(&self, sub_id: PatternId) {
        let mut subs = self.sub_patterns.lock().expect("sub-pattern lock");
        if !subs.contains(&sub_id) {
            subs.push(sub_id);
        }
    }

    /// Remove a sub-pattern id if present
    pub fn remove_sub_pattern(&self, sub_id: PatternId) {
        let mut subs = self.sub_patterns.lock().expect("sub-pattern lock");
        if let Some(pos) = subs.iter().position(|s| *s == sub_id) {
            subs.remove(pos);
        }
    }

    /// True when the node has any sub-patterns
    pub fn has_sub_patterns(&self) -> bool {
        !self.sub_patterns.lock().expect("sub-pattern lock").is_empty()
    }

    // ------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------

    /// Activation of this pattern for the given input
    ///
    /// Empty pattern data yields the base activation. A dimension mismatch
    /// degrades silently to the base activation. Otherwise the result is
    /// the mean of cosine similarity and base activation.
    pub fn compute_activation(&self, input: &FeatureVector) -> f32 {
        let base = self.base_activation();
        if self.data.is_empty() {
            return base;
        }

        match self.data.features().cosine_similarity(input) {
            Ok(similarity) => (similarity + base) / 2.0,
            Err(_) => base,
        }
    }

    /// Whether the activation for `input` reaches the threshold
    pub fn is_activated(&self, input: &FeatureVector) -> bool {
        self.compute_activation(input) >= self.activation_threshold()
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Encode the stable binary form
    ///
    /// Layout: id, data, type byte, threshold f32, base activation f32,
    /// creation i64 µs, last accessed u64 µs, access count u32,
    /// confidence f32, sub count u64, sub ids. Little-endian throughout.
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        self.id.encode(w)?;
        self.data.encode(w)?;
        wire::write_u8(w, self.node_type.as_byte())?;
        wire::write_f32(w, self.activation_threshold())?;
        wire::write_f32(w, self.base_activation())?;
        wire::write_i64(w, self.creation.to_micros())?;
        wire::write_u64(w, self.last_accessed.load(Ordering::Relaxed))?;
        wire::write_u32(w, self.access_count())?;
        wire::write_f32(w, self.confidence_score())?;

        let subs = self.sub_patterns.lock().expect("sub-pattern lock");
        wire::write_u64(w, subs.len() as u64)?;
        for sub in subs.iter() {
            sub.encode(w)?;
        }
        Ok(())
    }

    /// Encode into a fresh buffer
    pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.estimate_memory_usage());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode a node with identical observable state
    pub fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let id = PatternId::decode(r)?;
        let data = PatternData::decode(r)?;
        let node_type = PatternType::from_byte(wire::read_u8(r)?)?;
        let threshold = wire::read_f32(r)?;
        let base = wire::read_f32(r)?;
        let creation = Timestamp::from_micros(wire::read_i64(r)?);
        let last_accessed = wire::read_u64(r)?;
        let access_count = wire::read_u32(r)?;
        let confidence = wire::read_f32(r)?;

        let sub_count = wire::checked_len(wire::read_u64(r)? as usize, "sub-pattern list")?;
        let mut subs = Vec::with_capacity(sub_count);
        for _ in 0..sub_count {
            subs.push(PatternId::decode(r)?);
        }

        Ok(Self {
            id,
            data,
            node_type,
            creation,
            activation_threshold: AtomicU32::new(threshold.to_bits()),
            base_activation: AtomicU32::new(base.to_bits()),
            confidence: AtomicU32::new(confidence.to_bits()),
            last_accessed: AtomicU64::new(last_accessed),
            access_count: AtomicU32::new(access_count),
            sub_patterns: Mutex::new(subs),
        })
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Approximate resident size in bytes
    pub fn estimate_memory_usage(&self) -> usize {
        let subs = self.sub_patterns.lock().expect("sub-pattern lock");
        std::mem::size_of::<Self>()
            + self.data.estimate_memory_usage()
            + subs.capacity() * std::mem::size_of::<PatternId>()
    }
}

impl Clone for PatternNode {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            data: self.data.clone(),
            node_type: self.node_type,
            creation: self.creation,
            activation_threshold: AtomicU32::new(self.activation_threshold().to_bits()),
            base_activation: AtomicU32::new(self.base_activation().to_bits()),
            confidence: AtomicU32::new(self.confidence_score().to_bits()),
            last_accessed: AtomicU64::new(self.last_accessed.load(Ordering::Relaxed)),
            access_count: AtomicU32::new(self.access_count()),
            sub_patterns: Mutex::new(self.sub_patterns()),
        }
    }
}

impl PartialEq for PatternNode {
    /// Observable-state equality: identity, data, type, statistics, and
    /// sub-pattern list all match.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.data == other.data
            && self.node_type == other.node_type
            && self.creation == other.creation
            && self.activation_threshold() == other.activation_threshold()
            && self.base_activation() == other.base_activation()
            && self.confidence_score() == other.confidence_score()
            && self.last_accessed() == other.last_accessed()
            && self.access_count() == other.access_count()
            && self.sub_patterns() == other.sub_patterns()
    }
}

impl fmt::Debug for PatternNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternNode")
            .field("id", &self.id.to_hex())
            .field("type", &self.node_type)
            .field("dimension", &self.data.features().dimension())
            .field("confidence", &self.confidence_score())
            .field("access_count", &self.access_count())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PatternNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PatternNode{{id={}, type={}, threshold={:.2}, base_activation={:.2}, confidence={:.2}, access_count={}, sub_patterns={}}}",
            self.id,
            self.node_type,
            self.activation_threshold(),
            self.base_activation(),
            self.confidence_score(),
            self.access_count(),
            self.sub_patterns.lock().expect("sub-pattern lock").len(),
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
