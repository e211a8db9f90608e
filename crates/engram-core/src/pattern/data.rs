//! Pattern data envelope
//!
//! [`PatternData`] combines a dense feature vector with a modality tag and
//! an optional compressed payload (the raw observation the features were
//! derived from). The wire form is stable and shared by every storage tier.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{EngramError, Result};
use crate::pattern::FeatureVector;
use crate::wire;

// ============================================================================
// MODALITY
// ============================================================================

/// Kind of observation a pattern was learned from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Dense numeric measurements
    #[default]
    Numeric,
    /// Discrete category indicators
    Categorical,
    /// Text-derived features
    Text,
    /// Raw binary payloads
    Binary,
    /// Combination of multiple modalities
    Mixed,
}

impl Modality {
    /// String name
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Numeric => "numeric",
            Modality::Categorical => "categorical",
            Modality::Text => "text",
            Modality::Binary => "binary",
            Modality::Mixed => "mixed",
        }
    }

    /// Wire byte
    pub(crate) fn as_byte(&self) -> u8 {
        match self {
            Modality::Numeric => 0,
            Modality::Categorical => 1,
            Modality::Text => 2,
            Modality::Binary => 3,
            Modality::Mixed => 4,
        }
    }

    /// Decode a wire byte
    pub(crate) fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Modality::Numeric),
            1 => Ok(Modality::Categorical),
            2 => Ok(Modality::Text),
            3 => Ok(Modality::Binary),
            4 => Ok(Modality::Mixed),
            other => Err(EngramError::Corruption(format!(
                "unknown modality byte {other}"
            ))),
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// PATTERN DATA
// ============================================================================

/// Feature vector plus modality tag and optional compressed payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternData {
    modality: Modality,
    features: FeatureVector,
    payload: Vec<u8>,
}

impl PatternData {
    /// Data with features only
    pub fn new(modality: Modality, features: FeatureVector) -> Self {
        Self {
            modality,
            features,
            payload: Vec::new(),
        }
    }

    /// Data with features and a compressed payload
    pub fn with_payload(modality: Modality, features: FeatureVector, payload: Vec<u8>) -> Self {
        Self {
            modality,
            features,
            payload,
        }
    }

    /// Convenience constructor for numeric feature data
    pub fn from_features(values: Vec<f32>) -> Self {
        Self::new(Modality::Numeric, FeatureVector::new(values))
    }

    /// Modality tag
    pub fn modality(&self) -> Modality {
        self.modality
    }

    /// Borrow the feature vector
    pub fn features(&self) -> &FeatureVector {
        &self.features
    }

    /// Borrow the compressed payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Size of the compressed payload in bytes
    pub fn compressed_size(&self) -> usize {
        self.payload.len()
    }

    /// True when there are neither features nor payload
    pub fn is_empty(&self) -> bool {
        self.features.is_empty() && self.payload.is_empty()
    }

    /// Approximate heap footprint in bytes
    pub fn estimate_memory_usage(&self) -> usize {
        self.features.dimension() * std::mem::size_of::<f32>() + self.payload.len()
    }

    /// Encode: modality byte, feature vector, u32 payload length, payload
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        wire::write_u8(w, self.modality.as_byte())?;
        self.features.encode(w)?;
        wire::write_u32(w, self.payload.len() as u32)?;
        w.write_all(&self.payload)?;
        Ok(())
    }

    /// Decode the wire form
    pub fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let modality = Modality::from_byte(wire::read_u8(r)?)?;
        let features = FeatureVector::decode(r)?;
        let payload_len = wire::read_u32(r)? as usize;
        let payload = wire::read_bytes(r, payload_len, "pattern payload")?;
        Ok(Self {
            modality,
            features,
            payload,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
