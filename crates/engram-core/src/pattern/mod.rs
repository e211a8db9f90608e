//! Pattern graph primitives
//!
//! Identity, time, feature math, the pattern data envelope, and the
//! pattern node entity. Everything the storage tiers and the association
//! layer build on.

mod data;
mod features;
mod ident;
mod node;

pub use data::{Modality, PatternData};
pub use features::{ContextVector, FeatureVector};
pub use ident::{Duration, PatternId, PatternPair, Timestamp};
pub use node::{DEFAULT_ACTIVATION_THRESHOLD, DEFAULT_CONFIDENCE, PatternNode, PatternType};
