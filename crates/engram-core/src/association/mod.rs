//! Association layer
//!
//! Directed weighted edges between patterns, the sparse adjacency matrix
//! that indexes them, and the temporal learner that derives causal-timing
//! statistics from activation streams.

mod edge;
mod matrix;
mod temporal;

pub use edge::{AssociationEdge, AssociationKind, DEFAULT_DECAY_RATE};
pub use matrix::AssociationMatrix;
pub use temporal::{TemporalConfig, TemporalLearner, TemporalStats};
