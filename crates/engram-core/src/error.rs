//! Crate error type
//!
//! One taxonomy shared across the pattern graph, the cache, and the storage
//! tiers. Disk tiers convert every internal failure into a `false`/`None`
//! result at the trait boundary (logging it), so `EngramError` mostly shows
//! up at construction time and in the database interface.

/// Errors surfaced by engram operations
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngramError {
    /// Pattern or association not present
    #[error("Not found: {0}")]
    NotFound(String),
    /// Feature vectors of different dimensions were combined
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the left-hand vector
        expected: usize,
        /// Dimension of the right-hand vector
        actual: usize,
    },
    /// IO error from a disk tier
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A serialized record could not be decoded
    #[error("Corrupt record: {0}")]
    Corruption(String),
    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Crate result type
pub type Result<T> = std::result::Result<T, EngramError>;
