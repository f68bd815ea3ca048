//! Error types for layout-optimizer
//!
//! The optimizer itself never surfaces errors: a handler that cannot apply
//! leaves the graph untouched and the entry points report a plain `bool`.
//! These errors belong to the graph and tensor layer, whose mutation
//! operations are genuinely fallible.

use thiserror::Error;

/// Main error type for graph and tensor operations
#[derive(Error, Debug)]
pub enum TransformError {
    /// Initializer not found
    #[error("Initializer not found: {0}")]
    InitializerNotFound(String),

    /// Tensor data does not match its declared shape
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Invalid permutation for the given rank
    #[error("Invalid permutation {perm:?} for rank {rank}")]
    InvalidPermutation {
        /// The offending permutation
        perm: Vec<i64>,
        /// Rank of the value it was applied to
        rank: usize,
    },

    /// Unsupported opset version
    #[error("Unsupported opset version: {version}, expected {min}..={max}")]
    UnsupportedOpset {
        /// Actual version
        version: i64,
        /// Minimum supported
        min: i64,
        /// Maximum supported
        max: i64,
    },
}

/// Result type alias for graph operations
pub type OptResult<T> = Result<T, TransformError>;
