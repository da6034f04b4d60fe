//! Error types for granet.

use thiserror::Error;

/// Granet error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Scatter index outside the bucket range.
    #[error("scatter index {index} out of range for {buckets} buckets")]
    IndexOutOfBounds { index: usize, buckets: usize },

    /// Malformed graph.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Empty batch of graphs.
    #[error("cannot concatenate an empty batch of graphs")]
    EmptyBatch,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
