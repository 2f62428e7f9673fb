//! Error types for Arbor Core.

use thiserror::Error;

/// Result type alias for Arbor operations.
pub type Result<T> = std::result::Result<T, ArborError>;

/// Errors that can occur during beam-search decoding.
#[derive(Error, Debug)]
pub enum ArborError {
    /// Rejected configuration, surfaced before any decode call.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A batch element was seeded with an empty token sequence.
    #[error("empty seed for batch element {0}")]
    EmptySeed(usize),

    /// The incremental cache path was engaged but the decoder cannot
    /// reorder its cache.
    #[error("cache reorder failed: {0}")]
    CacheReorder(String),

    /// Decoder output did not match the expected shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Decoder-reported failure.
    #[error("decode error: {0}")]
    Decode(String),

    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}
