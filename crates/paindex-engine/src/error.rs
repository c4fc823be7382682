//! Error types for index construction.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while building an index series.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The divisor chain cannot be continued for a segment.
    #[error("Degenerate segment '{segment}' at {date}: {reason}")]
    DegenerateSegment {
        /// Segment label
        segment: String,
        /// Date at which the recursion broke
        date: NaiveDate,
        /// What went wrong
        reason: String,
    },

    /// Base index value must be finite and positive.
    #[error("Invalid base index value: {0} (must be finite and > 0)")]
    InvalidBaseValue(f64),

    /// Matrix dimensions disagree with their labels.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected (rows, columns)
        expected: (usize, usize),
        /// Actual (rows, columns)
        actual: (usize, usize),
    },

    /// Segments are out of order or overlap.
    #[error("Invalid segment layout: {0}")]
    InvalidSegments(String),

    /// DataFrame operation failed.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Price source failed.
    #[error("Data error: {0}")]
    Data(#[from] paindex_data::DataError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
