//! Error types for Trellis.
//!
//! Expected edge cases (out-of-range indices, no selection, absent edit
//! target) are modeled as values, not errors. `TrellisError` is reserved for
//! strict lookups, construction-time contract violations, read-only writes
//! and configuration parsing.

use thiserror::Error;

use crate::property::PropertyError;

/// The main error type for Trellis operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrellisError {
    /// A rank or index was outside `0..len`.
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange {
        /// The requested index or rank.
        index: usize,
        /// The valid length at the time of the request.
        len: usize,
    },
    /// A required collaborator was not supplied at construction time.
    #[error("missing required collaborator: {0}")]
    MissingCollaborator(&'static str),
    /// Property-related error.
    #[error("property error: {0}")]
    Property(#[from] PropertyError),
    /// A configuration document could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A specialized Result type for Trellis operations.
pub type Result<T> = std::result::Result<T, TrellisError>;
