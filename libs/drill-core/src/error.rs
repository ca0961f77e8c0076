//! Error types for drill-core.

use crate::types::Side;
use thiserror::Error;

/// Result type alias using GameError.
pub type Result<T> = std::result::Result<T, GameError>;

/// Errors that prevent a matching session from starting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("no valid pairs to play ({dropped} malformed pairs dropped)")]
    NoValidPairs { dropped: usize },
}

/// Reasons a single raw pair is dropped during validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PairRejection {
    #[error("{} item has no id", side.as_str())]
    MissingId { side: Side },

    #[error("{} item has no text", side.as_str())]
    MissingText { side: Side },

    #[error("duplicate item id {id}")]
    DuplicateId { id: String },

    #[error("source and target share id {id}")]
    SelfMatch { id: String },
}
