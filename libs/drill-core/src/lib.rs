//! Core drill engines for the English practice app.
//!
//! Provides:
//! - Transcript grading against a reference text (Levenshtein-based)
//! - The vocabulary pair-matching game session
//! - Shared types (PairItem, WordMatch, GameSettings, etc.)

pub mod error;
pub mod game;
pub mod scoring;
pub mod types;

pub use error::{GameError, PairRejection, Result};
pub use game::{
    GameResult, MatchSession, SelectionEvent, SessionOutcome, SessionSnapshot, SessionStatus,
};
pub use scoring::{
    classify, levenshtein_distance, missing_words, normalize_words, overlap_score,
    Classification, Grade,
};
pub use types::{
    GameOverrides, GameSettings, ManagedPair, PairItem, RawItem, RawPair, Side, WordMatch,
    WordStatus,
};
