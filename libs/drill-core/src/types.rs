//! Core types for the drill engines.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of one spoken word against the reference text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordStatus {
    Correct,
    Partial,
    Incorrect,
}

/// One transcript word with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordMatch {
    pub word: String,
    pub status: WordStatus,
    /// Position of the word in the normalized transcript.
    pub original_index: usize,
}

/// Which column of the matching board an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }
}

/// One side of a raw pair as it arrives from the host (fields may be absent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl RawItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: Some(text.into()),
        }
    }
}

/// Unvalidated vocabulary pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPair {
    #[serde(default)]
    pub source: RawItem,
    #[serde(default)]
    pub target: RawItem,
}

impl RawPair {
    pub fn new(source: RawItem, target: RawItem) -> Self {
        Self { source, target }
    }
}

/// A validated, immutable item on the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairItem {
    pub id: String,
    pub text: String,
    /// Id of the counterpart item.
    pub match_id: String,
    pub is_source_language: bool,
}

impl PairItem {
    pub fn side(&self) -> Side {
        if self.is_source_language {
            Side::Source
        } else {
            Side::Target
        }
    }
}

/// A pair owned by one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedPair {
    pub id: Uuid,
    pub source: PairItem,
    pub target: PairItem,
    pub is_matched: bool,
    pub is_visible: bool,
}

impl ManagedPair {
    /// True when the pair is on the board and still waiting for a match.
    pub fn is_open(&self) -> bool {
        self.is_visible && !self.is_matched
    }
}

/// Matching game configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Maximum number of unmatched pairs shown at once.
    pub batch_size: usize,
    pub max_lives: u32,
    /// Delay before the selection clears after a correct match.
    pub match_settle_ms: u64,
    /// Delay before the selection and red highlight clear after a mismatch.
    pub mismatch_settle_ms: u64,
    /// Points deducted from 100 per attempt.
    pub attempt_penalty: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_lives: 5,
            match_settle_ms: 500,
            mismatch_settle_ms: 1000,
            attempt_penalty: 5,
        }
    }
}

impl GameSettings {
    /// Merge with optional per-lesson overrides.
    pub fn merge(&self, overrides: Option<&GameOverrides>) -> Self {
        match overrides {
            Some(o) => Self {
                batch_size: o.batch_size.unwrap_or(self.batch_size),
                max_lives: o.max_lives.unwrap_or(self.max_lives),
                match_settle_ms: o.match_settle_ms.unwrap_or(self.match_settle_ms),
                mismatch_settle_ms: o.mismatch_settle_ms.unwrap_or(self.mismatch_settle_ms),
                attempt_penalty: o.attempt_penalty.unwrap_or(self.attempt_penalty),
            },
            None => self.clone(),
        }
    }

    /// Clamp values the engine cannot run with.
    pub fn sanitized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.max_lives = self.max_lives.max(1);
        self
    }

    /// Score for a finished session.
    pub fn score_for(&self, attempts: u32) -> u8 {
        let penalty = u64::from(self.attempt_penalty) * u64::from(attempts);
        100u64.saturating_sub(penalty) as u8
    }
}

/// Per-lesson settings (all fields optional for overrides).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_lives: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_settle_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch_settle_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_penalty: Option<u32>,
}
