//! Grading of spoken or typed answers against a reference text.
//!
//! Both strings are normalized into word tokens (lowercase, `. , ? !`
//! stripped, split on single spaces). Each transcript word is then
//! classified against the reference words:
//!
//! 1. verbatim present in the reference: [`WordStatus::Correct`]
//! 2. substring of a reference word (or the reverse), or within
//!    `min(2, len / 3)` edits of one: [`WordStatus::Partial`]
//! 3. otherwise: [`WordStatus::Incorrect`]
//!
//! Accuracy is computed over the transcript word count only, so extra or
//! missing reference words do not change the denominator.

use crate::types::{WordMatch, WordStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const STRIPPED: [char; 4] = ['.', ',', '?', '!'];

/// Result of grading a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub words: Vec<WordMatch>,
    /// Accuracy between 0 and 100.
    pub accuracy_percent: u8,
    pub correct: usize,
    pub partial: usize,
    pub incorrect: usize,
}

impl Classification {
    fn empty() -> Self {
        Self {
            words: Vec::new(),
            accuracy_percent: 0,
            correct: 0,
            partial: 0,
            incorrect: 0,
        }
    }

    pub fn grade(&self) -> Grade {
        Grade::from_percent(self.accuracy_percent)
    }
}

/// Coarse feedback band for an accuracy percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Excellent,
    Good,
    Fair,
    NeedsPractice,
}

impl Grade {
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            90..=u8::MAX => Self::Excellent,
            70..=89 => Self::Good,
            50..=69 => Self::Fair,
            _ => Self::NeedsPractice,
        }
    }

    pub fn feedback(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent pronunciation!",
            Self::Good => "Good job, a few words need work.",
            Self::Fair => "Not bad, keep practicing.",
            Self::NeedsPractice => "Listen again and try once more.",
        }
    }
}

/// Split text into lowercase word tokens with `. , ? !` removed.
pub fn normalize_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace(STRIPPED, "")
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Grade a transcript against a reference text.
pub fn classify(transcript: &str, reference: &str) -> Classification {
    let spoken = normalize_words(transcript);
    if spoken.is_empty() {
        return Classification::empty();
    }
    let expected = normalize_words(reference);

    let words: Vec<WordMatch> = spoken
        .into_iter()
        .enumerate()
        .map(|(original_index, word)| {
            let status = classify_word(&word, &expected);
            WordMatch {
                word,
                status,
                original_index,
            }
        })
        .collect();

    let count = |status: WordStatus| words.iter().filter(|w| w.status == status).count();
    let correct = count(WordStatus::Correct);
    let partial = count(WordStatus::Partial);
    let incorrect = count(WordStatus::Incorrect);

    let weighted = correct as f64 + 0.5 * partial as f64;
    let accuracy = (100.0 * weighted / words.len().max(1) as f64).round();

    Classification {
        words,
        accuracy_percent: accuracy.clamp(0.0, 100.0) as u8,
        correct,
        partial,
        incorrect,
    }
}

fn classify_word(word: &str, reference: &[String]) -> WordStatus {
    if reference.iter().any(|r| r == word) {
        WordStatus::Correct
    } else if reference.iter().any(|r| is_partial_match(word, r)) {
        WordStatus::Partial
    } else {
        WordStatus::Incorrect
    }
}

fn is_partial_match(word: &str, reference_word: &str) -> bool {
    if reference_word.contains(word) || word.contains(reference_word) {
        return true;
    }
    let tolerance = (reference_word.chars().count() / 3).min(2);
    levenshtein_distance(word, reference_word) <= tolerance
}

/// Calculate Levenshtein distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Token-overlap fallback score: share of distinct reference words spoken verbatim.
///
/// This is the placeholder used when no speech-assessment result exists; it
/// knows nothing about pronunciation.
pub fn overlap_score(transcript: &str, reference: &str) -> u8 {
    let expected: HashSet<String> = normalize_words(reference).into_iter().collect();
    if expected.is_empty() {
        return 0;
    }
    let spoken: HashSet<String> = normalize_words(transcript).into_iter().collect();
    let hits = expected.intersection(&spoken).count();
    (100.0 * hits as f64 / expected.len() as f64).round() as u8
}

/// Reference words that no transcript word matched, even partially.
pub fn missing_words(transcript: &str, reference: &str) -> Vec<String> {
    let spoken = normalize_words(transcript);
    normalize_words(reference)
        .into_iter()
        .filter(|r| !spoken.iter().any(|w| w == r || is_partial_match(w, r)))
        .collect()
}
