//! Bidirectional item lookup used to validate matches.

use super::validate::ValidPair;
use std::collections::HashMap;

/// Maps every item id to its counterpart's id, in both directions.
#[derive(Debug, Clone, Default)]
pub struct MatchLookup {
    counterparts: HashMap<String, String>,
}

impl MatchLookup {
    pub fn build(pairs: &[ValidPair]) -> Self {
        let mut counterparts = HashMap::with_capacity(pairs.len() * 2);
        for pair in pairs {
            counterparts.insert(pair.source.id.clone(), pair.target.id.clone());
            counterparts.insert(pair.target.id.clone(), pair.source.id.clone());
        }
        Self { counterparts }
    }

    pub fn counterpart(&self, id: &str) -> Option<&str> {
        self.counterparts.get(id).map(String::as_str)
    }

    /// True when `a` and `b` belong to the same pair. Order does not matter.
    pub fn matches(&self, a: &str, b: &str) -> bool {
        self.counterpart(a) == Some(b)
    }

    /// Every entry points back at its key.
    pub fn is_symmetric(&self) -> bool {
        self.counterparts
            .iter()
            .all(|(id, other)| self.counterpart(other) == Some(id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.counterparts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counterparts.is_empty()
    }
}
