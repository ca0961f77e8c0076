//! Validation of raw vocabulary pairs into board items.

use crate::error::PairRejection;
use crate::types::{PairItem, RawItem, RawPair, Side};
use std::collections::HashSet;

/// A pair whose two items passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPair {
    pub source: PairItem,
    pub target: PairItem,
}

/// Outcome of validating a whole pair list.
#[derive(Debug, Clone, Default)]
pub struct Validated {
    /// Valid pairs in input order.
    pub pairs: Vec<ValidPair>,
    /// Input index and reason for every dropped pair.
    pub rejected: Vec<(usize, PairRejection)>,
}

/// Validate one raw pair, wiring each item's `match_id` to its counterpart.
pub fn validate_pair(raw: &RawPair) -> Result<ValidPair, PairRejection> {
    let (source_id, source_text) = required_fields(&raw.source, Side::Source)?;
    let (target_id, target_text) = required_fields(&raw.target, Side::Target)?;

    if source_id == target_id {
        return Err(PairRejection::SelfMatch {
            id: source_id.to_string(),
        });
    }

    Ok(ValidPair {
        source: PairItem {
            id: source_id.to_string(),
            text: source_text.to_string(),
            match_id: target_id.to_string(),
            is_source_language: true,
        },
        target: PairItem {
            id: target_id.to_string(),
            text: target_text.to_string(),
            match_id: source_id.to_string(),
            is_source_language: false,
        },
    })
}

fn required_fields(item: &RawItem, side: Side) -> Result<(&str, &str), PairRejection> {
    let id = item
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(PairRejection::MissingId { side })?;
    let text = item
        .text
        .as_deref()
        .filter(|text| !text.is_empty())
        .ok_or(PairRejection::MissingText { side })?;
    Ok((id, text))
}

/// Validate a pair list. Malformed pairs and pairs reusing an id already
/// taken by an earlier pair are dropped with a warning.
pub fn validate_pairs(raw: &[RawPair]) -> Validated {
    let mut validated = Validated::default();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (index, pair) in raw.iter().enumerate() {
        let result = validate_pair(pair).and_then(|valid| {
            for id in [&valid.source.id, &valid.target.id] {
                if seen_ids.contains(id) {
                    return Err(PairRejection::DuplicateId { id: id.clone() });
                }
            }
            Ok(valid)
        });

        match result {
            Ok(valid) => {
                seen_ids.insert(valid.source.id.clone());
                seen_ids.insert(valid.target.id.clone());
                validated.pairs.push(valid);
            }
            Err(reason) => {
                tracing::warn!(index, %reason, "dropping malformed pair");
                validated.rejected.push((index, reason));
            }
        }
    }

    if !validated.rejected.is_empty() {
        tracing::warn!(
            dropped = validated.rejected.len(),
            kept = validated.pairs.len(),
            "some vocabulary pairs were invalid"
        );
    }

    validated
}
