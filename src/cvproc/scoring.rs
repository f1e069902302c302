//! Deterministic CV scoring from the suggestion list.
//!
//! The score depends only on the multiset of suggestion kinds: each kind
//! has a base deduction with diminishing repeats (successive halving,
//! rounded up, never below 1), a per-kind cap, and an overall cap.

use std::collections::HashMap;

use crate::models::cv::{Suggestion, SuggestionKind};

/// Overall cap on the total deduction.
const MAX_TOTAL_DEDUCTION: u32 = 40;

/// `(base deduction, per-kind cap)` for each scored kind.
fn weights(kind: SuggestionKind) -> Option<(u32, u32)> {
    match kind {
        SuggestionKind::Quantification => Some((12, 24)),
        SuggestionKind::WeakActionVerbs => Some((6, 12)),
        SuggestionKind::MissingKeywords => Some((8, 16)),
        SuggestionKind::Other => None,
    }
}

/// Computes the 0-100 score for a suggestion list.
pub fn calculate_score(suggestions: &[Suggestion]) -> i32 {
    let mut counts: HashMap<SuggestionKind, u32> = HashMap::new();
    for suggestion in suggestions {
        *counts.entry(suggestion.kind).or_default() += 1;
    }

    let mut total_deduction = 0;
    for (kind, count) in counts {
        let Some((base, cap)) = weights(kind) else {
            continue;
        };

        let mut kind_deduction = 0;
        let mut step = base;
        for _ in 0..count {
            kind_deduction += step;
            step = (step + 1) / 2; // halve with round-up; bottoms out at 1
        }
        total_deduction += kind_deduction.min(cap);
    }

    let total_deduction = total_deduction.min(MAX_TOTAL_DEDUCTION);
    (100 - total_deduction as i32).clamp(0, 100)
}
