//! Match classification and result ranking.
//!
//! Candidates are ordered by a lexicographic score:
//! 1. match stage (exact, prefix, substring)
//! 2. kind rank from the configured weights
//! 3. display name length, shorter first
//! 4. insertion order
//!
//! The last component is unique per entry, so the order is total and the
//! same query over the same index always ranks identically.

use super::index::SymbolIndex;
use crate::config::KindWeights;
use crate::types::{EntryId, MatchStage};

/// Classify how `token` matches `text`.
///
/// - `Exact`: text equals token
/// - `Prefix`: text starts with token
/// - `Substring`: text contains token
/// - `None`: no match
pub fn classify(text: &str, token: &str) -> Option<MatchStage> {
    if text == token {
        Some(MatchStage::Exact)
    } else if text.starts_with(token) {
        Some(MatchStage::Prefix)
    } else if text.contains(token) {
        Some(MatchStage::Substring)
    } else {
        None
    }
}

/// Best match of `token` against any `::` segment of a lowercased scope.
pub fn classify_scope(scope_key: &str, token: &str) -> Option<MatchStage> {
    scope_key
        .split("::")
        .filter_map(|segment| classify(segment, token))
        .min()
}

/// Stage at which a tokenized query matches an entry, if it does.
///
/// Every token has to match either the key or a scope segment, and at least
/// one token has to match the key itself. The entry's stage is the worst stage
/// among its tokens, using whichever key-matching token gives the best result.
pub fn match_entry(tokens: &[String], key: &str, scope_key: &str) -> Option<MatchStage> {
    let per_token: Vec<_> = tokens
        .iter()
        .map(|token| {
            let on_key = classify(key, token);
            let on_scope = classify_scope(scope_key, token);
            let best = match (on_key, on_scope) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            (on_key, best)
        })
        .collect();

    per_token
        .iter()
        .enumerate()
        .filter_map(|(i, (on_key, _))| {
            let anchor_stage = (*on_key)?;
            per_token
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .try_fold(anchor_stage, |worst, (_, (_, best))| Some(worst.max((*best)?)))
        })
        .min()
}

/// A matched entry awaiting ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: EntryId,
    pub stage: MatchStage,
}

/// Outcome of ranking: the kept candidates and whether any were cut.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ranked {
    pub candidates: Vec<Candidate>,
    pub truncated: bool,
    pub total: usize,
}

/// Orders candidates by match quality.
#[derive(Debug, Clone, Copy)]
pub struct Ranker<'a> {
    weights: &'a KindWeights,
}

impl<'a> Ranker<'a> {
    pub const fn new(weights: &'a KindWeights) -> Self {
        Self { weights }
    }

    fn score(&self, index: &SymbolIndex, candidate: &Candidate) -> (MatchStage, (i32, u8), usize, EntryId) {
        let entry = index.entry(candidate.id);
        (
            candidate.stage,
            self.weights.rank(entry.kind),
            entry.display_name.chars().count(),
            candidate.id,
        )
    }

    /// Sort candidates best-first and keep at most `limit`.
    pub fn rank(&self, index: &SymbolIndex, mut candidates: Vec<Candidate>, limit: usize) -> Ranked {
        let total = candidates.len();
        let truncated = total > limit;

        if truncated {
            // Partition around the cut first so only the kept part is sorted
            if limit > 0 {
                candidates.select_nth_unstable_by_key(limit - 1, |c| self.score(index, c));
            }
            candidates.truncate(limit);
        }
        candidates.sort_unstable_by_key(|c| self.score(index, c));

        Ranked {
            candidates,
            truncated,
            total,
        }
    }
}
