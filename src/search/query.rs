//! Staged query execution over a [`SymbolIndex`].

use super::index::SymbolIndex;
use super::scoring::{Candidate, Ranker, match_entry};
use super::tokenize::NormalizedQuery;
use crate::config::SearchConfig;
use crate::types::{EntryId, MatchStage, ResultSet, SearchHit};
use ahash::AHashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Runs queries against an index. Holds no index state of its own, so one
/// engine serves every session.
#[derive(Debug)]
pub struct QueryEngine {
    config: SearchConfig,
    executed: AtomicU64,
}

impl QueryEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            executed: AtomicU64::new(0),
        }
    }

    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Number of searches run so far.
    pub fn executed_count(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn search(&self, index: &SymbolIndex, raw: &str) -> ResultSet {
        self.search_normalized(index, &NormalizedQuery::new(raw))
    }

    /// Search with an already normalized query.
    ///
    /// Exact and prefix matches are collected first. Substring matches are
    /// only considered when those number fewer than the configured fallback
    /// threshold. Never fails: an empty query or empty index gives an empty
    /// result set.
    pub fn search_normalized(&self, index: &SymbolIndex, query: &NormalizedQuery) -> ResultSet {
        self.executed.fetch_add(1, Ordering::Relaxed);

        if query.is_empty() || index.is_empty() {
            return ResultSet::empty(query.as_str());
        }

        let start = Instant::now();
        let tokens = query.tokens();
        let mut seen = AHashSet::new();
        let mut candidates = vec![];

        // Any entry at prefix stage or better has a token that is a prefix of its key
        for token in tokens {
            for node in index.prefix_range(token) {
                collect(index, tokens, &node.entries, MatchStage::Prefix, &mut seen, &mut candidates);
            }
        }

        let threshold = self.config.min_prefix_results_before_substring_fallback;
        let fallback = candidates.len() < threshold;
        if fallback {
            for token in tokens {
                for node in index.substring_scan(token) {
                    collect(index, tokens, &node.entries, MatchStage::Substring, &mut seen, &mut candidates);
                }
            }
        }

        let ranked = Ranker::new(&self.config.kind_weights).rank(index, candidates, self.config.max_results);
        let anchor_base = self.config.anchor_base.as_deref();
        let hits = ranked
            .candidates
            .iter()
            .map(|candidate| {
                let entry = index.entry(candidate.id);
                SearchHit {
                    display_name: entry.display_name.clone(),
                    scope_label: entry.scope_label.clone(),
                    anchor_url: entry.anchor.resolve(anchor_base),
                    kind: entry.kind,
                    stage: candidate.stage,
                    entry: candidate.id,
                }
            })
            .collect();

        tracing::debug!(
            "Query '{}': {} candidates{} in {:?}",
            query,
            ranked.total,
            if fallback { " (substring fallback)" } else { "" },
            start.elapsed()
        );

        ResultSet {
            query: query.as_str().to_string(),
            hits,
            truncated: ranked.truncated,
            total_candidates: ranked.total,
        }
    }
}

/// Evaluate `ids` and keep those matching at `max_stage` or better.
fn collect(
    index: &SymbolIndex,
    tokens: &[String],
    ids: &[EntryId],
    max_stage: MatchStage,
    seen: &mut AHashSet<EntryId>,
    out: &mut Vec<Candidate>,
) {
    for &id in ids {
        if seen.contains(&id) {
            continue;
        }
        let key = &index.entry(id).key;
        let Some(stage) = match_entry(tokens, key, index.scope_key(id)) else {
            continue;
        };
        if stage <= max_stage {
            seen.insert(id);
            out.push(Candidate { id, stage });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KindWeights;
    use crate::types::{Anchor, Entry, Kind};
    use assert2::check;
    use rstest::{fixture, rstest};

    fn entry(name: &str, scope: &str, kind: Kind, anchor: &str) -> Entry {
        Entry {
            key: name.to_lowercase(),
            display_name: name.to_string(),
            scope_label: scope.to_string(),
            anchor: Anchor::new(anchor),
            kind,
            overload_index: 0,
            fragment_id: name.to_lowercase(),
        }
    }

    #[fixture]
    fn index() -> SymbolIndex {
        SymbolIndex::from_entries([
            entry("lock", "engine::Mutex", Kind::Function, "../d0/da4/classengine_1_1Mutex.html#a1"),
            entry("lock_shared", "engine::Semaphore", Kind::Function, "../d1/classengine_1_1Semaphore.html#a2"),
            entry("Logging", "components", Kind::Class, "../d4/classcomponents_1_1Logging.html"),
        ])
    }

    fn engine(config: SearchConfig) -> QueryEngine {
        QueryEngine::new(config)
    }

    #[rstest]
    fn test_prefix_scenario_default_weights(index: SymbolIndex) {
        let results = engine(SearchConfig::default()).search(&index, "lo");
        check!(results.names() == ["Logging", "lock", "lock_shared"]);
        check!(!results.truncated);
    }

    #[rstest]
    fn test_prefix_scenario_functions_first(index: SymbolIndex) {
        let config = SearchConfig {
            kind_weights: KindWeights::default().with(Kind::Function, -1),
            ..SearchConfig::default()
        };
        let results = engine(config).search(&index, "lo");
        check!(results.names() == ["lock", "lock_shared", "Logging"]);
    }

    #[rstest]
    #[case("xyz123")]
    #[case("")]
    #[case("   ")]
    fn test_no_match_is_empty(index: SymbolIndex, #[case] query: &str) {
        let results = engine(SearchConfig::default()).search(&index, query);
        check!(results.is_empty());
        check!(!results.truncated);
        check!(results.total_candidates == 0);
    }

    #[test]
    fn test_empty_index_is_empty() {
        let results = engine(SearchConfig::default()).search(&SymbolIndex::new(), "lock");
        check!(results.is_empty());
        check!(results.query == "lock");
    }

    #[rstest]
    fn test_exact_ranks_before_prefix(index: SymbolIndex) {
        let results = engine(SearchConfig::default()).search(&index, "LOCK");
        check!(results.names() == ["lock", "lock_shared"]);
        check!(results.hits[0].stage == MatchStage::Exact);
        check!(results.hits[1].stage == MatchStage::Prefix);
    }

    #[rstest]
    #[case(3, &["lock", "lock_shared", "unlock"])]
    #[case(2, &["lock", "lock_shared"])]
    #[case(0, &["lock", "lock_shared"])]
    fn test_substring_fallback_boundary(#[case] threshold: usize, #[case] expected: &[&str]) {
        let index = SymbolIndex::from_entries([
            entry("unlock", "engine::Mutex", Kind::Function, "m.html#u"),
            entry("lock", "engine::Mutex", Kind::Function, "m.html#l"),
            entry("lock_shared", "engine::Semaphore", Kind::Function, "s.html#l"),
        ]);
        let config = SearchConfig {
            min_prefix_results_before_substring_fallback: threshold,
            ..SearchConfig::default()
        };
        check!(engine(config).search(&index, "lock").names() == expected);
    }

    #[rstest]
    fn test_multi_token_matches_scope(index: SymbolIndex) {
        let engine = engine(SearchConfig::default());
        check!(engine.search(&index, "mutex lock").names() == ["lock"]);
        check!(engine.search(&index, "lock semaphore").names() == ["lock_shared"]);
        // Scope alone never matches
        check!(engine.search(&index, "engine").is_empty());
    }

    #[test]
    fn test_max_results_caps_and_flags_truncation() {
        let index = SymbolIndex::from_entries(
            (0..30).map(|i| entry(&format!("lock{:02}", i), "", Kind::Function, &format!("p.html#{}", i))),
        );
        let config = SearchConfig {
            max_results: 5,
            ..SearchConfig::default()
        };
        let results = engine(config).search(&index, "lock");
        check!(results.len() == 5);
        check!(results.truncated);
        check!(results.total_candidates == 30);
        check!(results.names() == ["lock00", "lock01", "lock02", "lock03", "lock04"]);
    }

    #[rstest]
    fn test_ranking_is_deterministic(index: SymbolIndex) {
        let engine = engine(SearchConfig::default());
        let first = engine.search(&index, "l");
        let second = engine.search(&index, "l");
        check!(first == second);
        check!(engine.executed_count() == 2);
    }

    #[rstest]
    fn test_every_key_is_found_exactly(index: SymbolIndex) {
        let engine = engine(SearchConfig::default());
        for (id, entry) in index.entries() {
            let results = engine.search(&index, &entry.key);
            check!(results.hits.iter().any(|hit| hit.entry == id && hit.stage == MatchStage::Exact));
        }
    }

    #[rstest]
    fn test_anchor_resolved_against_base(index: SymbolIndex) {
        let config = SearchConfig {
            anchor_base: Some("https://docs.example/api".to_string()),
            ..SearchConfig::default()
        };
        let results = engine(config).search(&index, "lock");
        check!(results.hits[0].anchor_url == "https://docs.example/api/d0/da4/classengine_1_1Mutex.html#a1");
    }
}
