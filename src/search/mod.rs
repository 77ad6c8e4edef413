//! Symbol index, query execution, and ranking.
//!
//! Entries are indexed by lowercased display name in a sorted key array.
//! Queries run in stages (exact, prefix, then substring as a fallback) and
//! the matches are ranked into a stable total order.

pub mod index;
pub mod query;
pub mod scoring;
pub mod tokenize;

pub use index::{InsertStats, KeyNode, SymbolIndex};
pub use query::QueryEngine;
pub use scoring::{Candidate, Ranked, Ranker};
pub use tokenize::NormalizedQuery;
