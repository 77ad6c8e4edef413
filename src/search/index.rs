//! Sorted-key symbol index with prefix ranges and substring scans.

use crate::types::{Entry, EntryId, EntryIdentity};
use ahash::{AHashMap, AHashSet};
use std::cmp::Ordering;

/// All entries sharing one key, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNode {
    pub key: String,
    pub entries: Vec<EntryId>,
}

/// Outcome of one [`SymbolIndex::insert`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertStats {
    pub inserted: usize,
    pub duplicates: usize,
    pub new_keys: usize,
}

/// The merged, query-ready symbol table.
///
/// Keys live in one array sorted by key, so exact lookups are a binary search
/// and a prefix is a contiguous range found with two `partition_point`s. The
/// index is append-only: entries are never removed or mutated, and every
/// batch that adds something bumps [`SymbolIndex::generation`].
#[derive(Debug, Clone, Default)]
pub struct SymbolIndex {
    /// Entries in insertion order; `EntryId` is the position here.
    entries: Vec<Entry>,
    /// Lowercased scope labels, parallel to `entries`.
    scope_keys: Vec<String>,
    /// Sorted by key, one node per distinct key.
    nodes: Vec<KeyNode>,
    identities: AHashSet<EntryIdentity>,
    generation: u64,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a single batch.
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut index = Self::new();
        index.insert(entries);
        index
    }

    /// Insert one batch (normally one shard).
    ///
    /// Entries already present by (key, anchor, overload index) are dropped.
    /// Keys new to the index are sorted once and merged into the key array.
    pub fn insert(&mut self, entries: impl IntoIterator<Item = Entry>) -> InsertStats {
        let mut stats = InsertStats::default();
        let mut fresh: AHashMap<String, Vec<EntryId>> = AHashMap::new();

        for entry in entries {
            if !self.identities.insert(entry.identity()) {
                stats.duplicates += 1;
                continue;
            }

            let Ok(raw_id) = u32::try_from(self.entries.len()) else {
                tracing::warn!("Symbol index is full, dropping '{}'", entry.display_name);
                break;
            };
            let id = EntryId(raw_id);

            match self.find(&entry.key) {
                Ok(slot) => self.nodes[slot].entries.push(id),
                Err(_) => fresh.entry(entry.key.clone()).or_default().push(id),
            }

            self.scope_keys.push(entry.scope_label.to_lowercase());
            self.entries.push(entry);
            stats.inserted += 1;
        }

        if !fresh.is_empty() {
            stats.new_keys = fresh.len();
            let mut fresh: Vec<KeyNode> = fresh
                .into_iter()
                .map(|(key, entries)| KeyNode { key, entries })
                .collect();
            fresh.sort_unstable_by(|a, b| a.key.cmp(&b.key));
            self.nodes = merge_sorted(std::mem::take(&mut self.nodes), fresh);
        }

        if stats.inserted > 0 {
            self.generation += 1;
        }

        stats
    }

    fn find(&self, key: &str) -> Result<usize, usize> {
        self.nodes.binary_search_by(|node| node.key.as_str().cmp(key))
    }

    /// Entries whose key equals `key`.
    pub fn exact(&self, key: &str) -> &[EntryId] {
        self.find(key)
            .map_or(&[], |slot| self.nodes[slot].entries.as_slice())
    }

    /// Key nodes whose key starts with `prefix`, in key order.
    pub fn prefix_range(&self, prefix: &str) -> &[KeyNode] {
        let start = self.nodes.partition_point(|node| node.key.as_str() < prefix);
        let len = self.nodes[start..].partition_point(|node| node.key.starts_with(prefix));
        &self.nodes[start..start + len]
    }

    /// Key nodes whose key contains `needle` anywhere. Linear scan.
    pub fn substring_scan<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = &'a KeyNode> + 'a {
        self.nodes.iter().filter(move |node| node.key.contains(needle))
    }

    pub fn entry(&self, id: EntryId) -> &Entry {
        &self.entries[id.index()]
    }

    /// Lowercased scope label of an entry.
    pub fn scope_key(&self, id: EntryId) -> &str {
        &self.scope_keys[id.index()]
    }

    pub fn nodes(&self) -> &[KeyNode] {
        &self.nodes
    }

    pub fn entries(&self) -> impl Iterator<Item = (EntryId, &Entry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (EntryId(i as u32), entry))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.nodes.len()
    }

    /// Incremented by every insert that adds at least one entry.
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Merge two key-sorted node lists with disjoint keys.
fn merge_sorted(existing: Vec<KeyNode>, fresh: Vec<KeyNode>) -> Vec<KeyNode> {
    if existing.is_empty() {
        return fresh;
    }

    let mut merged = Vec::with_capacity(existing.len() + fresh.len());
    let mut left = existing.into_iter().peekable();
    let mut right = fresh.into_iter().peekable();

    loop {
        let next = match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => match a.key.cmp(&b.key) {
                Ordering::Greater => right.next(),
                Ordering::Less | Ordering::Equal => left.next(),
            },
            (Some(_), None) => left.next(),
            (None, Some(_)) => right.next(),
            (None, None) => break,
        };
        merged.extend(next);
    }

    merged
}
