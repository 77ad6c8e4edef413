//! Fetch and decode shards.

use super::fragment::parse_fragment;
use super::manifest::{ShardId, ShardManifest};
use super::source::{MANIFEST_NAME, ShardSource};
use crate::error::LoadError;
use crate::types::Entry;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Parse statistics for one shard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// Symbol records decoded.
    pub records: usize,
    /// Entries produced (one per anchor).
    pub entries: usize,
    /// Malformed records dropped.
    pub skipped: usize,
}

/// The decoded contents of one fragment. Immutable once built.
#[derive(Debug, Clone)]
pub struct Shard {
    pub id: ShardId,
    pub entries: Vec<Entry>,
    pub stats: ShardStats,
}

/// Decode fragment text into a shard.
///
/// Malformed records are logged and skipped. Only a fragment whose outer
/// structure is unreadable fails the whole shard.
pub fn decode_shard(id: &ShardId, text: &str) -> Result<Shard, LoadError> {
    let parsed = parse_fragment(text).map_err(|reason| LoadError::Malformed {
        shard: id.to_string(),
        reason,
    })?;

    for skipped in &parsed.skipped {
        tracing::warn!("Skipping malformed record in shard {}: {}", id, skipped);
    }

    let section = id.section();
    let records = parsed.records.len();
    let entries: Vec<Entry> = parsed
        .records
        .into_iter()
        .flat_map(|record| record.into_entries(section))
        .collect();

    Ok(Shard {
        id: id.clone(),
        stats: ShardStats {
            records,
            entries: entries.len(),
            skipped: parsed.skipped.len(),
        },
        entries,
    })
}

/// Loads shards from a [`ShardSource`].
#[derive(Clone)]
pub struct ShardLoader {
    source: Arc<dyn ShardSource>,
}

impl fmt::Debug for ShardLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardLoader")
            .field("source", &self.source.describe())
            .finish()
    }
}

impl ShardLoader {
    pub fn new(source: Arc<dyn ShardSource>) -> Self {
        Self { source }
    }

    pub fn from_source(source: impl ShardSource) -> Self {
        Self::new(Arc::new(source))
    }

    pub fn source(&self) -> &Arc<dyn ShardSource> {
        &self.source
    }

    /// Fetch and decode one shard.
    pub async fn load_shard(&self, id: &ShardId) -> Result<Shard, LoadError> {
        let start = Instant::now();
        let text = self.source.fetch(id).await?;
        let shard = decode_shard(id, &text)?;
        tracing::debug!(
            "Decoded shard {} ({} entries, {} skipped) in {:?}",
            id,
            shard.stats.entries,
            shard.stats.skipped,
            start.elapsed()
        );
        Ok(shard)
    }

    /// Fetch and parse the section manifest.
    pub async fn load_manifest(&self) -> Result<ShardManifest, LoadError> {
        let text = self.source.fetch(&ShardId::new(MANIFEST_NAME)).await?;
        ShardManifest::parse(&text)
    }
}

/// Outcome of loading a batch of shards.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Shards that loaded, in insertion order.
    pub loaded: Vec<(ShardId, ShardStats)>,
    pub failed: Vec<LoadError>,
}

impl LoadReport {
    pub fn entry_count(&self) -> usize {
        self.loaded.iter().map(|(_, stats)| stats.entries).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
