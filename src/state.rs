//! Owned search state: the index, shard bookkeeping, and the query engine.
//!
//! One `SearchState` exists per documentation set and is shared by `Arc`
//! between the loaders and every session. Shard fetches may run
//! concurrently, but insertion into the index is serialized through the
//! index write lock, one shard at a time.

use crate::config::SearchConfig;
use crate::error::LoadError;
use crate::search::{InsertStats, NormalizedQuery, QueryEngine, SymbolIndex};
use crate::shard::{LoadReport, Shard, ShardId, ShardLoader, ShardManifest, ShardStats};
use crate::types::ResultSet;
use ahash::AHashMap;
use futures::future::{BoxFuture, Shared};
use futures::{FutureExt, StreamExt, stream};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// A shard load that several callers can await.
type SharedLoad = Shared<BoxFuture<'static, Result<ShardStats, LoadError>>>;

/// Snapshot of the index and loading progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub entries: usize,
    pub keys: usize,
    pub generation: u64,
    pub shards_loaded: usize,
    pub shards_failed: usize,
    pub searches: u64,
}

pub struct SearchState {
    index: RwLock<SymbolIndex>,
    engine: QueryEngine,
    loader: ShardLoader,
    manifest: RwLock<Option<ShardManifest>>,
    /// Shards already inserted, with their parse statistics
    loaded: Mutex<AHashMap<ShardId, ShardStats>>,
    /// Most recent failure per shard; cleared when a retry succeeds
    failed: Mutex<AHashMap<ShardId, LoadError>>,
    in_flight: Mutex<HashMap<ShardId, SharedLoad>>,
}

impl fmt::Debug for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchState")
            .field("loader", &self.loader)
            .field("entries", &self.index.try_read().map(|index| index.len()).ok())
            .field("in_flight", &self.in_flight.try_lock().map(|m| m.len()).ok())
            .finish_non_exhaustive()
    }
}

impl SearchState {
    pub fn new(config: SearchConfig, loader: ShardLoader) -> Self {
        Self {
            index: RwLock::new(SymbolIndex::new()),
            engine: QueryEngine::new(config),
            loader,
            manifest: RwLock::new(None),
            loaded: Mutex::new(AHashMap::new()),
            failed: Mutex::new(AHashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub const fn config(&self) -> &SearchConfig {
        self.engine.config()
    }

    pub const fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    pub const fn loader(&self) -> &ShardLoader {
        &self.loader
    }

    /// Fetch and decode a shard, then insert it into the index.
    pub async fn load_shard(&self, id: &ShardId) -> Result<ShardStats, LoadError> {
        match self.loader.load_shard(id).await {
            Ok(shard) => Ok(self.register(shard).await),
            Err(e) => {
                self.record_failure(e.clone()).await;
                Err(e)
            }
        }
    }

    /// Insert a decoded shard.
    ///
    /// Holds the index write lock for the whole shard so concurrent loads
    /// never interleave their entries.
    pub async fn register(&self, shard: Shard) -> ShardStats {
        let start = Instant::now();
        let inserted: InsertStats = {
            let mut index = self.index.write().await;
            index.insert(shard.entries)
        };

        tracing::info!(
            "Indexed shard {}: {} entries ({} duplicates, {} new keys) in {:?}",
            shard.id,
            inserted.inserted,
            inserted.duplicates,
            inserted.new_keys,
            start.elapsed()
        );

        self.failed.lock().await.remove(&shard.id);
        self.loaded.lock().await.insert(shard.id, shard.stats);
        shard.stats
    }

    async fn record_failure(&self, error: LoadError) {
        tracing::warn!("Failed to load {}", error);
        self.failed
            .lock()
            .await
            .insert(ShardId::new(error.shard()), error);
    }

    /// Load a shard unless it is already loaded.
    ///
    /// Concurrent callers for the same shard share one fetch: the first one
    /// starts it and the others await the same future.
    pub async fn ensure_loaded(self: &Arc<Self>, id: &ShardId) -> Result<ShardStats, LoadError> {
        if let Some(stats) = self.loaded.lock().await.get(id) {
            return Ok(*stats);
        }

        let future = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(future) = in_flight.get(id) {
                tracing::debug!("Awaiting in-flight load of {}", id);
                future.clone()
            } else if let Some(stats) = self.loaded.lock().await.get(id) {
                // Finished between the first check and taking the lock
                return Ok(*stats);
            } else {
                let state = Arc::clone(self);
                let owned = id.clone();
                let load: BoxFuture<'static, Result<ShardStats, LoadError>> = async move {
                    let result = state.load_shard(&owned).await;
                    state.in_flight.lock().await.remove(&owned);
                    result
                }
                .boxed();

                let shared = load.shared();
                in_flight.insert(id.clone(), shared.clone());
                shared
            }
        };

        future.await
    }

    /// Load many shards.
    ///
    /// Up to `load_concurrency` fetches run at once, but shards are inserted
    /// one at a time in the order given. Failures are logged and reported;
    /// they never stop the remaining shards.
    pub async fn load_all(&self, ids: impl IntoIterator<Item = ShardId>) -> LoadReport {
        let start = Instant::now();
        let pending: Vec<ShardId> = {
            let loaded = self.loaded.lock().await;
            ids.into_iter().filter(|id| !loaded.contains_key(id)).collect()
        };

        let loader = &self.loader;
        let mut fetches = stream::iter(pending)
            .map(|id| async move { loader.load_shard(&id).await })
            .buffered(self.config().load_concurrency);

        let mut report = LoadReport::default();
        while let Some(result) = fetches.next().await {
            match result {
                Ok(shard) => {
                    let id = shard.id.clone();
                    let stats = self.register(shard).await;
                    report.loaded.push((id, stats));
                }
                Err(e) => {
                    self.record_failure(e.clone()).await;
                    report.failed.push(e);
                }
            }
        }

        tracing::info!(
            "Loaded {} shards ({} entries, {} failed) in {:?}",
            report.loaded.len(),
            report.entry_count(),
            report.failed.len(),
            start.elapsed()
        );
        report
    }

    /// Fetch the section manifest and remember it for lazy loading.
    pub async fn load_manifest(&self) -> Result<ShardManifest, LoadError> {
        let manifest = self.loader.load_manifest().await?;
        tracing::debug!("Manifest lists {} shards", manifest.shards().len());
        self.set_manifest(manifest.clone()).await;
        Ok(manifest)
    }

    pub async fn set_manifest(&self, manifest: ShardManifest) {
        *self.manifest.write().await = Some(manifest);
    }

    /// Load every preferred shard of the manifest.
    pub async fn load_from_manifest(&self) -> Result<LoadReport, LoadError> {
        let manifest = self.load_manifest().await?;
        Ok(self.load_all(manifest.preferred_ids()).await)
    }

    /// Start background loads for unloaded shards that cover the first
    /// character of any query token.
    ///
    /// Returns immediately; the current query runs against whatever is
    /// already indexed. Without a manifest this does nothing.
    pub async fn prefetch_for_query(
        self: &Arc<Self>,
        query: &NormalizedQuery,
    ) -> Vec<JoinHandle<Result<ShardStats, LoadError>>> {
        let wanted: Vec<ShardId> = {
            let manifest = self.manifest.read().await;
            let Some(manifest) = manifest.as_ref() else {
                return vec![];
            };
            let loaded = self.loaded.lock().await;
            let mut wanted = vec![];
            for c in query.leading_chars() {
                for id in manifest.shards_for_char(c) {
                    if !loaded.contains_key(id) && !wanted.contains(id) {
                        wanted.push(id.clone());
                    }
                }
            }
            wanted
        };

        wanted
            .into_iter()
            .map(|id| {
                tracing::debug!("Prefetching {} for query '{}'", id, query);
                let state = Arc::clone(self);
                tokio::spawn(async move { state.ensure_loaded(&id).await })
            })
            .collect()
    }

    /// Run a query against the current index.
    pub async fn search(&self, raw: &str) -> ResultSet {
        self.search_normalized(&NormalizedQuery::new(raw)).await.1
    }

    /// Run a query and report the index generation it saw.
    pub async fn search_normalized(&self, query: &NormalizedQuery) -> (u64, ResultSet) {
        let index = self.index.read().await;
        (index.generation(), self.engine.search_normalized(&index, query))
    }

    pub async fn generation(&self) -> u64 {
        self.index.read().await.generation()
    }

    pub async fn is_loaded(&self, id: &ShardId) -> bool {
        self.loaded.lock().await.contains_key(id)
    }

    /// Shards whose last load attempt failed.
    pub async fn failures(&self) -> Vec<LoadError> {
        let mut failures: Vec<_> = self.failed.lock().await.values().cloned().collect();
        failures.sort_by(|a, b| a.shard().cmp(b.shard()));
        failures
    }

    pub async fn stats(&self) -> IndexStats {
        let (entries, keys, generation) = {
            let index = self.index.read().await;
            (index.len(), index.key_count(), index.generation())
        };
        IndexStats {
            entries,
            keys,
            generation,
            shards_loaded: self.loaded.lock().await.len(),
            shards_failed: self.failed.lock().await.len(),
            searches: self.engine.executed_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::MemoryShardSource;
    use assert2::{check, let_assert};

    const LOCK: &str = "[['lock_1',['lock',['../a/classengine_1_1Mutex.html#a1',1,'engine::Mutex']]]]";
    const LOGGING: &str = "[['logging_2',['Logging',['../b/classcomponents_1_1Logging.html',1,'components']]]]";

    fn state(source: MemoryShardSource) -> Arc<SearchState> {
        Arc::new(SearchState::new(
            SearchConfig::default(),
            ShardLoader::from_source(source),
        ))
    }

    #[tokio::test]
    async fn test_load_all_survives_failed_shard() {
        let state = state(
            MemoryShardSource::new()
                .with("functions_0", LOCK)
                .with_offline("classes_0"),
        );

        let report = state
            .load_all([ShardId::new("classes_0"), ShardId::new("functions_0")]).await;
        check!(report.loaded.len() == 1);
        check!(report.failed.len() == 1);
        check!(!report.is_complete());

        check!(state.search("lock").await.names() == ["lock"]);
        let stats = state.stats().await;
        check!(stats.shards_loaded == 1);
        check!(stats.shards_failed == 1);
    }

    #[tokio::test]
    async fn test_load_all_skips_loaded_shards() {
        let state = state(MemoryShardSource::new().with("functions_0", LOCK));
        state.load_all([ShardId::new("functions_0")]).await;
        let generation = state.generation().await;

        let report = state.load_all([ShardId::new("functions_0")]).await;
        check!(report.loaded.is_empty());
        check!(state.generation().await == generation);
    }

    #[tokio::test]
    async fn test_ensure_loaded_is_idempotent() {
        let state = state(MemoryShardSource::new().with("classes_0", LOGGING));
        let id = ShardId::new("classes_0");

        let (a, b) = tokio::join!(state.ensure_loaded(&id), state.ensure_loaded(&id));
        check!(a == b);
        let_assert!(Ok(stats) = state.ensure_loaded(&id).await);
        check!(stats.entries == 1);
        check!(state.generation().await == 1);
        check!(state.stats().await.entries == 1);
    }

    #[tokio::test]
    async fn test_failed_shard_can_be_retried() {
        let source = MemoryShardSource::new().with_offline("classes_0");
        let state = state(source.clone());
        let id = ShardId::new("classes_0");

        check!(state.ensure_loaded(&id).await.is_err());
        check!(state.failures().await.len() == 1);

        source.insert("classes_0", LOGGING);
        check!(state.ensure_loaded(&id).await.is_ok());
        check!(state.failures().await.is_empty());
        check!(state.is_loaded(&id).await);
    }

    #[tokio::test]
    async fn test_prefetch_without_manifest_does_nothing() {
        let state = state(MemoryShardSource::new());
        check!(state.prefetch_for_query(&NormalizedQuery::new("lock")).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_on_empty_state() {
        let state = state(MemoryShardSource::new());
        check!(state.search("lock").await.is_empty());
        check!(state.stats().await.searches == 1);
    }
}
