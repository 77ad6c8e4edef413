//! Backends that fetch raw fragment text.

use super::manifest::ShardId;
use crate::error::LoadError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// File name of the generator's section manifest.
pub const MANIFEST_NAME: &str = "searchdata";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches the text of a fragment by shard id.
///
/// Returns a boxed `'static` future so sources can be shared behind
/// `Arc<dyn ShardSource>` and fetched from spawned tasks.
pub trait ShardSource: Send + Sync + 'static {
    fn fetch(&self, id: &ShardId) -> BoxFuture<'static, Result<String, LoadError>>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Fragments stored as `<dir>/<shard_id>.js` (or `.json`).
#[derive(Debug, Clone)]
pub struct FsShardSource {
    root: PathBuf,
}

impl FsShardSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShardSource for FsShardSource {
    fn fetch(&self, id: &ShardId) -> BoxFuture<'static, Result<String, LoadError>> {
        let candidates = [
            self.root.join(format!("{}.js", id)),
            self.root.join(format!("{}.json", id)),
        ];
        let shard = id.to_string();

        async move {
            for path in &candidates {
                match tokio::fs::read_to_string(path).await {
                    Ok(text) => return Ok(text),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) if e.kind() == ErrorKind::InvalidData => {
                        return Err(LoadError::Malformed {
                            shard,
                            reason: format!("{} is not UTF-8", path.display()),
                        });
                    }
                    Err(e) => {
                        return Err(LoadError::NetworkUnavailable {
                            shard,
                            reason: format!("{}: {}", path.display(), e),
                        });
                    }
                }
            }

            Err(LoadError::NotFound {
                shard,
                location: candidates[0].display().to_string(),
            })
        }
        .boxed()
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Fragments served as `<base_url>/<shard_id>.js`.
#[derive(Debug, Clone)]
pub struct HttpShardSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpShardSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl ShardSource for HttpShardSource {
    fn fetch(&self, id: &ShardId) -> BoxFuture<'static, Result<String, LoadError>> {
        let url = format!("{}/{}.js", self.base_url, id);
        let client = self.client.clone();
        let shard = id.to_string();

        async move {
            let unavailable = |shard: String, e: reqwest::Error| LoadError::NetworkUnavailable {
                shard,
                reason: e.to_string(),
            };

            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| unavailable(shard.clone(), e))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(LoadError::NotFound {
                    shard,
                    location: url,
                });
            }

            let response = response
                .error_for_status()
                .map_err(|e| unavailable(shard.clone(), e))?;
            response.text().await.map_err(|e| unavailable(shard, e))
        }
        .boxed()
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// In-memory fragments. Missing ids are `NotFound`; ids marked offline fail
/// with `NetworkUnavailable`.
#[derive(Debug, Clone, Default)]
pub struct MemoryShardSource {
    fragments: Arc<RwLock<HashMap<ShardId, Result<String, LoadError>>>>,
}

impl MemoryShardSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`Self::insert`].
    #[must_use]
    pub fn with(self, id: impl Into<ShardId>, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }

    /// Builder-style variant of [`Self::set_offline`].
    #[must_use]
    pub fn with_offline(self, id: impl Into<ShardId>) -> Self {
        self.set_offline(id);
        self
    }

    pub fn insert(&self, id: impl Into<ShardId>, text: impl Into<String>) {
        self.write().insert(id.into(), Ok(text.into()));
    }

    pub fn set_offline(&self, id: impl Into<ShardId>) {
        let id = id.into();
        let err = LoadError::NetworkUnavailable {
            shard: id.to_string(),
            reason: "connection refused".to_string(),
        };
        self.write().insert(id, Err(err));
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ShardId, Result<String, LoadError>>> {
        // A poisoned map still holds valid fragments
        self.fragments.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ShardSource for MemoryShardSource {
    fn fetch(&self, id: &ShardId) -> BoxFuture<'static, Result<String, LoadError>> {
        let result = self
            .fragments
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
            .unwrap_or_else(|| {
                Err(LoadError::NotFound {
                    shard: id.to_string(),
                    location: "memory".to_string(),
                })
            });
        futures::future::ready(result).boxed()
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[tokio::test]
    async fn test_fs_source_reads_js_then_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("functions_b.js"), "[]").unwrap();
        std::fs::write(dir.path().join("classes_0.json"), "[[]]").unwrap();

        let source = FsShardSource::new(dir.path());
        check!(source.fetch(&"functions_b".into()).await == Ok("[]".to_string()));
        check!(source.fetch(&"classes_0".into()).await == Ok("[[]]".to_string()));
    }

    #[tokio::test]
    async fn test_fs_source_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsShardSource::new(dir.path());
        let_assert!(Err(LoadError::NotFound { shard, .. }) = source.fetch(&"all_0".into()).await);
        check!(shard == "all_0");
    }

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemoryShardSource::new()
            .with("all_0", "[]")
            .with_offline("all_1");

        check!(source.fetch(&"all_0".into()).await.is_ok());
        let_assert!(Err(LoadError::NetworkUnavailable { .. }) = source.fetch(&"all_1".into()).await);
        let_assert!(Err(LoadError::NotFound { .. }) = source.fetch(&"all_2".into()).await);
    }
}
