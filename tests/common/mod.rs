//! Shared test fixtures and utilities for integration tests.
//!
//! # Sample site
//!
//! Every fixture serves the same small documentation site: a manifest plus
//! three shards.
//!
//! | shard         | symbols                                   |
//! |---------------|-------------------------------------------|
//! | `classes_0`   | `Logging`                                 |
//! | `functions_0` | `lock`, `lock_shared`, `LogFlush` (x2)    |
//! | `functions_1` | `unlock`                                  |
//!
//! # Available Fixtures
//!
//! - `shard_dir`: the site written to a temp directory (filesystem source)
//! - `memory_site`: the site in a [`MemoryShardSource`]
//!
//! [`loaded_state`] builds a [`SearchState`] with every shard already indexed.

#![allow(dead_code)] // Items used across different integration test crates

use docsearch::{MemoryShardSource, SearchConfig, SearchState, ShardLoader, ShardSource};
use rstest::fixture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const SEARCHDATA: &str = r#"var indexSectionsWithContent =
{
  0: "lu",
  1: "l",
  2: "lu"
};

var indexSectionNames =
{
  0: "all",
  1: "classes",
  2: "functions"
};

var indexSectionLabels =
{
  0: "All",
  1: "Classes",
  2: "Functions"
};
"#;

pub const CLASSES_L: &str = r"var searchData=
[
  ['logging_5064',['Logging',['../d4/da4/classcomponents_1_1Logging.html',1,'components']]]
];
";

pub const FUNCTIONS_L: &str = r"var searchData=
[
  ['lock_5078',['lock',['../d0/da4/classengine_1_1Mutex.html#a1345db9a141f510dc5941e584bd4408c',1,'engine::Mutex']]],
  ['lock_5fshared_5079',['lock_shared',['../db/d16/classengine_1_1Semaphore.html#af8b993ae5f6593d6d8d83d1ce6b0b91c',1,'engine::Semaphore']]],
  ['logflush_5082',['LogFlush',['../dd/d46/namespacelogging.html#a4e222b768d0cb65817b4d77562ca9b00',1,'logging::LogFlush()'],['../dd/d46/namespacelogging.html#ab20d8087ca85e349bba5462af64cea58',1,'logging::LogFlush(LoggerPtr logger)']]]
];
";

pub const FUNCTIONS_U: &str = r"var searchData=
[
  ['unlock_5201',['unlock',['../d0/da4/classengine_1_1Mutex.html#a5c1f07d6a4f2c1c8a0e4d7d0f35e6c11',1,'engine::Mutex']]]
];
";

/// Every file of the sample site, by shard id.
pub const SITE: &[(&str, &str)] = &[
    ("searchdata", SEARCHDATA),
    ("classes_0", CLASSES_L),
    ("functions_0", FUNCTIONS_L),
    ("functions_1", FUNCTIONS_U),
];

/// A temporary directory of shard files, removed on drop.
pub struct ShardDir {
    _temp: TempDir,
    root: PathBuf,
}

impl ShardDir {
    /// Creates an empty directory.
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Writes `<id>.js`.
    ///
    /// # Panics
    /// Panics if the file cannot be written.
    pub fn write(&self, id: &str, content: &str) {
        std::fs::write(self.root.join(format!("{}.js", id)), content)
            .unwrap_or_else(|e| panic!("Failed to write shard {}: {}", id, e));
    }

    /// Deletes `<id>.js`.
    pub fn remove(&self, id: &str) {
        std::fs::remove_file(self.root.join(format!("{}.js", id)))
            .unwrap_or_else(|e| panic!("Failed to remove shard {}: {}", id, e));
    }
}

/// The sample site on disk.
#[fixture]
pub fn shard_dir() -> ShardDir {
    docsearch::tracing::init();
    let dir = ShardDir::new();
    for (id, content) in SITE {
        dir.write(id, content);
    }
    dir
}

/// The sample site in memory.
#[fixture]
pub fn memory_site() -> MemoryShardSource {
    docsearch::tracing::init();
    SITE.iter()
        .fold(MemoryShardSource::new(), |source, (id, content)| source.with(*id, *content))
}

/// Build search state over any source.
pub fn state_for(source: impl ShardSource, config: SearchConfig) -> Arc<SearchState> {
    Arc::new(SearchState::new(config, ShardLoader::from_source(source)))
}

/// Search state with every shard of the sample site indexed.
pub async fn loaded_state(source: impl ShardSource, config: SearchConfig) -> Arc<SearchState> {
    let state = state_for(source, config);
    let report = state
        .load_from_manifest()
        .await
        .expect("sample manifest should parse");
    assert!(report.is_complete(), "sample shards should load: {:?}", report.failed);
    state
}
