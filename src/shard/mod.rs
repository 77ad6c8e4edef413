//! Loading generated search data.
//!
//! A documentation site ships its search data as many small fragments
//! (shards), listed by a section manifest. Sources fetch raw fragment text,
//! the fragment parser decodes it, and the loader turns it into entries.

pub mod fragment;
pub mod loader;
pub mod manifest;
pub mod source;

pub use loader::{LoadReport, Shard, ShardLoader, ShardStats, decode_shard};
pub use manifest::{Section, ShardId, ShardManifest, ShardSpec};
pub use source::{FsShardSource, HttpShardSource, MemoryShardSource, ShardSource};
