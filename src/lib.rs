pub mod cli;
pub mod config;
pub mod error;
pub mod search;
pub mod session;
pub mod shard;
pub mod state;
pub mod tracing;
pub mod types;

pub use config::{KindWeights, SearchConfig};
pub use error::{ConfigError, LoadError, MalformedEntry};
pub use search::{NormalizedQuery, QueryEngine, SymbolIndex};
pub use session::{SessionController, SessionEvent, SessionHandle};
pub use shard::{FsShardSource, HttpShardSource, MemoryShardSource, ShardId, ShardLoader, ShardManifest, ShardSource};
pub use state::{IndexStats, SearchState};
pub use types::{Anchor, Entry, EntryId, HitGroup, Kind, MatchStage, ResultSet, SearchHit};
