//! Error handling types and utilities.

use thiserror::Error;

/// A specialized Result type for docsearch plumbing.
///
/// This is an alias for `anyhow::Result` with context added via `.context()` and
/// `.with_context()` methods at the binary and configuration layers.
pub type Result<T> = anyhow::Result<T>;

/// Error returned when a search data shard cannot be loaded.
///
/// Every variant is recoverable: the shard is skipped and the index keeps
/// serving whatever else has been loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The fragment does not exist at the source.
    #[error("shard '{shard}' not found at {location}")]
    NotFound { shard: String, location: String },
    /// The fragment was fetched but its outer structure could not be parsed.
    #[error("shard '{shard}' is malformed: {reason}")]
    Malformed { shard: String, reason: String },
    /// The source could not be reached.
    #[error("shard '{shard}' unavailable: {reason}")]
    NetworkUnavailable { shard: String, reason: String },
}

impl LoadError {
    /// The shard id this error refers to.
    pub fn shard(&self) -> &str {
        match self {
            Self::NotFound { shard, .. }
            | Self::Malformed { shard, .. }
            | Self::NetworkUnavailable { shard, .. } => shard,
        }
    }
}

/// A single record inside a fragment that could not be turned into entries.
///
/// Always recovered by skipping the record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record #{position} ({record}): {reason}")]
pub struct MalformedEntry {
    /// Zero-based position of the record in its fragment.
    pub position: usize,
    /// Raw record id, or `?` if it could not be read.
    pub record: String,
    pub reason: &'static str,
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("'{field}' must be at least 1")]
    Zero { field: &'static str },
    #[error("environment variable {var} has invalid value '{value}'")]
    InvalidEnv { var: &'static str, value: String },
}
