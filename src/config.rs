//! Search configuration: defaults, TOML file, and environment overrides.

use crate::error::{ConfigError, Result};
use crate::types::Kind;
use anyhow::Context;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_RESULTS: usize = 20;
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;
pub const DEFAULT_MIN_PREFIX_RESULTS: usize = 3;
pub const DEFAULT_LOAD_CONCURRENCY: usize = 4;
pub const DEFAULT_RESULT_CACHE_SIZE: usize = 64;

/// Priority weights per symbol kind. Lower weight ranks first.
///
/// Kinds that share a weight are ordered by their declaration order in
/// [`Kind`], so the resulting order is always total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindWeights([i32; Kind::ALL.len()]);

impl Default for KindWeights {
    fn default() -> Self {
        let mut weights = [0; Kind::ALL.len()];
        for kind in Kind::ALL {
            weights[kind as usize] = match kind {
                Kind::Class | Kind::Namespace => 0,
                Kind::Function => 1,
                Kind::Variable | Kind::Typedef => 2,
                Kind::EnumValue => 3,
                Kind::File | Kind::Page => 4,
            };
        }
        Self(weights)
    }
}

impl KindWeights {
    pub fn weight(&self, kind: Kind) -> i32 {
        self.0[kind as usize]
    }

    pub const fn set(&mut self, kind: Kind, weight: i32) {
        self.0[kind as usize] = weight;
    }

    /// Builder-style override of one kind's weight.
    #[must_use]
    pub const fn with(mut self, kind: Kind, weight: i32) -> Self {
        self.set(kind, weight);
        self
    }

    /// Sort key for a kind: weight first, declaration order second.
    pub fn rank(&self, kind: Kind) -> (i32, u8) {
        (self.weight(kind), kind as u8)
    }
}

impl<'de> Deserialize<'de> for KindWeights {
    /// Accepts a partial table; unspecified kinds keep their default weight.
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let overrides = HashMap::<Kind, i32>::deserialize(deserializer)?;
        let mut weights = Self::default();
        for (kind, weight) in overrides {
            weights.set(kind, weight);
        }
        Ok(weights)
    }
}

/// Runtime options for loading, querying, and the interactive session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Maximum hits per result set.
    #[serde(alias = "maxResults")]
    pub max_results: usize,
    /// Input quiet period before a query is dispatched.
    #[serde(alias = "debounceMs")]
    pub debounce_ms: u64,
    /// Substring matching runs when exact+prefix matches number fewer than this.
    #[serde(alias = "minPrefixResultsBeforeSubstringFallback")]
    pub min_prefix_results_before_substring_fallback: usize,
    #[serde(alias = "kindWeights")]
    pub kind_weights: KindWeights,
    /// Shards fetched at the same time during bulk loading.
    pub load_concurrency: usize,
    /// Result sets remembered per session.
    pub result_cache_size: usize,
    /// Base URL that anchor paths are resolved against.
    pub anchor_base: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            min_prefix_results_before_substring_fallback: DEFAULT_MIN_PREFIX_RESULTS,
            kind_weights: KindWeights::default(),
            load_concurrency: DEFAULT_LOAD_CONCURRENCY,
            result_cache_size: DEFAULT_RESULT_CACHE_SIZE,
            anchor_base: None,
        }
    }
}

impl SearchConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse search config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration: defaults <- config file <- environment.
    ///
    /// With no explicit path, `<config dir>/docsearch/config.toml` is used if it
    /// exists. An explicit path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.is_file()),
        };

        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                tracing::debug!("Loaded search config from {}", path.display());
                Self::from_toml(&content)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCSEARCH_*` overrides using the given variable lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> std::result::Result<(), ConfigError> {
        if let Some(value) = parse_env(&lookup, "DOCSEARCH_MAX_RESULTS")? {
            self.max_results = value;
        }
        if let Some(value) = parse_env(&lookup, "DOCSEARCH_DEBOUNCE_MS")? {
            self.debounce_ms = value;
        }
        if let Some(value) = parse_env(&lookup, "DOCSEARCH_MIN_PREFIX_RESULTS")? {
            self.min_prefix_results_before_substring_fallback = value;
        }
        if let Some(value) = parse_env(&lookup, "DOCSEARCH_LOAD_CONCURRENCY")? {
            self.load_concurrency = value;
        }
        if let Some(base) = lookup("DOCSEARCH_ANCHOR_BASE").filter(|b| !b.trim().is_empty()) {
            self.anchor_base = Some(base);
        }
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_results == 0 {
            return Err(ConfigError::Zero { field: "max_results" });
        }
        if self.load_concurrency == 0 {
            return Err(ConfigError::Zero { field: "load_concurrency" });
        }
        if self.result_cache_size == 0 {
            return Err(ConfigError::Zero { field: "result_cache_size" });
        }
        Ok(())
    }

    pub const fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&'static str) -> Option<String>,
    var: &'static str,
) -> std::result::Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

/// `<config dir>/docsearch/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("docsearch").join("config.toml"))
}
