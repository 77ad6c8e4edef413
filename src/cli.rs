use crate::config::SearchConfig;
use crate::tracing::LogFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docsearch")]
#[command(about = "As-you-type symbol search over generated documentation search data", long_about = None)]
pub struct Cli {
    /// Config file (defaults to <config dir>/docsearch/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory or http(s) URL holding the search data shards
    #[arg(short, long, global = true, env = "DOCSEARCH_SOURCE", default_value = ".")]
    pub source: String,

    #[arg(short = 'n', long, global = true)]
    pub max_results: Option<usize>,

    #[arg(long, global = true)]
    pub debounce_ms: Option<u64>,

    /// Load shards on demand instead of all at startup
    #[arg(long, global = true)]
    pub lazy: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one query and print the ranked results
    Query {
        query: String,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read the input line by line from stdin, as if typed
    Interactive,
    /// Print index statistics
    Stats,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut SearchConfig) {
        if let Some(max_results) = self.max_results {
            config.max_results = max_results;
        }
        if let Some(debounce_ms) = self.debounce_ms {
            config.debounce_ms = debounce_ms;
        }
    }

    pub fn is_remote(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn test_parse_query_with_overrides() {
        let cli = Cli::parse_from(["docsearch", "query", "lock", "-n", "5", "--source", "https://docs.example/search"]);
        let_assert!(Commands::Query { query, json: false } = &cli.command);
        check!(query == "lock");
        check!(cli.is_remote());

        let mut config = SearchConfig::default();
        cli.apply_overrides(&mut config);
        check!(config.max_results == 5);
        check!(config.debounce_ms == SearchConfig::default().debounce_ms);
    }

    #[test]
    fn test_parse_interactive_lazy() {
        let cli = Cli::parse_from(["docsearch", "--lazy", "--debounce-ms", "40", "interactive"]);
        check!(matches!(cli.command, Commands::Interactive));
        check!(cli.lazy);
        check!(!cli.is_remote());
        check!(cli.debounce_ms == Some(40));
    }
}
