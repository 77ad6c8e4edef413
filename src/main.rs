use anyhow::Context;
use clap::Parser;
use docsearch::cli::{Cli, Commands};
use docsearch::{
    FsShardSource, HttpShardSource, ResultSet, SearchConfig, SearchState, SessionController,
    SessionEvent, ShardLoader,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Logs go to stderr so stdout carries only results
    docsearch::tracing::init_with(cli.log_format, cli.verbose);

    let mut config = SearchConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let loader = if cli.is_remote() {
        let source = HttpShardSource::new(&cli.source)
            .with_context(|| format!("Failed to create HTTP client for {}", cli.source))?;
        ShardLoader::from_source(source)
    } else {
        ShardLoader::from_source(FsShardSource::new(&cli.source))
    };
    tracing::info!("Reading search data from {}", loader.source().describe());

    let state = Arc::new(SearchState::new(config, loader));
    if cli.lazy {
        // Only the manifest up front; shards follow the queries
        if let Err(e) = state.load_manifest().await {
            tracing::warn!("No manifest, lazy loading disabled: {}", e);
        }
    } else {
        match state.load_from_manifest().await {
            Ok(report) if report.loaded.is_empty() && !report.failed.is_empty() => {
                tracing::warn!("No shard could be loaded; results will be empty");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not load manifest, index is empty: {}", e),
        }
    }

    match cli.command {
        Commands::Query { query, json } => run_query(&state, &query, json).await,
        Commands::Interactive => run_interactive(state).await,
        Commands::Stats => {
            let stats = state.stats().await;
            println!("entries:       {}", stats.entries);
            println!("keys:          {}", stats.keys);
            println!("generation:    {}", stats.generation);
            println!("shards loaded: {}", stats.shards_loaded);
            println!("shards failed: {}", stats.shards_failed);
            for failure in state.failures().await {
                println!("  {}", failure);
            }
            Ok(())
        }
    }
}

async fn run_query(state: &Arc<SearchState>, query: &str, json: bool) -> anyhow::Result<()> {
    let normalized = docsearch::NormalizedQuery::new(query);
    // Lazy mode: wait for the shards this query needs before the one-shot search
    for handle in state.prefetch_for_query(&normalized).await {
        if let Ok(Err(e)) = handle.await {
            tracing::warn!("Prefetch failed: {}", e);
        }
    }

    let results = state.search(query).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results);
    }
    Ok(())
}

async fn run_interactive(state: Arc<SearchState>) -> anyhow::Result<()> {
    let settle = state.config().debounce() * 2;
    let (session, mut events) = SessionController::spawn(state);
    let shutdown = session.shutdown_token();

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Results { results, cached, .. } => {
                    tracing::debug!("Displaying '{}' (cached: {})", results.query, cached);
                    print_results(&results);
                }
                SessionEvent::Cleared => println!("--"),
                SessionEvent::Cancelled { seq } => tracing::debug!("Query {} cancelled", seq),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let sent = if line.trim() == ":cancel" {
                    session.cancel()
                } else if line.trim() == ":clear" {
                    session.clear()
                } else {
                    session.keystroke(line)
                };
                if !sent {
                    break;
                }
            }
        }
    }

    // Let the last keystroke's search finish before stopping
    tokio::time::sleep(settle).await;
    session.shutdown().await;
    printer.await.context("Result printer failed")?;
    Ok(())
}

fn print_results(results: &ResultSet) {
    if results.is_empty() {
        println!("No results for '{}'", results.query);
        return;
    }

    for group in results.grouped() {
        match group.hits.as_slice() {
            [hit] => println!(
                "{:<10} {}  {}  {}",
                hit.kind.as_str(),
                hit.display_name,
                hit.scope_label,
                hit.anchor_url
            ),
            hits => {
                println!(
                    "{:<10} {} ({} overloads)",
                    hits[0].kind.as_str(),
                    group.display_name,
                    hits.len()
                );
                for hit in hits {
                    println!("{:<10}   {}  {}", "", hit.scope_label, hit.anchor_url);
                }
            }
        }
    }
    if results.truncated {
        println!("... {} more", results.total_candidates - results.len());
    }
}
