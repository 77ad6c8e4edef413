//! Async driver for [`SessionMachine`].
//!
//! One tokio task per session owns the machine. It receives input over a
//! channel, runs the debounce timer, dispatches searches as separate tasks,
//! and reports what the presentation layer should show as [`SessionEvent`]s.

use super::machine::{Effect, QueryTicket, SessionMachine};
use crate::search::NormalizedQuery;
use crate::state::SearchState;
use crate::types::ResultSet;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// What the presentation layer should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Show these results.
    Results {
        seq: u64,
        results: ResultSet,
        /// Served from the session's result cache without searching.
        cached: bool,
    },
    /// Show nothing.
    Cleared,
    /// Pending work for `seq` was dropped.
    Cancelled { seq: u64 },
}

#[derive(Debug)]
enum Input {
    Keystroke(String),
    Clear,
    Cancel,
}

#[derive(Debug)]
struct Completion {
    seq: u64,
    generation: u64,
    results: ResultSet,
}

/// Client side of a running session.
#[derive(Debug)]
pub struct SessionHandle {
    input: mpsc::UnboundedSender<Input>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Report the full current input text. Returns false once the session
    /// has stopped.
    pub fn keystroke(&self, text: impl Into<String>) -> bool {
        self.input.send(Input::Keystroke(text.into())).is_ok()
    }

    pub fn clear(&self) -> bool {
        self.input.send(Input::Clear).is_ok()
    }

    pub fn cancel(&self) -> bool {
        self.input.send(Input::Cancel).is_ok()
    }

    /// Token that stops the session when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the session and wait for its task to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("Session task ended abnormally: {}", e);
        }
    }
}

/// Builds and runs a session against shared search state.
pub struct SessionController {
    state: Arc<SearchState>,
    machine: SessionMachine,
    /// Result sets by normalized query, each tagged with the index
    /// generation it was computed against
    cache: LruCache<String, (u64, ResultSet)>,
    debounce: std::time::Duration,
    timer: Option<(Instant, u64)>,
    events: mpsc::UnboundedSender<SessionEvent>,
    completions: mpsc::UnboundedSender<Completion>,
    refreshes: mpsc::UnboundedSender<u64>,
}

impl SessionController {
    /// Start a session task. Events arrive on the returned receiver.
    pub fn spawn(state: Arc<SearchState>) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let config = state.config();
        let capacity = NonZeroUsize::new(config.result_cache_size).unwrap_or(NonZeroUsize::MIN);
        let controller = Self {
            debounce: config.debounce(),
            cache: LruCache::new(capacity),
            state,
            machine: SessionMachine::new(),
            timer: None,
            events: event_tx,
            completions: completion_tx,
            refreshes: refresh_tx,
        };

        let task = tokio::spawn(controller.run(input_rx, completion_rx, refresh_rx, shutdown.clone()));
        let handle = SessionHandle {
            input: input_tx,
            shutdown,
            task,
        };
        (handle, event_rx)
    }

    async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<Input>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut refreshes: mpsc::UnboundedReceiver<u64>,
        shutdown: CancellationToken,
    ) {
        tracing::debug!("Session started");
        loop {
            let timer = self.timer;
            let effects = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                input = inputs.recv() => match input {
                    Some(Input::Keystroke(text)) => self.machine.keystroke(&text),
                    Some(Input::Clear) => self.machine.clear(),
                    Some(Input::Cancel) => self.machine.cancel(),
                    None => break,
                },
                Some(done) = completions.recv() => {
                    self.remember(&done);
                    self.machine.search_completed(done.seq, done.results)
                }
                Some(seq) = refreshes.recv() => self.machine.refresh(seq),
                _ = async {
                    match timer {
                        Some((at, _)) => sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                } => {
                    self.timer = None;
                    match timer {
                        Some((_, seq)) => self.machine.timer_fired(seq),
                        None => vec![],
                    }
                }
            };

            if self.apply(effects).await.is_err() {
                tracing::debug!("Session receiver dropped");
                break;
            }
        }
        tracing::debug!("Session stopped");
    }

    /// Carry out effects. Fails only when the event receiver is gone.
    async fn apply(&mut self, effects: Vec<Effect>) -> Result<(), mpsc::error::SendError<SessionEvent>> {
        for effect in effects {
            match effect {
                Effect::ArmTimer { seq } => {
                    self.timer = Some((Instant::now() + self.debounce, seq));
                }
                Effect::Dispatch(ticket) => {
                    if let Some(results) = self.cached(&ticket.query).await {
                        tracing::debug!("Result cache hit for '{}'", ticket.query);
                        for shown in self.machine.search_completed(ticket.seq, results) {
                            if let Effect::Display { seq, results } = shown {
                                self.events.send(SessionEvent::Results {
                                    seq,
                                    results,
                                    cached: true,
                                })?;
                            }
                        }
                    } else {
                        self.dispatch(ticket).await;
                    }
                }
                Effect::Display { seq, results } => {
                    self.events.send(SessionEvent::Results {
                        seq,
                        results,
                        cached: false,
                    })?;
                }
                Effect::Cleared => {
                    self.timer = None;
                    self.events.send(SessionEvent::Cleared)?;
                }
                Effect::Cancelled { seq } => {
                    self.timer = None;
                    self.events.send(SessionEvent::Cancelled { seq })?;
                }
            }
        }
        Ok(())
    }

    async fn cached(&mut self, query: &NormalizedQuery) -> Option<ResultSet> {
        let generation = self.state.generation().await;
        match self.cache.get(query.as_str()) {
            Some((seen, results)) if *seen == generation => Some(results.clone()),
            _ => None,
        }
    }

    fn remember(&mut self, done: &Completion) {
        self.cache
            .put(done.results.query.clone(), (done.generation, done.results.clone()));
    }

    /// Run a search in its own task, plus background loads of any shards the
    /// query needs. Neither blocks the session loop.
    async fn dispatch(&self, ticket: QueryTicket) {
        let QueryTicket { seq, query } = ticket;

        let prefetches = self.state.prefetch_for_query(&query).await;
        if !prefetches.is_empty() {
            let refreshes = self.refreshes.clone();
            tokio::spawn(async move {
                let mut grew = false;
                for handle in prefetches {
                    grew |= matches!(handle.await, Ok(Ok(stats)) if stats.entries > 0);
                }
                if grew {
                    // The receiver is gone only if the session stopped
                    let _ = refreshes.send(seq);
                }
            });
        }

        let state = Arc::clone(&self.state);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let (generation, results) = state.search_normalized(&query).await;
            let _ = completions.send(Completion {
                seq,
                generation,
                results,
            });
        });
    }
}
