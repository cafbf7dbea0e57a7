//! The session controller.
//!
//! One `SessionManager` per process owns the session store, the global
//! [`TurnLimiter`] and the shared [`AgentGraph`]. Each turn:
//!
//! 1. waits for the session's own turn lock (one turn per session at a time)
//! 2. appends and persists the user message
//! 3. holds a limiter permit while the graph runs
//! 4. persists the returned history, then sends the follow-up menu

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use hsxassist_agent::{AgentGraph, AgentStreamEvent, EventSink, GraphSettings, TurnOutcome};
use hsxassist_config::AppConfig;
use hsxassist_core::error::{Error, SessionError};
use hsxassist_core::event::{DomainEvent, EventBus};
use hsxassist_core::message::{Message, ThreadId, Transcript};
use hsxassist_core::provider::Provider;
use hsxassist_core::runtime::{BlockingPool, TurnLimiter};
use hsxassist_core::state::SessionState;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::starters::StarterMenu;
use crate::store::{InMemorySessionStore, SessionStore};

const PREVIEW_CHARS: usize = 80;

/// Runtime handles for an open session.
#[derive(Default)]
struct LiveSession {
    turn: Mutex<()>,
    cancel: Mutex<CancellationToken>,
    ended: AtomicBool,
}

pub struct SessionManager {
    graph: Arc<AgentGraph>,
    store: Arc<dyn SessionStore>,
    limiter: TurnLimiter,
    starters: StarterMenu,
    event_bus: Arc<EventBus>,
    live: RwLock<HashMap<String, Arc<LiveSession>>>,
}

impl SessionManager {
    pub fn new(
        graph: Arc<AgentGraph>,
        store: Arc<dyn SessionStore>,
        limiter: TurnLimiter,
        starters: StarterMenu,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            graph,
            store,
            limiter,
            starters,
            event_bus,
            live: RwLock::new(HashMap::new()),
        }
    }

    /// Wire the whole runtime from configuration: worker pool, tools, graph,
    /// limiter and an in-memory session store.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, Error> {
        let pool = BlockingPool::new(config.session.worker_threads);
        let toolbox = hsxassist_tools::toolbox_from_config(config, provider.clone(), pool)?;
        let graph = AgentGraph::new(
            provider,
            Arc::new(toolbox),
            GraphSettings::from(config),
            event_bus.clone(),
        );

        info!(
            max_concurrent_turns = config.session.max_concurrent_turns,
            worker_threads = config.session.worker_threads,
            max_graph_steps = config.session.max_graph_steps,
            "Session manager ready"
        );

        Ok(Self::new(
            Arc::new(graph),
            Arc::new(InMemorySessionStore::new()),
            TurnLimiter::new(config.session.max_concurrent_turns),
            StarterMenu::from_config(config),
            event_bus,
        ))
    }

    pub fn starters(&self) -> &StarterMenu {
        &self.starters
    }

    pub fn limiter(&self) -> &TurnLimiter {
        &self.limiter
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Allocate a thread id and an empty history.
    pub async fn start_session(&self) -> Result<SessionState, Error> {
        let state = SessionState::new();
        let thread_id = state.thread_id.clone();
        self.store.save(state.clone()).await?;
        self.live
            .write()
            .await
            .insert(thread_id.to_string(), Arc::new(LiveSession::default()));

        info!(thread_id = %thread_id, store = %self.store.name(), "Session started");
        self.event_bus.publish(DomainEvent::SessionStarted {
            thread_id: thread_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(state)
    }

    pub async fn session(&self, thread_id: &ThreadId) -> Result<SessionState, Error> {
        self.store
            .load(thread_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(thread_id.to_string()).into())
    }

    pub async fn history(&self, thread_id: &ThreadId) -> Result<Transcript, Error> {
        Ok(self.session(thread_id).await?.messages)
    }

    pub async fn session_count(&self) -> Result<usize, Error> {
        Ok(self.store.count().await?)
    }

    async fn live(&self, thread_id: &ThreadId) -> Result<Arc<LiveSession>, Error> {
        self.live
            .read()
            .await
            .get(thread_id.as_str())
            .cloned()
            .ok_or_else(|| SessionError::NotFound(thread_id.to_string()).into())
    }

    /// Run one turn for `text`. Events stream to `sink`; the follow-up menu
    /// and `done` are sent after the answer.
    ///
    /// The user message stays in history even if the turn fails.
    pub async fn send_message(
        &self,
        thread_id: &ThreadId,
        text: &str,
        sink: &EventSink,
    ) -> Result<TurnOutcome, Error> {
        let live = self.live(thread_id).await?;
        let _turn = live.turn.lock().await;
        if live.ended.load(Ordering::SeqCst) {
            return Err(SessionError::NotFound(thread_id.to_string()).into());
        }

        let cancel = CancellationToken::new();
        *live.cancel.lock().await = cancel.clone();

        let mut state = self.session(thread_id).await?;
        state.push(Message::user(text));
        self.store.save(state.clone()).await?;

        self.event_bus.publish(DomainEvent::MessageReceived {
            thread_id: thread_id.to_string(),
            content_preview: text.chars().take(PREVIEW_CHARS).collect(),
            timestamp: Utc::now(),
        });

        let result = {
            let _permit = self.limiter.acquire().await?;
            debug!(thread_id = %thread_id, in_flight = self.limiter.in_flight(), "Turn slot acquired");
            self.graph.invoke(thread_id, &state.messages, sink, &cancel).await
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(thread_id = %thread_id, error = %e, "Turn failed");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: format!("session {thread_id}"),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                let _ = sink
                    .send(AgentStreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                return Err(e);
            }
        };

        if !outcome.messages.extends(&state.messages) {
            return Err(SessionError::HistoryRewritten(thread_id.to_string()).into());
        }
        state.messages = outcome.messages.clone();
        state.updated_at = Utc::now();
        self.store.save(state).await?;

        info!(
            thread_id = %thread_id,
            steps = outcome.steps,
            tool_calls = outcome.tool_calls_made,
            cancelled = outcome.cancelled,
            "Turn complete"
        );

        let _ = sink.send(self.starters.follow_up()).await;
        let _ = sink
            .send(AgentStreamEvent::Done {
                thread_id: thread_id.to_string(),
                usage: outcome.usage,
                steps: outcome.steps,
                tool_calls_made: outcome.tool_calls_made,
            })
            .await;

        Ok(outcome)
    }

    /// Selecting a starter is the same as typing its message.
    pub async fn select_action(
        &self,
        thread_id: &ThreadId,
        name: &str,
        sink: &EventSink,
    ) -> Result<TurnOutcome, Error> {
        let message = self.starters.resolve(name)?.to_string();
        debug!(thread_id = %thread_id, action = %name, "Starter selected");
        self.send_message(thread_id, &message, sink).await
    }

    /// Stop the session's in-flight answer, if any.
    pub async fn stop(&self, thread_id: &ThreadId) -> Result<(), Error> {
        let live = self.live(thread_id).await?;
        info!(thread_id = %thread_id, "The user wants to stop the task");
        live.cancel.lock().await.cancel();
        Ok(())
    }

    /// Drop the session: cancel anything running and forget its history.
    ///
    /// Waits for an in-flight turn to wind down so it cannot save the
    /// session back after removal. Queued turns fail with `NotFound`.
    pub async fn end_session(&self, thread_id: &ThreadId) -> Result<SessionState, Error> {
        let live = self
            .live
            .write()
            .await
            .remove(thread_id.as_str())
            .ok_or_else(|| SessionError::NotFound(thread_id.to_string()))?;
        live.ended.store(true, Ordering::SeqCst);
        live.cancel.lock().await.cancel();
        let _turn = live.turn.lock().await;

        let state = self
            .store
            .remove(thread_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(thread_id.to_string()))?;

        info!(thread_id = %thread_id, messages = state.messages.len(), "The user disconnected");
        self.event_bus.publish(DomainEvent::SessionEnded {
            thread_id: thread_id.to_string(),
            messages: state.messages.len(),
            timestamp: Utc::now(),
        });
        Ok(state)
    }
}
