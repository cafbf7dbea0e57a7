//! The per-turn decision graph.
//!
//! ```text
//! Deciding ──tool_call──▶ Dispatching ──▶ Deciding
//!    │
//!    └─no_tool_call─▶ Finalizing ──▶ Done
//! ```
//!
//! Deciding runs the tool-routing completion with [`DECISION_PROMPT`]
//! appended after the history. Dispatching executes every call on the last
//! AI message and appends one tool-result per call, in order. Finalizing
//! streams the user-facing answer; cancellation keeps what was streamed.
//!
//! `max_graph_steps` bounds the Deciding visits per turn. Once spent, the
//! graph finalizes with whatever results it has.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use hsxassist_config::AppConfig;
use hsxassist_core::error::Error;
use hsxassist_core::event::{DomainEvent, EventBus};
use hsxassist_core::message::{Message, MessageToolCall, ThreadId, Transcript};
use hsxassist_core::provider::{Provider, ProviderRequest, Usage};
use hsxassist_core::tool::{ToolInvocation, ToolName};
use hsxassist_tools::Toolbox;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::prompts::{self, DECISION_PROMPT};
use crate::stream_event::{AgentStreamEvent, EventSink};

/// Graph states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Deciding,
    Dispatching,
    Finalizing,
    Done,
}

/// Branch taken after a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ToolCall,
    NoToolCall,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolCall => "tool_call",
            Self::NoToolCall => "no_tool_call",
        }
    }
}

/// `ToolCall` iff the most recent AI message requests at least one tool.
pub fn should_continue(messages: &Transcript) -> Route {
    match messages.last_assistant() {
        Some(m) if m.requests_tools() => Route::ToolCall,
        _ => Route::NoToolCall,
    }
}

/// Model and bounds for one graph.
#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_steps: usize,
    pub tool_call_ceiling: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for GraphSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            max_steps: config.session.max_graph_steps,
            tool_call_ceiling: config.session.tool_call_ceiling,
        }
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Input history plus everything this turn appended
    pub messages: Transcript,
    /// The persisted answer
    pub answer: String,
    pub cancelled: bool,
    /// Decision steps taken
    pub steps: usize,
    /// Tools actually executed
    pub tool_calls_made: usize,
    pub usage: Option<Usage>,
}

/// Per-turn bookkeeping.
#[derive(Default)]
struct TurnLedger {
    steps: usize,
    executed: HashMap<ToolName, usize>,
    usage: Option<Usage>,
}

impl TurnLedger {
    fn add_usage(&mut self, usage: Option<Usage>) {
        let Some(u) = usage else { return };
        let total = self.usage.get_or_insert(Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
        });
        total.prompt_tokens += u.prompt_tokens;
        total.completion_tokens += u.completion_tokens;
        total.total_tokens += u.total_tokens;
    }

    fn tool_calls_made(&self) -> usize {
        self.executed.values().sum()
    }
}

/// The decision graph shared by every session.
pub struct AgentGraph {
    provider: Arc<dyn Provider>,
    toolbox: Arc<Toolbox>,
    settings: GraphSettings,
    event_bus: Arc<EventBus>,
}

impl AgentGraph {
    pub fn new(
        provider: Arc<dyn Provider>,
        toolbox: Arc<Toolbox>,
        settings: GraphSettings,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            toolbox,
            settings,
            event_bus,
        }
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Run one turn over `history`, whose last message is the user's.
    ///
    /// Events go to `sink` as they happen; a closed sink is ignored. On
    /// success the returned transcript extends `history`. Upstream failures
    /// (LLM, embeddings, graph, web search) abort the turn.
    pub async fn invoke(
        &self,
        thread_id: &ThreadId,
        history: &Transcript,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, Error> {
        let mut messages = history.clone();
        let mut ledger = TurnLedger::default();
        let mut answer = (String::new(), false);
        let mut step = Step::Deciding;

        info!(thread_id = %thread_id, messages = messages.len(), "Running decision graph");

        while step != Step::Done {
            step = match step {
                Step::Deciding => {
                    if cancel.is_cancelled() {
                        debug!(thread_id = %thread_id, "Stop requested before answer");
                        Step::Finalizing
                    } else if ledger.steps >= self.settings.max_steps {
                        warn!(
                            thread_id = %thread_id,
                            steps = ledger.steps,
                            "Decision step limit reached, forcing final answer"
                        );
                        Step::Finalizing
                    } else {
                        ledger.steps += 1;
                        let decision = self.decide(thread_id, &messages, &mut ledger).await?;
                        messages.push(decision);
                        let route = should_continue(&messages);
                        debug!(thread_id = %thread_id, step = ledger.steps, route = route.as_str(), "Decision");
                        match route {
                            Route::ToolCall if cancel.is_cancelled() => {
                                self.answer_stopped(&mut messages, sink).await;
                                Step::Finalizing
                            }
                            Route::ToolCall => Step::Dispatching,
                            Route::NoToolCall => Step::Finalizing,
                        }
                    }
                }
                Step::Dispatching => {
                    self.dispatch(&mut messages, &mut ledger, sink).await?;
                    Step::Deciding
                }
                Step::Finalizing => {
                    answer = self.finalize(thread_id, &messages, &mut ledger, sink, cancel).await?;
                    messages.push(Message::assistant(answer.0.clone()));
                    Step::Done
                }
                Step::Done => Step::Done,
            };
        }

        let (answer, cancelled) = answer;
        let _ = sink
            .send(AgentStreamEvent::Message {
                content: answer.clone(),
                cancelled,
            })
            .await;

        Ok(TurnOutcome {
            messages,
            answer,
            cancelled,
            steps: ledger.steps,
            tool_calls_made: ledger.tool_calls_made(),
            usage: ledger.usage,
        })
    }

    /// Decision node: tool-routing completion, no streaming.
    async fn decide(
        &self,
        thread_id: &ThreadId,
        messages: &Transcript,
        ledger: &mut TurnLedger,
    ) -> Result<Message, Error> {
        let mut request_messages = messages.as_slice().to_vec();
        request_messages.push(Message::system(DECISION_PROMPT));

        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages: request_messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            tools: self.toolbox.definitions(),
            stream: false,
        };

        let response = self.provider.complete(request).await?;
        ledger.add_usage(response.usage);
        self.event_bus.publish(DomainEvent::ResponseGenerated {
            thread_id: thread_id.to_string(),
            model: response.model.clone(),
            tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
            timestamp: Utc::now(),
        });

        Ok(response.message)
    }

    /// Tool dispatch node: one tool-result per requested call, in order.
    async fn dispatch(
        &self,
        messages: &mut Transcript,
        ledger: &mut TurnLedger,
        sink: &EventSink,
    ) -> Result<(), Error> {
        let calls: Vec<MessageToolCall> = messages
            .last_assistant()
            .map(|m| m.tool_calls.clone())
            .unwrap_or_default();

        for call in &calls {
            let input = serde_json::from_str(&call.arguments)
                .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()));
            let _ = sink
                .send(AgentStreamEvent::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input,
                })
                .await;

            let (output, success) = self.run_call(call, ledger).await?;

            let _ = sink
                .send(AgentStreamEvent::ToolResult {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    output: output.clone(),
                    success,
                })
                .await;
            messages.push(Message::tool_result(call.id.clone(), output));
        }

        Ok(())
    }

    /// Stop arrived while the decision was in flight: nothing runs, but every
    /// requested call still gets its one tool-result.
    async fn answer_stopped(&self, messages: &mut Transcript, sink: &EventSink) {
        let calls: Vec<MessageToolCall> = messages
            .last_assistant()
            .map(|m| m.tool_calls.clone())
            .unwrap_or_default();

        for call in calls {
            debug!(tool = %call.name, id = %call.id, "Skipping tool call after stop");
            let _ = sink
                .send(AgentStreamEvent::ToolResult {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    output: prompts::TOOL_STOPPED.to_string(),
                    success: false,
                })
                .await;
            messages.push(Message::tool_result(call.id, prompts::TOOL_STOPPED));
        }
    }

    /// Execute one call, or explain to the model why it was not executed.
    async fn run_call(
        &self,
        call: &MessageToolCall,
        ledger: &mut TurnLedger,
    ) -> Result<(String, bool), Error> {
        let invocation = match ToolInvocation::from_call(call) {
            Ok(inv) => inv,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Rejected tool call");
                return Ok((format!("Error: {e}"), false));
            }
        };

        let name = invocation.name();
        let used = ledger.executed.entry(name).or_insert(0);
        if *used >= self.settings.tool_call_ceiling {
            warn!(tool = %name, ceiling = self.settings.tool_call_ceiling, "Tool call ceiling reached");
            return Ok((prompts::ceiling_reached(name.as_str()), false));
        }
        *used += 1;

        info!(tool = %name, query = %invocation.query(), "Executing tool");
        let start = Instant::now();
        let result = self.toolbox.execute(&invocation).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: name.to_string(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(output) => Ok((output.render(), true)),
            Err(e) if e.is_upstream() => Err(Error::Tool(e)),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool failed");
                Ok((format!("Error: {e}"), false))
            }
        }
    }

    /// Finalizer node: stream the answer, forwarding each delta as it arrives.
    ///
    /// Returns the streamed text and whether the stop signal cut it short.
    async fn finalize(
        &self,
        thread_id: &ThreadId,
        messages: &Transcript,
        ledger: &mut TurnLedger,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<(String, bool), Error> {
        let mut buffer = String::new();

        if cancel.is_cancelled() {
            self.publish_cancelled(thread_id, &buffer);
            return Ok((buffer, true));
        }

        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages: vec![Message::user(prompts::finalizer_prompt(messages.as_slice()))],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            tools: Vec::new(),
            stream: true,
        };

        let mut rx = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.publish_cancelled(thread_id, &buffer);
                return Ok((buffer, true));
            }
            rx = self.provider.stream(request) => rx?,
        };

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.publish_cancelled(thread_id, &buffer);
                    return Ok((buffer, true));
                }
                next = rx.recv() => {
                    let Some(chunk) = next else { break };
                    let chunk = chunk.map_err(Error::Provider)?;
                    if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                        buffer.push_str(&text);
                        let _ = sink.send(AgentStreamEvent::Chunk { content: text }).await;
                    }
                    ledger.add_usage(chunk.usage);
                    if chunk.done {
                        break;
                    }
                }
            }
        }

        self.event_bus.publish(DomainEvent::ResponseGenerated {
            thread_id: thread_id.to_string(),
            model: self.settings.model.clone(),
            tokens_used: ledger.usage.map(|u| u.total_tokens).unwrap_or(0),
            timestamp: Utc::now(),
        });

        Ok((buffer, false))
    }

    fn publish_cancelled(&self, thread_id: &ThreadId, buffer: &str) {
        info!(thread_id = %thread_id, emitted_chars = buffer.len(), "Answer stream stopped");
        self.event_bus.publish(DomainEvent::StreamCancelled {
            thread_id: thread_id.to_string(),
            emitted_chars: buffer.len(),
            timestamp: Utc::now(),
        });
    }
}

impl From<&Message> for Route {
    fn from(message: &Message) -> Self {
        if message.requests_tools() {
            Route::ToolCall
        } else {
            Route::NoToolCall
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use hsxassist_core::message::Role;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::Receiver<AgentStreamEvent>) -> Vec<AgentStreamEvent> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        events
    }

    fn chunks(events: &[AgentStreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                AgentStreamEvent::Chunk { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    fn history(text: &str) -> Transcript {
        let mut t = Transcript::new();
        t.push(Message::user(text));
        t
    }

    #[test]
    fn branch_follows_last_ai_message() {
        let mut t = history("What is Odoo?");
        assert_eq!(should_continue(&t), Route::NoToolCall);

        t.push(tool_call_message(vec![call("c1", "similarity_search", "What is Odoo?")]));
        assert_eq!(should_continue(&t), Route::ToolCall);
        assert_eq!(Route::from(t.last().unwrap()), Route::ToolCall);

        t.push(Message::tool_result("c1", "[]"));
        // Tool result is not an AI message; the last AI message still asks for tools
        assert_eq!(should_continue(&t), Route::ToolCall);

        t.push(Message::assistant("Odoo is an ERP."));
        assert_eq!(should_continue(&t), Route::NoToolCall);
        assert_eq!(Route::ToolCall.as_str(), "tool_call");
    }

    #[tokio::test]
    async fn direct_answer_skips_tools() {
        let provider = Arc::new(ScriptedProvider::new(
            vec![text_decision("")],
            vec![vec!["Hello", "! Ask me about ", "Odoo."]],
        ));
        let graph = graph_with(provider.clone(), GraphSettings::default());
        let (tx, mut rx) = mpsc::channel(64);

        let outcome = graph
            .invoke(&ThreadId::new(), &history("hi"), &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.tool_calls_made, 0);
        assert_eq!(outcome.answer, "Hello! Ask me about Odoo.");
        assert!(!outcome.cancelled);

        // user, decision AI, streamed AI
        assert_eq!(outcome.messages.len(), 3);
        assert_eq!(outcome.messages.last().unwrap().role, Role::Assistant);
        assert!(outcome.messages.extends(&history("hi")));

        let events = drain(&mut rx);
        assert_eq!(chunks(&events), outcome.answer);
        assert!(matches!(events.last(), Some(AgentStreamEvent::Message { cancelled: false, .. })));
    }

    #[tokio::test]
    async fn decision_prompt_is_appended_after_history() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_decision("")], vec![vec!["ok"]]));
        let graph = graph_with(provider.clone(), GraphSettings::default());
        let (tx, _rx) = mpsc::channel(64);
        graph
            .invoke(&ThreadId::new(), &history("hi"), &tx, &CancellationToken::new())
            .await
            .unwrap();

        let requests = provider.decision_requests();
        let last = requests[0].messages.last().unwrap();
        assert_eq!(last.role, Role::System);
        assert_eq!(last.content, DECISION_PROMPT);
        assert_eq!(requests[0].tools.len(), 2);

        let streamed = provider.stream_requests();
        assert!(streamed[0].tools.is_empty());
        assert!(streamed[0].messages[0].content.contains("Human: hi"));
    }

    #[tokio::test]
    async fn tool_path_appends_results_in_order() {
        let provider = Arc::new(ScriptedProvider::new(
            vec![
                tool_call_message_response(vec![
                    call("c1", "similarity_search", "What is WHT?"),
                    call("c2", "google_search", "Odoo withholding tax"),
                ]),
                text_decision(""),
            ],
            vec![vec!["## WHT\n", "Withholding tax is deducted at source."]],
        ));
        let graph = graph_with(provider, GraphSettings::default());
        let (tx, mut rx) = mpsc::channel(64);

        let outcome = graph
            .invoke(&ThreadId::new(), &history("What is WHT in Odoo?"), &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.tool_calls_made, 2);
        let roles: Vec<Role> = outcome.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Assistant, Role::Assistant]
        );
        assert_eq!(outcome.messages.as_slice()[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(outcome.messages.as_slice()[3].tool_call_id.as_deref(), Some("c2"));
        // Empty in-memory graph
        assert!(outcome.messages.as_slice()[2].content.contains("No relevant content found."));

        let events = drain(&mut rx);
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(&kinds[..4], &["tool_call", "tool_result", "tool_call", "tool_result"]);
    }

    #[tokio::test]
    async fn ceiling_refuses_second_call_of_same_tool() {
        let provider = Arc::new(ScriptedProvider::new(
            vec![
                tool_call_message_response(vec![call("c1", "similarity_search", "odoo")]),
                tool_call_message_response(vec![call("c2", "similarity_search", "odoo again")]),
                text_decision(""),
            ],
            vec![vec!["done"]],
        ));
        let graph = graph_with(provider, GraphSettings::default());
        let (tx, _rx) = mpsc::channel(64);

        let outcome = graph
            .invoke(&ThreadId::new(), &history("What is Odoo?"), &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.tool_calls_made, 1);
        let refused = outcome
            .messages
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("c2"))
            .unwrap();
        assert!(refused.content.contains("already called"));
    }

    #[tokio::test]
    async fn step_limit_forces_final_answer() {
        let decisions = (0..10)
            .map(|i| tool_call_message_response(vec![call(&format!("c{i}"), "similarity_search", "loop")]))
            .collect();
        let provider = Arc::new(ScriptedProvider::new(decisions, vec![vec!["best effort"]]));
        let settings = GraphSettings {
            max_steps: 3,
            ..GraphSettings::default()
        };
        let graph = graph_with(provider.clone(), settings);
        let (tx, _rx) = mpsc::channel(64);

        let outcome = graph
            .invoke(&ThreadId::new(), &history("loop forever"), &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.steps, 3);
        assert_eq!(provider.decision_requests().len(), 3);
        assert_eq!(outcome.answer, "best effort");
        // Every requested call got exactly one result
        let requested: usize = outcome.messages.iter().map(|m| m.tool_calls.len()).sum();
        let results = outcome.messages.iter().filter(|m| m.role == Role::Tool).count();
        assert_eq!(requested, results);
    }

    #[tokio::test]
    async fn malformed_arguments_reported_to_model() {
        let mut bad = Message::assistant("");
        bad.tool_calls = vec![MessageToolCall {
            id: "c1".into(),
            name: "similarity_search".into(),
            arguments: "{\"q\": ".into(),
        }];
        let provider = Arc::new(ScriptedProvider::new(
            vec![response_of(bad), text_decision("")],
            vec![vec!["sorry"]],
        ));
        let graph = graph_with(provider, GraphSettings::default());
        let (tx, _rx) = mpsc::channel(64);

        let outcome = graph
            .invoke(&ThreadId::new(), &history("?"), &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.tool_calls_made, 0);
        assert!(outcome.messages.as_slice()[2].content.starts_with("Error: Invalid tool arguments"));
    }

    #[tokio::test]
    async fn upstream_decision_failure_aborts() {
        let provider = Arc::new(ScriptedProvider::new(vec![], vec![]));
        let graph = graph_with(provider, GraphSettings::default());
        let (tx, _rx) = mpsc::channel(64);
        let err = graph
            .invoke(&ThreadId::new(), &history("hi"), &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn stream_error_aborts() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![text_decision("")], vec![vec!["partial"]]).failing_stream(),
        );
        let graph = graph_with(provider, GraphSettings::default());
        let (tx, _rx) = mpsc::channel(64);
        let err = graph
            .invoke(&ThreadId::new(), &history("hi"), &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn cancellation_keeps_streamed_prefix() {
        let full = vec!["Odoo ", "is ", "an ", "open ", "source ", "ERP."];
        let provider = Arc::new(
            ScriptedProvider::new(vec![text_decision("")], vec![full.clone()]).gated(),
        );
        let graph = Arc::new(graph_with(provider.clone(), GraphSettings::default()));
        let (tx, mut rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();

        let run = {
            let graph = graph.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                graph
                    .invoke(&ThreadId::new(), &history("What is Odoo?"), &tx, &cancel)
                    .await
            })
        };

        // Let two deltas through, then stop
        let mut seen = String::new();
        for _ in 0..2 {
            provider.release_one();
            match rx.recv().await.unwrap() {
                AgentStreamEvent::Chunk { content } => seen.push_str(&content),
                other => panic!("unexpected event {other:?}"),
            }
        }
        cancel.cancel();

        let outcome = run.await.unwrap().unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.answer, seen);
        assert_eq!(outcome.answer, "Odoo is ");
        assert!(full.concat().starts_with(&outcome.answer));
        assert_eq!(outcome.messages.last().unwrap().content, "Odoo is ");

        let rest = drain(&mut rx);
        assert!(matches!(
            rest.last(),
            Some(AgentStreamEvent::Message { cancelled: true, .. })
        ));
    }

    #[tokio::test]
    async fn stop_during_decision_skips_tools() {
        let cancel = CancellationToken::new();
        let provider = Arc::new(
            ScriptedProvider::new(
                vec![tool_call_message_response(vec![
                    call("c1", "similarity_search", "What is Odoo?"),
                    call("c2", "google_search", "Odoo ERP"),
                ])],
                vec![vec!["never streamed"]],
            )
            .stopping(cancel.clone()),
        );
        let graph = graph_with(provider.clone(), GraphSettings::default());
        let (tx, mut rx) = mpsc::channel(64);

        let outcome = graph
            .invoke(&ThreadId::new(), &history("What is Odoo?"), &tx, &cancel)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.tool_calls_made, 0);
        assert!(provider.stream_requests().is_empty());

        let roles: Vec<Role> = outcome.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Assistant]);
        for (m, id) in outcome.messages.as_slice()[2..4].iter().zip(["c1", "c2"]) {
            assert_eq!(m.tool_call_id.as_deref(), Some(id));
            assert_eq!(m.content, prompts::TOOL_STOPPED);
        }
        assert_eq!(outcome.answer, "");

        let kinds: Vec<&str> = drain(&mut rx).iter().map(|e| e.event_type()).collect();
        assert_eq!(kinds, vec!["tool_result", "tool_result", "message"]);
    }

    #[tokio::test]
    async fn cancel_before_answer_persists_empty_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![], vec![]));
        let graph = graph_with(provider.clone(), GraphSettings::default());
        let (tx, _rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = graph
            .invoke(&ThreadId::new(), &history("hi"), &tx, &cancel)
            .await
            .unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.messages.len(), 2);
        assert!(provider.decision_requests().is_empty());
    }

    #[tokio::test]
    async fn events_published_on_bus() {
        let provider = Arc::new(ScriptedProvider::new(
            vec![
                tool_call_message_response(vec![call("c1", "similarity_search", "odoo")]),
                text_decision(""),
            ],
            vec![vec!["ok"]],
        ));
        let bus = Arc::new(EventBus::new(32));
        let mut events = bus.subscribe();
        let graph = AgentGraph::new(provider, empty_toolbox(), GraphSettings::default(), bus);
        let (tx, _rx) = mpsc::channel(64);
        graph
            .invoke(&ThreadId::new(), &history("odoo"), &tx, &CancellationToken::new())
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(e) = events.try_recv() {
            kinds.push(e.kind());
        }
        assert!(kinds.contains(&"tool_executed"));
        assert!(kinds.contains(&"response_generated"));
    }
}
