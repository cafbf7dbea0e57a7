//! Scripted provider and fixtures shared by the graph tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hsxassist_core::error::ProviderError;
use hsxassist_core::event::EventBus;
use hsxassist_core::message::{Message, MessageToolCall};
use hsxassist_core::provider::{
    ChunkReceiver, EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest,
    ProviderResponse, StreamChunk, Usage,
};
use hsxassist_core::runtime::BlockingPool;
use hsxassist_tools::{InMemoryGraph, KnowledgeRetriever, Toolbox};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use crate::graph::{AgentGraph, GraphSettings};

/// Replays decision responses in order and one delta script per stream call.
///
/// With `gated()`, each delta waits for a `release_one()` before it is sent.
pub(crate) struct ScriptedProvider {
    decisions: Mutex<VecDeque<ProviderResponse>>,
    streams: Mutex<VecDeque<Vec<String>>>,
    decision_log: Mutex<Vec<ProviderRequest>>,
    stream_log: Mutex<Vec<ProviderRequest>>,
    gate: Option<Arc<Semaphore>>,
    fail_stream: bool,
    stop_during_decision: Option<CancellationToken>,
}

impl ScriptedProvider {
    pub(crate) fn new(decisions: Vec<ProviderResponse>, streams: Vec<Vec<&str>>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            streams: Mutex::new(
                streams
                    .into_iter()
                    .map(|s| s.into_iter().map(String::from).collect())
                    .collect(),
            ),
            decision_log: Mutex::new(Vec::new()),
            stream_log: Mutex::new(Vec::new()),
            gate: None,
            fail_stream: false,
            stop_during_decision: None,
        }
    }

    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Send the scripted deltas, then an error instead of the final chunk.
    pub(crate) fn failing_stream(mut self) -> Self {
        self.fail_stream = true;
        self
    }

    /// Cancel `token` while the first decision call is in flight.
    pub(crate) fn stopping(mut self, token: CancellationToken) -> Self {
        self.stop_during_decision = Some(token);
        self
    }

    pub(crate) fn release_one(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub(crate) fn decision_requests(&self) -> Vec<ProviderRequest> {
        self.decision_log.lock().unwrap().clone()
    }

    pub(crate) fn stream_requests(&self) -> Vec<ProviderRequest> {
        self.stream_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.decision_log.lock().unwrap().push(request);
        if let Some(token) = &self.stop_during_decision {
            token.cancel();
        }
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Network("script exhausted".into()))
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.stream_log.lock().unwrap().push(request);
        let deltas = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Network("script exhausted".into()))?;
        let gate = self.gate.clone();
        let fail = self.fail_stream;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for delta in deltas {
                if let Some(gate) = &gate {
                    match gate.acquire().await {
                        Ok(permit) => permit.forget(),
                        Err(_) => return,
                    }
                }
                let chunk = StreamChunk {
                    content: Some(delta),
                    tool_calls: vec![],
                    done: false,
                    usage: None,
                };
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
            let last = if fail {
                Err(ProviderError::StreamInterrupted("connection reset".into()))
            } else {
                Ok(StreamChunk {
                    content: None,
                    tool_calls: vec![],
                    done: true,
                    usage: Some(Usage {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                        total_tokens: 15,
                    }),
                })
            };
            let _ = tx.send(last).await;
        });
        Ok(rx)
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|_| vec![1.0, 0.0, 0.0]).collect(),
            model: request.model,
            usage: None,
        })
    }
}

pub(crate) fn response_of(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 20,
            completion_tokens: 3,
            total_tokens: 23,
        }),
        model: "gpt-4o-mini".into(),
    }
}

pub(crate) fn text_decision(content: &str) -> ProviderResponse {
    response_of(Message::assistant(content))
}

pub(crate) fn call(id: &str, name: &str, query: &str) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: serde_json::json!({ "query": query }).to_string(),
    }
}

pub(crate) fn tool_call_message(calls: Vec<MessageToolCall>) -> Message {
    let mut message = Message::assistant("");
    message.tool_calls = calls;
    message
}

pub(crate) fn tool_call_message_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    response_of(tool_call_message(calls))
}

/// Empty knowledge graph, no web search.
pub(crate) fn empty_toolbox() -> Arc<Toolbox> {
    let retriever = KnowledgeRetriever::new(
        Arc::new(ScriptedProvider::new(vec![], vec![])),
        Arc::new(InMemoryGraph::empty(BlockingPool::new(1))),
        "text-embedding-3-small",
        2,
    );
    Arc::new(Toolbox::new(retriever, None, 2))
}

pub(crate) fn graph_with(provider: Arc<ScriptedProvider>, settings: GraphSettings) -> AgentGraph {
    AgentGraph::new(provider, empty_toolbox(), settings, Arc::new(EventBus::new(64)))
}
