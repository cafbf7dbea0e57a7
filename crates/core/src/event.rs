//! Domain event system for decoupled observation of sessions and turns.
//!
//! Events are published when something interesting happens in the system.
//! Other components (the gateway's log stream, tests) subscribe without
//! tight coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A chat session was opened
    SessionStarted {
        thread_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A chat session was closed by the host
    SessionEnded {
        thread_id: String,
        messages: usize,
        timestamp: DateTime<Utc>,
    },

    /// A user message entered a session
    MessageReceived {
        thread_id: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The model produced a decision or an answer
    ResponseGenerated {
        thread_id: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// The answer stream was stopped before it finished
    StreamCancelled {
        thread_id: String,
        emitted_chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// A turn failed
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Short snake_case name, used as the SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::SessionEnded { .. } => "session_ended",
            Self::MessageReceived { .. } => "message_received",
            Self::ToolExecuted { .. } => "tool_executed",
            Self::ResponseGenerated { .. } => "response_generated",
            Self::StreamCancelled { .. } => "stream_cancelled",
            Self::ErrorOccurred { .. } => "error",
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        let kind = event.kind();
        // No subscribers is fine
        let receivers = self.sender.send(Arc::new(event)).unwrap_or(0);
        tracing::trace!(kind, receivers, "Domain event published");
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
