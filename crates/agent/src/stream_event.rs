//! Turn-level streaming events.
//!
//! `AgentStreamEvent` wraps provider-level stream chunks and graph progress
//! into the events a chat surface renders (SSE in the gateway, stdout in the
//! CLI).

use hsxassist_core::provider::Usage;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Where a running turn sends its events.
pub type EventSink = mpsc::Sender<AgentStreamEvent>;

/// A follow-up button shown after an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    /// Callback name, `starter_{i}`
    pub name: String,
    pub label: String,
    /// `{"message": ...}`
    pub payload: serde_json::Value,
}

/// Events emitted while a turn runs:
/// - `chunk`       partial answer text
/// - `tool_call`   the graph is invoking a tool
/// - `tool_result` the tool finished (or was refused)
/// - `message`     the answer as persisted
/// - `actions`     follow-up menu
/// - `done`        the turn is complete
/// - `error`       the turn was aborted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    Chunk { content: String },

    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    ToolResult {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    /// The finalized answer. `content` equals the concatenated chunks.
    Message { content: String, cancelled: bool },

    Actions {
        prompt: String,
        actions: Vec<ActionButton>,
    },

    Done {
        thread_id: String,
        usage: Option<Usage>,
        steps: usize,
        tool_calls_made: usize,
    },

    Error { message: String },
}

impl AgentStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Message { .. } => "message",
            Self::Actions { .. } => "actions",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_chunk() {
        let event = AgentStreamEvent::Chunk {
            content: "## Odoo".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r###""content":"## Odoo""###));
    }

    #[test]
    fn event_serialization_message_carries_cancel_flag() {
        let event = AgentStreamEvent::Message {
            content: "partial".into(),
            cancelled: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"message""#));
        assert!(json.contains(r#""cancelled":true"#));
    }

    #[test]
    fn event_serialization_actions() {
        let event = AgentStreamEvent::Actions {
            prompt: "What Else Would You Like To Know?".into(),
            actions: vec![ActionButton {
                name: "starter_1".into(),
                label: "☸️ What is Odoo?".into(),
                payload: serde_json::json!({"message": "What is Odoo?"}),
            }],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "actions");
        assert_eq!(json["actions"][0]["payload"]["message"], "What is Odoo?");
    }

    #[test]
    fn event_type_names() {
        let cases = [
            (AgentStreamEvent::Chunk { content: "x".into() }, "chunk"),
            (
                AgentStreamEvent::ToolResult {
                    id: "a".into(),
                    name: "google_search".into(),
                    output: "[]".into(),
                    success: true,
                },
                "tool_result",
            ),
            (
                AgentStreamEvent::Done {
                    thread_id: "t".into(),
                    usage: None,
                    steps: 1,
                    tool_calls_made: 0,
                },
                "done",
            ),
            (AgentStreamEvent::Error { message: "x".into() }, "error"),
        ];
        for (event, name) in cases {
            assert_eq!(event.event_type(), name);
        }
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"chunk","content":"hi"}"#;
        let event: AgentStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentStreamEvent::Chunk { content } => assert_eq!(content, "hi"),
            _ => panic!("Wrong variant"),
        }
    }
}
