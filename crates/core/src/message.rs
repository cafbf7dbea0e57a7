//! Message and transcript domain types.
//!
//! These are the value objects that flow through the whole turn:
//! user types a message → session appends it → decision graph extends the
//! transcript → finalized answer is appended and persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque correlation token for one chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human at the chat UI
    User,
    /// The model (decision output or final answer)
    Assistant,
    /// Instructions (decision policy, finalizer persona)
    System,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Whether this is an assistant message that requests at least one tool.
    pub fn requests_tools(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}

/// Append-only, ordered message history.
///
/// Messages can be appended but never removed, replaced or reordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.0.extend(messages);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.0.last()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }

    /// The most recent assistant message, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.0.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Messages appended after the first `len` entries.
    pub fn since(&self, len: usize) -> &[Message] {
        &self.0[len.min(self.0.len())..]
    }

    /// Whether `self` starts with every message of `earlier`, in order.
    pub fn extends(&self, earlier: &Transcript) -> bool {
        self.0.len() >= earlier.0.len() && self.0[..earlier.0.len()] == earlier.0[..]
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("What is Odoo?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "What is Odoo?");
        assert!(msg.tool_calls.is_empty());
        assert!(!msg.requests_tools());
    }

    #[test]
    fn tool_result_carries_call_id() {
        let msg = Message::tool_result("call_1", "[]");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn transcript_is_append_only() {
        let mut t = Transcript::new();
        t.push(Message::user("one"));
        let snapshot = t.clone();
        t.push(Message::assistant("two"));
        t.extend(vec![Message::user("three")]);

        assert_eq!(t.len(), 3);
        assert!(t.extends(&snapshot));
        assert!(!snapshot.extends(&t));
        assert_eq!(t.since(1).len(), 2);
        assert_eq!(t.since(10).len(), 0);
    }

    #[test]
    fn last_assistant_skips_tool_results() {
        let mut t = Transcript::new();
        t.push(Message::user("q"));
        let mut ai = Message::assistant("");
        ai.tool_calls.push(MessageToolCall {
            id: "c1".into(),
            name: "similarity_search".into(),
            arguments: r#"{"query":"odoo"}"#.into(),
        });
        t.push(ai);
        t.push(Message::tool_result("c1", "[]"));

        assert!(t.last_assistant().unwrap().requests_tools());
        assert_eq!(t.last().unwrap().role, Role::Tool);
    }

    #[test]
    fn transcript_serializes_as_plain_list() {
        let mut t = Transcript::new();
        t.push(Message::user("hi"));
        let json = serde_json::to_value(&t).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["role"], "user");
    }

    #[test]
    fn thread_ids_are_unique() {
        assert_ne!(ThreadId::new(), ThreadId::new());
        assert_eq!(ThreadId::from("abc").as_str(), "abc");
    }
}
