//! Per-session conversational state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, ThreadId, Transcript};

/// One user's conversation: correlation token plus append-only history.
///
/// Created empty at session start, extended after every turn, dropped when
/// the host session ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub thread_id: ThreadId,
    pub messages: Transcript,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    /// A fresh session with a newly generated thread id.
    pub fn new() -> Self {
        Self::with_thread(ThreadId::new())
    }

    pub fn with_thread(thread_id: ThreadId) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            messages: Transcript::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
