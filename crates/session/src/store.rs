//! Session persistence, keyed by thread id.
//!
//! Sessions live as long as the host keeps them open; the in-memory store
//! is the only backend shipped.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hsxassist_core::error::SessionError;
use hsxassist_core::message::ThreadId;
use hsxassist_core::state::SessionState;
use tokio::sync::RwLock;

/// Checkpoint store for session state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self, thread_id: &ThreadId) -> Result<Option<SessionState>, SessionError>;

    /// Insert or replace the state for its thread id.
    async fn save(&self, state: SessionState) -> Result<(), SessionError>;

    async fn remove(&self, thread_id: &ThreadId) -> Result<Option<SessionState>, SessionError>;

    async fn count(&self) -> Result<usize, SessionError>;
}

/// Keeps every session in a map for the lifetime of the process.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionState>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, thread_id: &ThreadId) -> Result<Option<SessionState>, SessionError> {
        Ok(self.sessions.read().await.get(thread_id.as_str()).cloned())
    }

    async fn save(&self, state: SessionState) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .insert(state.thread_id.to_string(), state);
        Ok(())
    }

    async fn remove(&self, thread_id: &ThreadId) -> Result<Option<SessionState>, SessionError> {
        Ok(self.sessions.write().await.remove(thread_id.as_str()))
    }

    async fn count(&self) -> Result<usize, SessionError> {
        Ok(self.sessions.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsxassist_core::message::Message;

    #[tokio::test]
    async fn save_load_remove() {
        let store = InMemorySessionStore::new();
        let mut state = SessionState::new();
        let id = state.thread_id.clone();
        state.push(Message::user("What is Odoo?"));

        store.save(state).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);

        let removed = store.remove(&id).await.unwrap();
        assert!(removed.is_some());
        assert!(store.load(&id).await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn save_replaces_previous_state() {
        let store = InMemorySessionStore::new();
        let mut state = SessionState::new();
        let id = state.thread_id.clone();
        store.save(state.clone()).await.unwrap();

        state.push(Message::user("hi"));
        state.push(Message::assistant("hello"));
        store.save(state).await.unwrap();

        assert_eq!(store.load(&id).await.unwrap().unwrap().messages.len(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_thread_is_none() {
        let store = InMemorySessionStore::new();
        assert!(store.load(&ThreadId::from("nope")).await.unwrap().is_none());
        assert!(store.remove(&ThreadId::from("nope")).await.unwrap().is_none());
    }
}
