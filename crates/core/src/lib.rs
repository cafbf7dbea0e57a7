//! # hsxassist core
//!
//! Domain types, traits, and error definitions for the hsxassist chat agent.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! Every external collaborator (LLM, graph database, web search) is a trait
//! here. Implementations live in their own crates, so tests can swap in
//! scripted stand-ins.

pub mod error;
pub mod event;
pub mod knowledge;
pub mod message;
pub mod provider;
pub mod runtime;
pub mod search;
pub mod state;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use knowledge::{KnowledgeGraph, MatchedNode, NodeKind, Page, RetrievalOutcome};
pub use message::{Message, MessageToolCall, Role, ThreadId, Transcript};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use runtime::{BlockingPool, TurnLimiter, TurnPermit};
pub use search::{SearchHit, WebSearch};
pub use state::SessionState;
pub use tool::{ToolInvocation, ToolName, ToolOutput};
