//! The per-turn decision graph for hsxassist.
//!
//! Each user turn runs **decide → dispatch tools → decide … → finalize**:
//!
//! 1. **Decide**: the model sees the history plus the tool policy and either
//!    requests `similarity_search` / `google_search` or answers directly
//! 2. **Dispatch**: every requested call runs and its result is appended
//! 3. **Finalize**: a second model call streams the user-facing answer,
//!    grounded only in the accumulated context
//!
//! The graph is bounded by `max_graph_steps` decisions and a per-tool ceiling
//! per turn, and stops early on the turn's cancellation token.

pub mod graph;
pub mod prompts;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use graph::{AgentGraph, GraphSettings, Route, Step, TurnOutcome, should_continue};
pub use stream_event::{ActionButton, AgentStreamEvent, EventSink};
