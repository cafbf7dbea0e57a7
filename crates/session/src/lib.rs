//! Session controller for hsxassist.
//!
//! Owns per-session history, serialises turns within a session, bounds
//! concurrent graph runs across sessions, and offers the starter menu.

pub mod manager;
pub mod starters;
pub mod store;

pub use manager::SessionManager;
pub use starters::{FOLLOW_UP_PROMPT, StarterMenu};
pub use store::{InMemorySessionStore, SessionStore};
