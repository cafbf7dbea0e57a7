//! Suggested prompts shown at session start and after every answer.

use hsxassist_agent::{ActionButton, AgentStreamEvent};
use hsxassist_config::{AppConfig, StarterConfig};
use hsxassist_core::error::SessionError;

/// Heading above the follow-up buttons.
pub const FOLLOW_UP_PROMPT: &str = "What Else Would You Like To Know?";

const ACTION_PREFIX: &str = "starter_";

#[derive(Debug, Clone)]
pub struct StarterMenu {
    starters: Vec<StarterConfig>,
}

impl StarterMenu {
    pub fn new(starters: Vec<StarterConfig>) -> Self {
        Self { starters }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.starters.clone())
    }

    pub fn starters(&self) -> &[StarterConfig] {
        &self.starters
    }

    /// One button per starter, named `starter_{i}` in menu order.
    pub fn actions(&self) -> Vec<ActionButton> {
        self.starters
            .iter()
            .enumerate()
            .map(|(i, s)| ActionButton {
                name: format!("{ACTION_PREFIX}{i}"),
                label: s.label.clone(),
                payload: serde_json::json!({ "message": s.message }),
            })
            .collect()
    }

    pub fn follow_up(&self) -> AgentStreamEvent {
        AgentStreamEvent::Actions {
            prompt: FOLLOW_UP_PROMPT.to_string(),
            actions: self.actions(),
        }
    }

    /// The message text an action name stands for.
    pub fn resolve(&self, name: &str) -> Result<&str, SessionError> {
        name.strip_prefix(ACTION_PREFIX)
            .and_then(|i| i.parse::<usize>().ok())
            .and_then(|i| self.starters.get(i))
            .map(|s| s.message.as_str())
            .ok_or_else(|| SessionError::UnknownAction(name.to_string()))
    }
}
