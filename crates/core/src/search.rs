//! Web search abstraction for the hosted search provider behind `google_search`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// One ranked web result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// A hosted web search API.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Backend name for logging (e.g., "tavily").
    fn name(&self) -> &str;

    /// Run `query`, returning at most `max_results` hits in rank order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError>;
}
