//! The closed set of tools the decision node may call.
//!
//! Tools are tagged variants with typed arguments and typed results. A
//! model-emitted [`MessageToolCall`] is parsed into a [`ToolInvocation`] and
//! dispatched with an explicit `match`; nothing is looked up by reflection.

use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::knowledge::RetrievalOutcome;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;
use crate::search::SearchHit;

/// Name of every tool the model can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    SimilaritySearch,
    GoogleSearch,
}

impl ToolName {
    pub const ALL: [ToolName; 2] = [ToolName::SimilaritySearch, ToolName::GoogleSearch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimilaritySearch => "similarity_search",
            Self::GoogleSearch => "google_search",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::SimilaritySearch => {
                "Retrieve the most relevant content from the HSxTech knowledge graph based on a text query. \
                 Returns relevant pages with hierarchical content (Main -> Section -> SubSection)."
            }
            Self::GoogleSearch => {
                "Search the web. Use only when the knowledge graph does not clearly answer the question."
            }
        }
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let query_doc = match self {
            Self::SimilaritySearch => "A natural language question about HSxTech or Odoo",
            Self::GoogleSearch => "The web search query",
        };
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": query_doc }
            },
            "required": ["query"]
        })
    }

    /// The definition sent to the LLM.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.as_str().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definitions for the full tool set, in a stable order.
pub fn definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.iter().map(ToolName::definition).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilaritySearchArgs {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleSearchArgs {
    pub query: String,
}

/// A parsed, typed tool request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    SimilaritySearch(SimilaritySearchArgs),
    GoogleSearch(GoogleSearchArgs),
}

impl ToolInvocation {
    /// Parse a model-emitted tool call.
    ///
    /// An empty argument string is read as `{}`.
    pub fn from_call(call: &MessageToolCall) -> Result<Self, ToolError> {
        let name = ToolName::parse(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let raw = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments(format!("{name}: {e}"));

        Ok(match name {
            ToolName::SimilaritySearch => Self::SimilaritySearch(serde_json::from_str(raw).map_err(invalid)?),
            ToolName::GoogleSearch => Self::GoogleSearch(serde_json::from_str(raw).map_err(invalid)?),
        })
    }

    pub fn name(&self) -> ToolName {
        match self {
            Self::SimilaritySearch(_) => ToolName::SimilaritySearch,
            Self::GoogleSearch(_) => ToolName::GoogleSearch,
        }
    }

    pub fn query(&self) -> &str {
        match self {
            Self::SimilaritySearch(args) => &args.query,
            Self::GoogleSearch(args) => &args.query,
        }
    }
}

/// Typed result of a tool execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Knowledge(RetrievalOutcome),
    WebSearch(Vec<SearchHit>),
}

impl ToolOutput {
    /// The text placed in the tool-result message.
    pub fn render(&self) -> String {
        let rendered = match self {
            Self::Knowledge(outcome) => serde_json::to_string(outcome),
            Self::WebSearch(hits) => serde_json::to_string(hits),
        };
        rendered.unwrap_or_default()
    }
}
