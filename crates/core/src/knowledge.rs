//! Knowledge graph abstraction over the hierarchical document store.
//!
//! The store holds `Source → Main → Section → SubSection` chains, each
//! content node carrying a precomputed embedding. This crate only sees it
//! through two queries: a joint similarity ranking across the three content
//! kinds, and reconstruction of the page around a matched node.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;

/// Text returned to the model when nothing in the store can be ranked.
pub const NO_RELEVANT_CONTENT: &str = "No relevant content found.";

/// The three content node kinds that carry embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Main,
    Section,
    SubSection,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "Main",
            Self::Section => "Section",
            Self::SubSection => "SubSection",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Main" => Some(Self::Main),
            "Section" => Some(Self::Section),
            "SubSection" => Some(Self::SubSection),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the joint similarity ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedNode {
    pub kind: NodeKind,
    pub element_id: String,
    pub score: f32,
}

/// A subsection under a section of a reconstructed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsectionEntry {
    pub title: Option<String>,
    pub text: Option<String>,
}

/// A section of a reconstructed page, with all of its subsections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub section_title: Option<String>,
    pub section_text: Option<String>,
    #[serde(default)]
    pub subsections: Vec<SubsectionEntry>,
}

/// The full ancestor chain around a matched node: provenance URL, the owning
/// Main node and every Section/SubSection beneath that Main.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub source_url: Option<String>,
    pub main_title: Option<String>,
    pub main_text: Option<String>,
    #[serde(default)]
    pub sections: Vec<SectionEntry>,
}

/// Result of one `similarity_search` call.
///
/// Serializes either as `{"message": "No relevant content found."}` or as a
/// plain list of pages, which is what the model sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrievalOutcome {
    Empty { message: String },
    Pages(Vec<Page>),
}

impl RetrievalOutcome {
    /// The sentinel for a store with no rankable nodes.
    pub fn empty() -> Self {
        Self::Empty {
            message: NO_RELEVANT_CONTENT.to_string(),
        }
    }

    pub fn is_empty_sentinel(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    pub fn pages(&self) -> &[Page] {
        match self {
            Self::Empty { .. } => &[],
            Self::Pages(pages) => pages,
        }
    }
}

/// The hosted graph database, seen through the two query shapes we use.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    /// Backend name for logging (e.g., "neo4j", "in_memory").
    fn name(&self) -> &str;

    /// Rank Main, Section and SubSection nodes jointly by descending cosine
    /// similarity to `embedding`, truncated to `top_k` rows.
    async fn rank(&self, embedding: &[f32], top_k: usize) -> Result<Vec<MatchedNode>, KnowledgeError>;

    /// Rebuild the page that owns `node`. `None` when the chain is broken.
    async fn expand(&self, node: &MatchedNode) -> Result<Option<Page>, KnowledgeError>;
}
