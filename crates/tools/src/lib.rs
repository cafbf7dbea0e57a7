//! Tool implementations for hsxassist.
//!
//! Two tools are exposed to the model:
//! - `similarity_search`: the HSxTech/Odoo knowledge graph ([`KnowledgeRetriever`])
//! - `google_search`: the web, through Tavily ([`TavilySearch`])
//!
//! [`Toolbox`] owns both and dispatches parsed [`ToolInvocation`]s by `match`.

pub mod memory_graph;
pub mod neo4j;
pub mod retriever;
pub mod web_search;

use std::sync::Arc;

use hsxassist_config::AppConfig;
use hsxassist_core::error::{KnowledgeError, ToolError};
use hsxassist_core::knowledge::KnowledgeGraph;
use hsxassist_core::provider::ToolDefinition;
use hsxassist_core::runtime::BlockingPool;
use hsxassist_core::search::WebSearch;
use hsxassist_core::tool::{self, ToolInvocation, ToolOutput};
use hsxassist_core::{Provider, ToolName};
use tracing::{info, warn};

pub use memory_graph::InMemoryGraph;
pub use neo4j::Neo4jGraph;
pub use retriever::KnowledgeRetriever;
pub use web_search::TavilySearch;

/// The tool set available to the decision node.
pub struct Toolbox {
    retriever: KnowledgeRetriever,
    search: Option<Arc<dyn WebSearch>>,
    max_results: usize,
}

impl Toolbox {
    pub fn new(
        retriever: KnowledgeRetriever,
        search: Option<Arc<dyn WebSearch>>,
        max_results: usize,
    ) -> Self {
        Self {
            retriever,
            search,
            max_results: max_results.max(1),
        }
    }

    /// Definitions bound to every decision call.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        tool::definitions()
    }

    pub async fn execute(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        match invocation {
            ToolInvocation::SimilaritySearch(args) => self
                .retriever
                .retrieve(&args.query)
                .await
                .map(ToolOutput::Knowledge),
            ToolInvocation::GoogleSearch(args) => {
                let search = self.search.as_ref().ok_or_else(|| {
                    ToolError::NotConfigured(format!(
                        "{}: no search API key (set TAVILY_API_KEY)",
                        ToolName::GoogleSearch
                    ))
                })?;
                info!(backend = %search.name(), query = %args.query, "Web search");
                search
                    .search(&args.query, self.max_results)
                    .await
                    .map(ToolOutput::WebSearch)
            }
        }
    }
}

/// Pick the knowledge graph backend from `[graph]`.
///
/// A `uri` selects Neo4j; otherwise a `snapshot` file is loaded into memory;
/// with neither, an empty in-memory graph is used and every lookup returns
/// the no-content sentinel.
pub fn graph_from_config(
    config: &AppConfig,
    pool: BlockingPool,
) -> Result<Arc<dyn KnowledgeGraph>, KnowledgeError> {
    let graph = &config.graph;
    if let Some(uri) = &graph.uri {
        let neo4j = Neo4jGraph::new(uri, &graph.database, graph.username.clone(), graph.password.clone())?;
        info!(endpoint = %neo4j.commit_url(), "Using Neo4j knowledge graph");
        return Ok(Arc::new(neo4j));
    }

    if let Some(path) = &graph.snapshot {
        let memory = InMemoryGraph::load(path, pool)?;
        info!(path = %path.display(), nodes = memory.node_count(), "Using in-memory knowledge graph");
        return Ok(Arc::new(memory));
    }

    warn!("No graph uri or snapshot configured; similarity_search will find nothing");
    Ok(Arc::new(InMemoryGraph::empty(pool)))
}

/// Build the full tool set from configuration.
pub fn toolbox_from_config(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    pool: BlockingPool,
) -> Result<Toolbox, ToolError> {
    let graph = graph_from_config(config, pool)?;
    let retriever = KnowledgeRetriever::new(
        provider,
        graph,
        config.llm.embedding_model.clone(),
        config.graph.top_k,
    );

    let search: Option<Arc<dyn WebSearch>> = match &config.search.api_key {
        Some(key) => Some(Arc::new(TavilySearch::new(&config.search.api_url, key.clone())?)),
        None => {
            warn!("No search API key configured; google_search is disabled");
            None
        }
    };

    Ok(Toolbox::new(retriever, search, config.search.max_results))
}
