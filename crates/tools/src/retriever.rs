//! `similarity_search`: embed the question, rank graph nodes, rebuild pages.

use std::sync::Arc;

use hsxassist_core::Provider;
use hsxassist_core::error::{ProviderError, ToolError};
use hsxassist_core::knowledge::{KnowledgeGraph, Page, RetrievalOutcome};
use hsxassist_core::provider::EmbeddingRequest;
use tracing::{debug, info};

/// Looks up knowledge graph pages for a free-text question.
pub struct KnowledgeRetriever {
    provider: Arc<dyn Provider>,
    graph: Arc<dyn KnowledgeGraph>,
    embedding_model: String,
    top_k: usize,
}

impl KnowledgeRetriever {
    pub fn new(
        provider: Arc<dyn Provider>,
        graph: Arc<dyn KnowledgeGraph>,
        embedding_model: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            provider,
            graph,
            embedding_model: embedding_model.into(),
            top_k: top_k.max(1),
        }
    }

    pub fn graph_name(&self) -> &str {
        self.graph.name()
    }

    /// Returns the empty sentinel when the graph ranks nothing, otherwise one
    /// page per matched node whose ancestor chain could be rebuilt (possibly
    /// none). Embedding and graph failures propagate.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalOutcome, ToolError> {
        info!(graph = %self.graph.name(), query = %query, "Similarity search");

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs: vec![query.to_string()],
            })
            .await?;

        let embedding = response.embeddings.into_iter().next().ok_or_else(|| {
            ToolError::Provider(ProviderError::ApiError {
                status_code: 200,
                message: "embedding response carried no vectors".into(),
            })
        })?;

        let mut matched = self.graph.rank(&embedding, self.top_k).await?;
        matched.truncate(self.top_k);

        if matched.is_empty() {
            debug!("No knowledge nodes ranked");
            return Ok(RetrievalOutcome::empty());
        }

        let mut pages: Vec<Page> = Vec::with_capacity(matched.len());
        for node in &matched {
            match self.graph.expand(node).await? {
                Some(page) => pages.push(page),
                None => debug!(kind = %node.kind, element_id = %node.element_id, "Ancestor chain not found"),
            }
        }

        debug!(matched = matched.len(), pages = pages.len(), "Similarity search done");
        Ok(RetrievalOutcome::Pages(pages))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::memory_graph::InMemoryGraph;
    use crate::memory_graph::tests::odoo_snapshot;
    use async_trait::async_trait;
    use hsxassist_core::BlockingPool;
    use hsxassist_core::error::KnowledgeError;
    use hsxassist_core::knowledge::{MatchedNode, NodeKind};
    use hsxassist_core::provider::{EmbeddingResponse, ProviderRequest, ProviderResponse};

    /// Embeds every input to the same fixed vector.
    pub(crate) struct FixedEmbedder(pub Vec<f32>);

    #[async_trait]
    impl Provider for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed-embedder"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("embedding only".into()))
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: request.inputs.iter().map(|_| self.0.clone()).collect(),
                model: request.model,
                usage: None,
            })
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Provider for FailingEmbedder {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }

        async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Err(ProviderError::AuthenticationFailed("bad key".into()))
        }
    }

    /// Ranks a fixed list and can never rebuild a page.
    struct BrokenChains;

    #[async_trait]
    impl KnowledgeGraph for BrokenChains {
        fn name(&self) -> &str {
            "broken"
        }

        async fn rank(&self, _embedding: &[f32], top_k: usize) -> Result<Vec<MatchedNode>, KnowledgeError> {
            Ok((0..5)
                .map(|i| MatchedNode {
                    kind: NodeKind::Section,
                    element_id: format!("orphan-{i}"),
                    score: 0.5,
                })
                .take(top_k)
                .collect())
        }

        async fn expand(&self, _node: &MatchedNode) -> Result<Option<Page>, KnowledgeError> {
            Ok(None)
        }
    }

    fn retriever(graph: Arc<dyn KnowledgeGraph>, query_vec: Vec<f32>) -> KnowledgeRetriever {
        KnowledgeRetriever::new(Arc::new(FixedEmbedder(query_vec)), graph, "text-embedding-3-small", 2)
    }

    #[tokio::test]
    async fn empty_graph_yields_sentinel() {
        let graph = Arc::new(InMemoryGraph::empty(BlockingPool::new(1)));
        let outcome = retriever(graph, vec![1.0, 0.0, 0.0]).retrieve("What is Odoo?").await.unwrap();
        assert!(outcome.is_empty_sentinel());
        assert_eq!(
            serde_json::to_string(&outcome).unwrap(),
            r#"{"message":"No relevant content found."}"#
        );
    }

    #[tokio::test]
    async fn subsection_match_returns_owning_page() {
        let graph = Arc::new(InMemoryGraph::new(odoo_snapshot(), BlockingPool::new(2)));
        let outcome = retriever(graph, vec![1.0, 0.0, 0.0])
            .retrieve("How do I configure withholding tax?")
            .await
            .unwrap();

        let pages = outcome.pages();
        assert!(!pages.is_empty() && pages.len() <= 2);
        let page = &pages[0];
        assert!(page.source_url.as_deref().unwrap().contains("taxes.html"));
        assert_eq!(page.main_title.as_deref(), Some("Taxes"));
        assert_eq!(page.sections.len(), 2);
        assert_eq!(
            page.sections[0].subsections[0].title.as_deref(),
            Some("WHT configuration")
        );
    }

    #[tokio::test]
    async fn never_more_than_two_pages() {
        let graph = Arc::new(InMemoryGraph::new(odoo_snapshot(), BlockingPool::new(2)));
        let outcome = retriever(graph, vec![0.3, 0.6, 0.3]).retrieve("odoo").await.unwrap();
        assert!(outcome.pages().len() <= 2);
    }

    #[tokio::test]
    async fn unbuildable_chains_give_empty_list_not_sentinel() {
        let outcome = retriever(Arc::new(BrokenChains), vec![1.0]).retrieve("odoo").await.unwrap();
        assert!(!outcome.is_empty_sentinel());
        assert!(outcome.pages().is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_is_upstream() {
        let graph = Arc::new(InMemoryGraph::empty(BlockingPool::new(1)));
        let retriever = KnowledgeRetriever::new(Arc::new(FailingEmbedder), graph, "text-embedding-3-small", 2);
        let err = retriever.retrieve("odoo").await.unwrap_err();
        assert!(err.is_upstream());
    }
}
