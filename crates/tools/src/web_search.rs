//! Web search through the Tavily API.
//!
//! `POST {api_url}/search` with a bearer key and `{query, max_results}`;
//! hits come back ranked under `results`.

use async_trait::async_trait;
use hsxassist_core::error::ToolError;
use hsxassist_core::search::{SearchHit, WebSearch};
use serde::Deserialize;
use tracing::{debug, warn};

pub struct TavilySearch {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ToolError::Search(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError> {
        let url = format!("{}/search", self.base_url);
        let body = serde_json::json!({
            "query": query,
            "max_results": max_results,
        });

        debug!(query = %query, max_results, "Sending web search request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::Search(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Web search returned error");
            return Err(ToolError::Search(format!("status {status}: {error_body}")));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Search(format!("failed to parse response: {e}")))?;

        Ok(parsed.into_hits(max_results))
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f32>,
}

impl TavilyResponse {
    fn into_hits(self, max_results: usize) -> Vec<SearchHit> {
        self.results
            .into_iter()
            .take(max_results)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                content: r.content,
                score: r.score,
            })
            .collect()
    }
}
