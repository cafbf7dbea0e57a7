//! LLM provider implementations for hsxassist.
//!
//! All providers implement the `hsxassist_core::Provider` trait.
//! `from_config` builds the one the process talks to.

pub mod openai_compat;

use std::sync::Arc;

use hsxassist_config::AppConfig;
use hsxassist_core::Provider;
use hsxassist_core::error::ProviderError;

pub use openai_compat::OpenAiCompatProvider;

/// Build the chat/embedding provider described by `[llm]`.
///
/// Fails when no API key is configured; both the decision graph and the
/// knowledge retriever need the hosted model.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.llm.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no LLM API key: set HSXASSIST_API_KEY or OPENAI_API_KEY, or llm.api_key in config.toml"
                .into(),
        )
    })?;

    let provider = OpenAiCompatProvider::new("openai", &config.llm.api_url, api_key)?;
    tracing::debug!(url = %config.llm.api_url, model = %config.llm.model, "LLM provider ready");
    Ok(Arc::new(provider))
}
