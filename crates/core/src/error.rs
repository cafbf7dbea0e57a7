//! Error types for the hsxassist domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all hsxassist operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Knowledge graph errors ---
    #[error("Knowledge graph error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool not configured: {0}")]
    NotConfigured(String),

    #[error("Upstream provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Knowledge graph failed: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Web search failed: {0}")]
    Search(String),
}

#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("Graph request failed: {0}")]
    Network(String),

    #[error("Graph query rejected: {code}: {message}")]
    Query { code: String, message: String },

    #[error("Graph API error: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Unexpected graph row shape: {0}")]
    Decode(String),

    #[error("Worker pool unavailable: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    NotFound(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Session store failed: {0}")]
    Store(String),

    #[error("History of session {0} was rewritten")]
    HistoryRewritten(String),
}

impl ToolError {
    /// Whether this error came from an upstream API rather than the tool call itself.
    ///
    /// Upstream failures abort the turn; everything else is reported back to the model.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Knowledge(_) | Self::Search(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn knowledge_error_wraps_into_tool_error() {
        let err: ToolError = KnowledgeError::Query {
            code: "Neo.ClientError.Statement.SyntaxError".into(),
            message: "bad cypher".into(),
        }
        .into();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("SyntaxError"));
    }

    #[test]
    fn argument_errors_are_not_upstream() {
        let err = ToolError::InvalidArguments("missing field `query`".into());
        assert!(!err.is_upstream());
    }
}
