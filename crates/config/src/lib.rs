//! Configuration loading, validation, and management for hsxassist.
//!
//! Loads configuration from `~/.hsxassist/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.hsxassist/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat completion and embedding model settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Web search (Tavily) settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Knowledge graph settings
    #[serde(default)]
    pub graph: GraphConfig,

    /// Concurrency and decision-graph bounds
    #[serde(default)]
    pub session: SessionConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Starter prompts offered at session start and after every answer
    #[serde(default = "default_starters")]
    pub starters: Vec<StarterConfig>,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_llm_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat model used by both the decision and finalizer calls
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_llm_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_llm_url(),
            api_key: None,
            model: default_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_search_url() -> String {
    "https://api.tavily.com".into()
}
fn default_max_results() -> usize {
    2
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_url: default_search_url(),
            api_key: None,
            max_results: default_max_results(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("max_results", &self.max_results)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// `neo4j+s://host`, `neo4j://host:7474`, `bolt://...` or a plain http(s) URL.
    /// Unset means the in-memory graph is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_database")]
    pub database: String,

    /// How many nodes the joint ranking keeps
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// JSON snapshot loaded into the in-memory graph when no `uri` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
}

fn default_database() -> String {
    "neo4j".into()
}
fn default_top_k() -> usize {
    2
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: None,
            username: None,
            password: None,
            database: default_database(),
            top_k: default_top_k(),
            snapshot: None,
        }
    }
}

impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("database", &self.database)
            .field("top_k", &self.top_k)
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions allowed to run their decision graph at the same time
    #[serde(default = "default_four")]
    pub max_concurrent_turns: usize,

    /// Threads available for CPU-bound ranking work
    #[serde(default = "default_four")]
    pub worker_threads: usize,

    /// Decision steps per user turn before the graph is forced to answer
    #[serde(default = "default_max_graph_steps")]
    pub max_graph_steps: usize,

    /// Executions allowed per tool per user turn
    #[serde(default = "default_tool_call_ceiling")]
    pub tool_call_ceiling: usize,
}

fn default_four() -> usize {
    4
}
fn default_max_graph_steps() -> usize {
    8
}
fn default_tool_call_ceiling() -> usize {
    1
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_turns: default_four(),
            worker_threads: default_four(),
            max_graph_steps: default_max_graph_steps(),
            tool_call_ceiling: default_tool_call_ceiling(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// A canned prompt the user can pick instead of typing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarterConfig {
    /// Button text
    pub label: String,
    /// Text sent as the user message when selected
    pub message: String,
}

impl StarterConfig {
    fn new(label: &str, message: &str) -> Self {
        Self {
            label: label.into(),
            message: message.into(),
        }
    }
}

fn default_starters() -> Vec<StarterConfig> {
    vec![
        StarterConfig::new(
            "🛠️ HSxTech Services",
            "What Are The Services HSxTech Providing?",
        ),
        StarterConfig::new("☸️ What is Odoo?", "What is Odoo?"),
        StarterConfig::new(
            "🌐 What Language Odoo is Based on?",
            "What Language Odoo is Based on?",
        ),
        StarterConfig::new(
            "📊 What is WHT in Odoo?",
            "What is WHT(Witholding Tax Configuration) in Odoo?",
        ),
        StarterConfig::new("♾️ Odoo is Like SAP?", "Odoo is Like SAP?"),
    ]
}

impl AppConfig {
    /// Load configuration from the default path (~/.hsxassist/config.toml),
    /// then apply environment overrides.
    ///
    /// Recognised variables:
    /// - `HSXASSIST_API_KEY`, then `OPENAI_API_KEY`
    /// - `HSXASSIST_MODEL`
    /// - `TAVILY_API_KEY`
    /// - `NEO4J_URI`, `NEO4J_USERNAME`, `NEO4J_PASSWORD`, `NEO4J_DATABASE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the environment. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("HSXASSIST_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("HSXASSIST_MODEL") {
            self.llm.model = model;
        }
        if let Some(key) = lookup("TAVILY_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(uri) = lookup("NEO4J_URI") {
            self.graph.uri = Some(uri);
        }
        if let Some(user) = lookup("NEO4J_USERNAME") {
            self.graph.username = Some(user);
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            self.graph.password = Some(password);
        }
        if let Some(db) = lookup("NEO4J_DATABASE") {
            self.graph.database = db;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".hsxassist")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let bounds = [
            ("session.max_concurrent_turns", self.session.max_concurrent_turns),
            ("session.worker_threads", self.session.worker_threads),
            ("session.max_graph_steps", self.session.max_graph_steps),
            ("graph.top_k", self.graph.top_k),
            ("search.max_results", self.search.max_results),
        ];
        if let Some((name, _)) = bounds.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
        }

        if self.starters.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[starters]] entry is required".into(),
            ));
        }

        Ok(())
    }

    /// Check if an LLM API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.llm.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            graph: GraphConfig::default(),
            session: SessionConfig::default(),
            gateway: GatewayConfig::default(),
            starters: default_starters(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
