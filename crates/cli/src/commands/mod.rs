pub mod chat;
pub mod init;
pub mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use hsxassist_config::AppConfig;
use hsxassist_core::event::EventBus;
use hsxassist_session::SessionManager;

/// Load config, apply command-line overrides, and fail early without a key.
pub fn load_config(knowledge_file: Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(path) = knowledge_file {
        config.graph.snapshot = Some(path);
    }

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in .env):");
        eprintln!("    OPENAI_API_KEY    = 'sk-...'");
        eprintln!("    HSXASSIST_API_KEY = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    Ok(config)
}

pub fn build_manager(config: &AppConfig) -> Result<Arc<SessionManager>, Box<dyn std::error::Error>> {
    let provider = hsxassist_providers::from_config(config)?;
    let event_bus = Arc::new(EventBus::default());
    Ok(Arc::new(SessionManager::from_config(config, provider, event_bus)?))
}
