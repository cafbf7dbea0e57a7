//! `hsxassist serve`: start the HTTP chat gateway.

use std::path::PathBuf;

pub async fn run(
    port_override: Option<u16>,
    knowledge_file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(knowledge_file)?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let manager = super::build_manager(&config)?;

    println!("hsxassist gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.llm.model);
    println!("   Turns:     {} at a time", manager.limiter().capacity());

    hsxassist_gateway::start(manager, &config.gateway.host, config.gateway.port).await?;
    Ok(())
}
