//! `hsxassist init`: write the default config file.

use hsxassist_config::AppConfig;

pub fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() && !force {
        println!("  Config already exists: {}", config_path.display());
        println!("  Use --force to overwrite it.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Wrote {}", config_path.display());
    println!();
    println!("  Next steps:");
    println!("    1. Set OPENAI_API_KEY (and TAVILY_API_KEY for web search)");
    println!("    2. Set NEO4J_URI / NEO4J_USERNAME / NEO4J_PASSWORD, or pass --knowledge-file");
    println!("    3. hsxassist chat");
    Ok(())
}
