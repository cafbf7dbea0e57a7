//! hsxassist CLI: the main entry point.
//!
//! Commands:
//! - `chat`   Interactive chat, or one question with `--message`
//! - `serve`  Start the HTTP chat gateway
//! - `init`   Write the default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "hsxassist",
    about = "HSxTech / Odoo assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Ask a single question instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Knowledge graph snapshot (JSON) to use instead of a graph database
        #[arg(short, long, env = "HSXASSIST_KNOWLEDGE_FILE")]
        knowledge_file: Option<PathBuf>,
    },

    /// Start the HTTP chat gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Knowledge graph snapshot (JSON) to use instead of a graph database
        #[arg(short, long, env = "HSXASSIST_KNOWLEDGE_FILE")]
        knowledge_file: Option<PathBuf>,
    },

    /// Write the default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // `.env` wins over the inherited environment
    let dotenv = dotenvy::dotenv_override();

    let cli = Cli::parse();

    // Logs go to stderr so streamed answers stay clean on stdout
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env"),
    }

    match cli.command {
        Commands::Chat {
            message,
            knowledge_file,
        } => commands::chat::run(message, knowledge_file).await?,
        Commands::Serve {
            port,
            knowledge_file,
        } => commands::serve::run(port, knowledge_file).await?,
        Commands::Init { force } => commands::init::run(force)?,
    }

    Ok(())
}
