//! CLI module — command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod config;
pub mod gateway;
pub mod history;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use wagate::config::Config;

#[derive(Parser)]
#[command(name = "wagate")]
#[command(version)]
#[command(about = "WhatsApp conversational-agent gateway", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.wagate/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server, dispatcher and conversation engine
    Gateway {
        /// Bind address (overrides gateway.host)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides gateway.port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// List a customer's conversations
    Conversations {
        /// Customer phone number (wa_id)
        customer_id: String,
    },
    /// Print the transcript of a conversation
    Transcript {
        conversation_id: i64,
        /// Show the model-facing agent turns instead of the chat
        #[arg(long)]
        agent: bool,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the config file and print a redacted summary
    Check,
}

/// Load config from `path` (or the default location) with env overrides.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    config.with_context(|| "Failed to load configuration")
}

pub async fn run() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Gateway { host, port } => {
            gateway::cmd_gateway(load_config(config_path)?, host, port).await?;
        }
        Commands::Conversations { customer_id } => {
            history::cmd_conversations(&load_config(config_path)?, &customer_id)?;
        }
        Commands::Transcript {
            conversation_id,
            agent,
        } => {
            history::cmd_transcript(&load_config(config_path)?, conversation_id, agent)?;
        }
        Commands::Config { action } => {
            config::cmd_config(action, config_path)?;
        }
    }

    Ok(())
}
