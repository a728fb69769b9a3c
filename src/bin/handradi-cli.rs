//! Client registry administration
//!
//! ```text
//! handradi-cli add <client_id> <allowed_origin> [--api-key KEY]
//! handradi-cli list [--show-keys]
//! handradi-cli delete <client_id>
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use handradi::{
    config::DatabaseConfig,
    db::{create_pool, ClientRegistry, SqliteClientRegistry},
    models::ClientRecord,
    storage::sanitize_client,
    utils::init_tracing,
};

#[derive(Parser)]
#[command(name = "handradi-cli", version, about = "Manage Handradi storage clients")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a client. Prints the API key.
    Add {
        client_id: String,
        /// Single origin allowed to call the API, or `*`
        allowed_origin: String,
        /// Use this key instead of generating one
        #[arg(long)]
        api_key: Option<String>,
    },
    /// List registered clients
    List {
        /// Print API keys in full
        #[arg(long)]
        show_keys: bool,
    },
    /// Remove a client. Its stored files are kept.
    Delete { client_id: String },
}

fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("warn");
    let cli = Cli::parse();

    let pool = create_pool(&DatabaseConfig::from_env()?).await?;
    let registry = SqliteClientRegistry::new(pool);

    let outcome = run(&registry, cli.command).await;
    registry.close().await;
    outcome
}

async fn run(registry: &SqliteClientRegistry, command: Command) -> Result<()> {
    match command {
        Command::Add {
            client_id,
            allowed_origin,
            api_key,
        } => {
            let sanitized = sanitize_client(&client_id);
            if sanitized.is_empty() {
                bail!("client id {:?} has no usable characters", client_id);
            }
            if sanitized != client_id {
                eprintln!("Client id sanitized to {:?}", sanitized);
            }
            if allowed_origin.trim().is_empty() {
                bail!("allowed origin must not be empty");
            }

            let api_key = api_key.unwrap_or_else(generate_api_key);
            registry
                .insert(&ClientRecord {
                    client_id: sanitized.clone(),
                    api_key: api_key.clone(),
                    allowed_origin,
                })
                .await?;
            println!("✅ Client added: {}", sanitized);
            println!("API key: {}", api_key);
        }
        Command::List { show_keys } => {
            for record in registry.list_all().await? {
                let key = if show_keys {
                    record.api_key.clone()
                } else {
                    mask_key(&record.api_key)
                };
                println!("Client: {}\t{}\t{}", record.client_id, key, record.allowed_origin);
            }
        }
        Command::Delete { client_id } => {
            if !registry.delete(&client_id).await? {
                bail!("no client named {:?}", client_id);
            }
            println!("🗑️ Client deleted: {}", client_id);
        }
    }
    Ok(())
}
