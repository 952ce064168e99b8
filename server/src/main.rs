//! Barangay Desk Server binary

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use barangay_server::{
    config::Config, crypto, run_server, storage::Storage, AppState,
};

/// Barangay Desk Server CLI
#[derive(Parser)]
#[command(name = "barangay-server")]
#[command(about = "Realtime store and admin API for the barangay complaint desk")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the hash to put in [admin].password_hash
    HashPassword {
        password: String,
    },

    /// Replace the stored tree with the contents of a JSON export
    Import {
        /// Path to the JSON file
        file: String,
    },

    /// Print the whole stored tree as JSON
    Export,

    /// Run the server
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "barangay_server=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::HashPassword { password } => {
            println!("{}", crypto::hash_secret(&password));
        }
        Commands::Import { file } => {
            let config = Config::load(&cli.config).await?;
            import_tree(&config, &file).await?;
        }
        Commands::Export => {
            let config = Config::load(&cli.config).await?;
            export_tree(&config).await?;
        }
        Commands::Run => {
            let config = Arc::new(Config::load(&cli.config).await?);
            run_server(config).await?;
        }
    }

    Ok(())
}

async fn open_state(config: &Config) -> anyhow::Result<AppState> {
    let storage = Storage::new(&config.storage.database_path).await?;
    Ok(AppState::new(Arc::new(config.clone()), storage))
}

async fn import_tree(config: &Config, file: &str) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file).await?;
    let data: serde_json::Value = serde_json::from_str(&content)?;
    let Some(roots) = data.as_object() else {
        anyhow::bail!("{} does not hold a JSON object", file);
    };
    let names: Vec<String> = roots.keys().cloned().collect();

    let state = open_state(config).await?;
    state.db.replace_all(data).await?;

    println!("Imported {} subtree(s): {}", names.len(), names.join(", "));

    Ok(())
}

async fn export_tree(config: &Config) -> anyhow::Result<()> {
    let state = open_state(config).await?;
    let tree = state.db.value_at("").await?;
    println!("{}", serde_json::to_string_pretty(&tree)?);

    Ok(())
}
