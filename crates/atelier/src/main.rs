//! # Atelier Server Binary
//!
//! Main entrypoint for the Atelier project management server.

use std::sync::Arc;

use anyhow::Result;
use atelier_config::load_or_default;
use atelier_repository::RepositoryFactory;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "atelier")]
#[command(about = "Atelier project management server", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Storage provider (overrides config): memory, localfs or sql
    #[arg(short = 's', long)]
    store: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = load_or_default(&args.config);

    // Override with CLI args
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(store) = args.store {
        config.store.provider = store;
    }

    // Initialize observability
    atelier_observe::init(&config.observability.log_level, &config.observability.log_format)?;

    tracing::info!("Starting Atelier server");

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        std::process::exit(1);
    }

    let config = Arc::new(config);

    // Initialize storage engine
    let repo = RepositoryFactory::from_str(
        &config.store.provider,
        Some(config.store.root_path.clone()),
        Some(config.store.sql.effective_url()),
    )
    .await?;
    tracing::info!(provider = %config.store.provider, "Storage engine connected");

    // Start API server
    atelier_api::serve(repo, config).await?;

    Ok(())
}
