//! Document QA server binary
//!
//! Run with: cargo run -p docqa-rag --bin docqa-rag-server -- --config docqa.toml

use clap::Parser;
use docqa_rag::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "docqa-rag-server", version, about = "Document question answering server")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = RagConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!(
        "  - Chunking: {} {:?} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.unit,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Storage: {}", config.vector_db.storage_dir.display());

    let server = RagServer::new(config).await?;

    // Check Ollama
    let config = server.state().config();
    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    match server.state().pipeline().llm().health_check().await {
        Ok(true) => tracing::info!("Ollama is running"),
        _ => {
            tracing::warn!("Ollama not available at {}", config.llm.base_url);
            tracing::warn!(
                "Start it with `ollama serve` and pull the models: ollama pull {} && ollama pull {}",
                config.embeddings.model,
                config.llm.generate_model
            );
        }
    }

    tracing::info!("Health: http://{}/health", server.address());

    server.start().await?;

    Ok(())
}
