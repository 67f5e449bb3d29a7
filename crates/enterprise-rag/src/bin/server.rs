//! RAG Server binary
//!
//! Run with: cargo run -p enterprise-rag --bin enterprise-rag-server

use enterprise_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "enterprise_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::load()?;

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                     Enterprise RAG                        ║
║           Document Q&A with Source Attribution            ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    tracing::info!("Configuration loaded ({})", config.app_name);
    tracing::info!("  - Embeddings: {:?} ({} dimensions)", config.embeddings.provider, config.embeddings.dimensions);
    tracing::info!("  - Answers: {:?}", config.llm.provider);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Collection: {}", config.vector_db.collection_path().display());
    tracing::info!("  - Object storage: {:?}", config.cloud.backend);
    if config.debug {
        tracing::warn!("Debug mode is on");
    }

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /auth/token        - Get an access token");
    println!("  POST /documents/upload  - Upload documents");
    println!("  POST /query             - Ask questions");
    println!("  GET  /documents         - List documents");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
