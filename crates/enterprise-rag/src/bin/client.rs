//! Terminal client for the RAG API
//!
//! Run with: cargo run -p enterprise-rag --features cli --bin enterprise-rag-client -- --help

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use enterprise_rag::client::ApiClient;

/// Upload documents and ask questions against an enterprise-rag server
#[derive(Parser, Debug)]
#[command(name = "enterprise-rag-client")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server base URL
    #[arg(short, long, default_value = "http://localhost:8000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the access token
    Login {
        #[arg(short, long, default_value = "demo")]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Forget the stored access token
    Logout,
    /// Upload one or more PDF, DOCX or TXT files
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ask a question
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
        /// Chunks to retrieve
        #[arg(short = 'k', long, default_value_t = 3)]
        max_results: usize,
    },
    /// List uploaded documents
    List,
    /// Show collection statistics
    Stats,
    /// Delete a document and its chunks
    Delete { id: Uuid },
    /// Check server health
    Health,
}

/// Token persisted between invocations
#[derive(Debug, Serialize, Deserialize)]
struct Session {
    server: String,
    access_token: String,
}

fn session_path() -> anyhow::Result<PathBuf> {
    let dir = dirs::cache_dir()
        .context("No cache directory on this platform")?
        .join("enterprise-rag");
    Ok(dir.join("session.json"))
}

fn load_session(server: &str) -> anyhow::Result<Session> {
    let path = session_path()?;
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Not logged in, run `login` first ({})", path.display()))?;
    let session: Session = serde_json::from_str(&content).context("Corrupt session file")?;
    if session.server != server {
        anyhow::bail!(
            "Stored session is for {}, log in to {} first",
            session.server,
            server
        );
    }
    Ok(session)
}

fn save_session(session: &Session) -> anyhow::Result<()> {
    let path = session_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(session)?)?;
    Ok(())
}

fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn authorized_client(server: &str) -> anyhow::Result<ApiClient> {
    let session = load_session(server)?;
    Ok(ApiClient::new(server)?.with_token(session.access_token))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let server = args.server.trim_end_matches('/').to_string();

    match args.command {
        Commands::Login { username, password } => {
            let mut client = ApiClient::new(&server)?;
            let pb = spinner(format!("Logging in as {}...", username));
            let result = client.authenticate(&username, &password).await;
            pb.finish_and_clear();
            let token = result?;

            save_session(&Session {
                server: server.clone(),
                access_token: token.access_token,
            })?;
            println!(
                "{} Logged in to {} (token valid for {} minutes)",
                style("✓").green().bold(),
                server,
                token.expires_in / 60
            );
        }
        Commands::Logout => {
            let path = session_path()?;
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
            println!("{} Logged out", style("✓").green().bold());
        }
        Commands::Upload { files } => {
            let client = authorized_client(&server)?;
            for file in files {
                let pb = spinner(format!("Uploading {}...", file.display()));
                let result = client.upload_document(&file).await;
                pb.finish_and_clear();

                match result {
                    Ok(doc) => println!(
                        "{} {} -> {} ({}, {} chunks, {} bytes)",
                        style("✓").green().bold(),
                        doc.filename,
                        doc.id,
                        style(format!("{:?}", doc.status).to_lowercase()).cyan(),
                        doc.chunks,
                        doc.size
                    ),
                    Err(e) => println!(
                        "{} {}: {}",
                        style("✗").red().bold(),
                        file.display(),
                        e
                    ),
                }
            }
        }
        Commands::Ask {
            question,
            max_results,
        } => {
            let client = authorized_client(&server)?;
            let question = question.join(" ");
            let pb = spinner("Searching documents...");
            let result = client.query(&question, max_results).await;
            pb.finish_and_clear();
            let response = result?;

            println!("{} {}", style("Q:").bold(), response.question);
            println!("{} {}", style("A:").green().bold(), response.answer);
            println!(
                "{}",
                style(format!("confidence {:.2}", response.confidence)).dim()
            );

            for (i, source) in response.sources.iter().enumerate() {
                let name = source
                    .metadata
                    .get("source")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                let preview: String = source.content.chars().take(200).collect();
                println!(
                    "\n{} {} (similarity {:.3})",
                    style(format!("[{}]", i + 1)).cyan().bold(),
                    name,
                    source.similarity
                );
                println!("    {}", preview.replace('\n', " "));
            }
        }
        Commands::List => {
            let client = authorized_client(&server)?;
            let list = client.list_documents().await?;
            if list.documents.is_empty() {
                println!("No documents uploaded yet");
            }
            for doc in &list.documents {
                println!(
                    "{}  {}  {}  {} chunks",
                    style(doc.id).dim(),
                    doc.filename,
                    doc.file_type,
                    doc.chunks
                );
            }
            println!("\n{} documents", list.total);
        }
        Commands::Stats => {
            let client = authorized_client(&server)?;
            let stats = client.stats().await?;
            println!("Collection:   {}", style(&stats.collection_name).bold());
            println!("Total chunks: {}", stats.total_documents);
        }
        Commands::Delete { id } => {
            let client = authorized_client(&server)?;
            let deleted = client.delete_document(id).await?;
            println!(
                "{} Deleted {} ({} chunks)",
                style("✓").green().bold(),
                deleted.id,
                deleted.chunks_deleted
            );
        }
        Commands::Health => {
            let client = ApiClient::new(&server)?;
            let health = client.health().await?;
            println!("{} {} v{}", style("●").green(), health.app, health.version);
            println!("  status:     {}", health.status);
            println!("  documents:  {}", health.documents);
            println!("  chunks:     {}", health.chunks);
            println!("  embeddings: {}", health.embedding_provider);
            println!("  answers:    {}", health.llm_provider);
            if let Some(store) = health.object_store {
                println!("  storage:    {}", store);
            }
        }
    }

    Ok(())
}
