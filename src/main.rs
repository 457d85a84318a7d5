//! Diarykeep - memory-aware insight engine for a personal journal
//!
//! Command-line front end and local HTTP server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diarykeep::{
    api::build_app,
    config::DiaryConfig,
    insight::Insight,
    service::DiaryService,
    storage::SyncReport,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "diarykeep")]
#[command(author = "Diarykeep Team")]
#[command(version)]
#[command(about = "Memory-aware insights for your journal")]
struct Cli {
    /// Configuration file path (TOML, YAML or JSON)
    #[arg(short, long, env = "DIARYKEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Manage journal documents
    Document {
        #[command(subcommand)]
        action: DocumentAction,
    },

    /// Generate and manage insights
    Insight {
        #[command(subcommand)]
        action: InsightAction,
    },

    /// Query and add memories
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[derive(Subcommand)]
enum DocumentAction {
    /// Add a document; the body is read from --file or the argument
    Add {
        #[arg(short, long)]
        title: String,

        /// Document body
        #[arg(conflicts_with = "file")]
        content: Option<String>,

        /// Read the body from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List documents, most recently updated first
    List,

    /// Delete a document
    Delete { id: String },
}

#[derive(Subcommand)]
enum InsightAction {
    /// Generate an insight for a stored document
    Generate {
        document_id: String,

        /// Use and extend this user's memories
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Ask a follow-up on an existing insight
    FollowUp {
        insight_id: String,

        /// Follow-up question
        #[arg(short, long)]
        prompt: Option<String>,

        #[arg(short, long)]
        user: Option<String>,
    },

    /// List a document's insights
    List { document_id: String },

    /// Delete an insight
    Delete { id: String },

    /// Push a document's cached insights to the remote store
    Sync { document_id: String },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Show the memory context assembled for some text
    Context {
        text: String,

        #[arg(short, long)]
        user: String,

        #[arg(short, long, default_value = "5")]
        max: usize,
    },

    /// Search memories
    Search {
        query: String,

        #[arg(short, long)]
        user: String,

        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Remember a piece of text
    Remember {
        text: String,

        #[arg(short, long)]
        user: String,
    },

    /// Push a user's cached memories to the remote store
    Sync {
        #[arg(short, long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let config = match &cli.config {
        Some(path) => DiaryConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => DiaryConfig::default(),
    };

    if let Commands::Config { default } = cli.command {
        return show_config(if default { None } else { Some(&config) });
    }

    let service = DiaryService::from_config(config).context("Failed to start diarykeep")?;

    match cli.command {
        Commands::Serve { host, port } => run_server(service, host, port).await?,
        Commands::Document { action } => run_document(&service, action).await?,
        Commands::Insight { action } => run_insight(&service, action).await?,
        Commands::Memory { action } => run_memory(&service, action).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("diarykeep={},tower_http={}", log_level, log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run_server(service: DiaryService, host: Option<String>, port: Option<u16>) -> Result<()> {
    let api = &service.config().api;
    let addr = format!(
        "{}:{}",
        host.unwrap_or_else(|| api.host.clone()),
        port.unwrap_or(api.port)
    );
    let cors_origins = api.cors_origins.clone();
    let app = build_app(Arc::new(service), &cors_origins);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Diarykeep API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        })
        .await?;
    Ok(())
}

async fn run_document(service: &DiaryService, action: DocumentAction) -> Result<()> {
    match action {
        DocumentAction::Add {
            title,
            content,
            file,
            tags,
        } => {
            let content = match (content, file) {
                (Some(content), _) => content,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("Provide the document body or --file"),
            };
            let document = service.save_document(&title, &content, tags).await?;
            println!("{}", document.id);
        }
        DocumentAction::List => {
            for document in service.load_documents().await {
                println!(
                    "{}  {}  {}",
                    document.id,
                    document.updated_at.format("%Y-%m-%d %H:%M"),
                    document.title
                );
            }
        }
        DocumentAction::Delete { id } => {
            service.delete_document(&id).await?;
            println!("Deleted document {}", id);
        }
    }
    Ok(())
}

async fn run_insight(service: &DiaryService, action: InsightAction) -> Result<()> {
    match action {
        InsightAction::Generate { document_id, user } => {
            let insight = service
                .analyze_document(&document_id, user.as_deref())
                .await?
                .with_context(|| format!("Document '{}' not found", document_id))?;
            print_insight(&insight);
        }
        InsightAction::FollowUp {
            insight_id,
            prompt,
            user,
        } => {
            let insight = service
                .follow_up(&insight_id, prompt, user.as_deref())
                .await?
                .with_context(|| format!("Insight '{}' not found", insight_id))?;
            print_insight(&insight);
        }
        InsightAction::List { document_id } => {
            for insight in service.load_insights_for_document(&document_id).await {
                println!(
                    "{}  {}  {}",
                    insight.id,
                    insight.created_at.format("%Y-%m-%d %H:%M"),
                    insight.kind
                );
            }
        }
        InsightAction::Delete { id } => {
            service.delete_insight(&id).await?;
            println!("Deleted insight {}", id);
        }
        InsightAction::Sync { document_id } => {
            print_sync(&service.sync_insights(&document_id).await?);
        }
    }
    Ok(())
}

async fn run_memory(service: &DiaryService, action: MemoryAction) -> Result<()> {
    match action {
        MemoryAction::Context { text, user, max } => {
            let context = service.get_memory_context(&text, &user, max).await;
            println!("{}", serde_json::to_string_pretty(&context)?);
        }
        MemoryAction::Search { query, user, limit } => {
            for hit in service.search_memories(&query, &user, limit).await {
                println!(
                    "{:.2}  {:?}  {}",
                    hit.similarity, hit.relevance, hit.memory.content
                );
            }
        }
        MemoryAction::Remember { text, user } => {
            println!("{}", service.remember(&text, &user).await);
        }
        MemoryAction::Sync { user } => {
            print_sync(&service.sync_memories(&user).await?);
        }
    }
    Ok(())
}

fn print_insight(insight: &Insight) {
    println!("{}", insight.content);
    println!();
    println!("sentiment: {:?}", insight.metadata.sentiment);
    if !insight.metadata.topics.is_empty() {
        println!("topics: {}", insight.metadata.topics.join(", "));
    }
    for item in &insight.metadata.action_items {
        println!("- {}", item);
    }
    println!("id: {}", insight.id);
}

fn print_sync(report: &SyncReport) {
    println!("synced: {}", report.synced);
    if report.deleted > 0 {
        println!("deleted: {}", report.deleted);
    }
    for id in &report.failed {
        println!("failed: {}", id);
    }
}

fn show_config(config: Option<&DiaryConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
