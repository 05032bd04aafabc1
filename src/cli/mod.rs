//! CLI module — command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use switchboard::gateway;
use switchboard::llm::OpenAiProvider;
use switchboard::manifest::{load_manifest, Registry};
use switchboard::memory::{SessionService, SqliteSessionRepository};
use switchboard::orchestrator::{Orchestrator, OrchestratorConfig};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Declarative orchestrator for tool-calling assistant services", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Path to the manifest file (YAML or JSON)
        #[arg(short, long)]
        manifest: String,
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Bind port
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// SQLite url for persistent sessions (e.g. sqlite://sessions.db);
        /// omitted means per-request buffer memory
        #[arg(long)]
        db: Option<String>,
    },
    /// Validate a manifest file and report problems
    Validate {
        /// Path to the manifest file
        #[arg(short, long)]
        manifest: String,
    },
    /// List the routes a manifest declares
    Routes {
        /// Path to the manifest file
        #[arg(short, long)]
        manifest: String,
    },
}

/// Parse arguments and dispatch to the selected command.
pub async fn run() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            manifest,
            host,
            port,
            db,
        } => serve(&manifest, &host, port, db).await,
        Commands::Validate { manifest } => validate(&manifest),
        Commands::Routes { manifest } => routes(&manifest),
    }
}

async fn serve(manifest_path: &str, host: &str, port: u16, db: Option<String>) -> Result<()> {
    let registry = Arc::new(Registry::new());
    registry
        .load_from_file(manifest_path)
        .with_context(|| format!("failed to load manifest from {}", manifest_path))?;

    let session_service = match db {
        Some(url) => {
            let repository = SqliteSessionRepository::new(&url)
                .await
                .with_context(|| format!("failed to open session store {}", url))?;
            Some(Arc::new(SessionService::new(Arc::new(repository))))
        }
        None => None,
    };

    let api_key = std::env::var("SWITCHBOARD_LLM_API_KEY")
        .context("SWITCHBOARD_LLM_API_KEY is required to serve")?;
    let mut provider = match std::env::var("SWITCHBOARD_LLM_BASE_URL") {
        Ok(base_url) => OpenAiProvider::with_base_url(&api_key, &base_url),
        Err(_) => OpenAiProvider::new(&api_key),
    };
    if let Ok(model) = std::env::var("SWITCHBOARD_LLM_MODEL") {
        provider = provider.with_model(&model);
    }

    let orchestrator = Arc::new(Orchestrator::new(OrchestratorConfig {
        llm: Arc::new(provider),
        registry,
        session_service,
        buffer_max_messages: 0,
    }));

    gateway::start(orchestrator, host, port).await
}

fn validate(manifest_path: &str) -> Result<()> {
    match load_manifest(manifest_path) {
        Ok(manifest) => {
            println!(
                "manifest is valid: version {}, {} route(s){}",
                manifest.version,
                manifest.routes.len(),
                if manifest.fallback.is_some() {
                    ", with fallback"
                } else {
                    ""
                }
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn routes(manifest_path: &str) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let registry = Registry::new();
    registry.load(manifest)?;

    for route in registry.list_route_configs() {
        println!("{}  {}", route.pattern, route.name);
    }
    Ok(())
}
