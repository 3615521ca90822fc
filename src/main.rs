mod archive;
mod auth;
mod config;
mod git;
mod health;
mod http;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::archive::ArchiveManager;
use crate::auth::ApiKeyGate;
use crate::config::Config;
use crate::git::{GitCli, VcsClient};
use crate::metrics::MetricsRegistry;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "repo-archive", about = "HTTP API over a directory of git clones")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "/etc/repo-archive/config.yaml")]
    config: String,

    /// Override `archive.root` from the configuration file.
    #[arg(long)]
    archive_root: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub archive: ArchiveManager,
    pub api_key: Arc<ApiKeyGate>,
    pub metrics: MetricsRegistry,
}

impl AppState {
    pub fn new(config: Config, vcs: Arc<dyn VcsClient>, api_key: ApiKeyGate) -> Self {
        let archive = ArchiveManager::new(&config.archive, vcs);
        Self {
            config: Arc::new(config),
            archive,
            api_key: Arc::new(api_key),
            metrics: MetricsRegistry::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP server (axum)
// ---------------------------------------------------------------------------

async fn run_http_server(state: AppState) -> Result<()> {
    let listen_addr: std::net::SocketAddr = state
        .config
        .server
        .http_listen
        .parse()
        .context("invalid http_listen address")?;

    let app = http::handler::create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {listen_addr}"))?;

    tracing::info!(%listen_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // ---- CLI ----
    let cli = Cli::parse();

    // ---- Config ----
    let mut config = config::load_config(&cli.config)?;
    if let Some(root) = cli.archive_root {
        config.archive.root = root;
        config::validate_config(&config)?;
    }

    // ---- Tracing ----
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!(config_path = %cli.config, "starting repo-archive");

    // ---- Auth ----
    let api_key = ApiKeyGate::from_env(&config.auth.api_key_env)?;
    tracing::info!(
        env = %config.auth.api_key_env,
        fingerprint = %api_key.fingerprint(),
        "API key loaded"
    );

    // ---- git ----
    let git = GitCli::new(&config.archive.git_binary);
    match git.version().await {
        Ok(version) => tracing::info!(%version, "git client available"),
        Err(e) => tracing::warn!(error = %e, "git client not runnable; archive calls will fail"),
    }

    // ---- Archive root ----
    tracing::info!(
        root = %config.archive.root,
        size_mode = ?config.archive.size_mode,
        "archive configured"
    );

    // ---- App state ----
    let state = AppState::new(config, Arc::new(git), api_key);

    run_http_server(state).await?;

    tracing::info!("repo-archive shut down cleanly");
    Ok(())
}
