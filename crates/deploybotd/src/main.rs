//! deploybotd — the deploybot daemon.
//!
//! Opens the deploy store, wires the coordinator and the Slack client
//! into the slash command router, and serves it until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! deploybotd serve --config /etc/deploybot.toml --port 8080
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use config::DaemonConfig;
use deploybot_api::{ApiState, build_router};
use deploybot_slack::WebApi;
use deploybot_state::{ChannelDeploys, RedbStore};

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,deploybotd=debug,deploybot=debug";

#[derive(Parser)]
#[command(name = "deploybotd", about = "deploybot daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the /deploy slash command.
    Serve {
        /// Path to deploybot.toml.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides the config file).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for the deploy store (overrides the config file).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
        } => {
            let mut config = DaemonConfig::load(config.as_deref())?;
            if let Some(port) = port {
                config.listen.set_port(port);
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            serve(config).await
        }
    }
}

async fn serve(config: DaemonConfig) -> anyhow::Result<()> {
    info!("deploybot daemon starting");

    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = config.db_path();

    // The only handle to the store file; released when the router drops.
    let store = RedbStore::open(&db_path)?;
    info!(path = ?db_path, "deploy store opened");

    let mut state = ApiState::new(ChannelDeploys::new(Arc::new(store)));

    match &config.slack.token {
        Some(token) => {
            let mut api = WebApi::new(token.as_str());
            if let Some(url) = &config.slack.api_url {
                api = api.with_base_url(url.as_str());
            }
            info!(base_url = %api.base_url(), "slack client configured");
            state = state.with_slack(Arc::new(api));
        }
        None => warn!("no slack token configured, channel topics will not be updated"),
    }

    match &config.slack.verification_token {
        Some(token) => state = state.with_verification_token(token.as_str()),
        None => warn!("no verification token configured, accepting unauthenticated commands"),
    }

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    info!(addr = %config.listen, "slash command endpoint listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("deploybot daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
