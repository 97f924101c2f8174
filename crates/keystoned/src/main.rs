//! keystoned — the Keystone daemon.
//!
//! Loads `keystone.toml`, opens the configured databases, starts the
//! configured async utilities and serves the application root over HTTP.
//!
//! # Usage
//!
//! ```text
//! keystoned init --output keystone.toml
//! keystoned serve --config keystone.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use keystone_core::KeystoneConfig;
use keystone_db::ApplicationRoot;
use tracing::info;

#[derive(Parser)]
#[command(name = "keystoned", about = "Keystone daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the configured databases over HTTP.
    Serve {
        /// Path to keystone.toml.
        #[arg(long, default_value = "keystone.toml")]
        config: PathBuf,
    },
    /// Write a starter keystone.toml.
    Init {
        /// Where to write the file.
        #[arg(long, default_value = "keystone.toml")]
        output: PathBuf,

        /// Name of the scaffolded database.
        #[arg(long, default_value = "db")]
        database: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,keystoned=debug,keystone=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config } => serve(&config).await,
        Command::Init { output, database } => init(&output, &database),
    }
}

fn init(output: &Path, database: &str) -> anyhow::Result<()> {
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }
    let config = KeystoneConfig::scaffold(database);
    std::fs::write(output, config.to_toml_string()?)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(path = %output.display(), "config written");
    Ok(())
}

async fn serve(config_path: &Path) -> anyhow::Result<()> {
    let config = KeystoneConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!(path = %config_path.display(), "Keystone daemon starting");

    let mut root = ApplicationRoot::from_config(&config, Some(config_path.to_path_buf()))?;
    keystoned::utilities::register_builtin(root.utilities_mut());
    let root = Arc::new(root);

    let started = root.start_utilities().await?;
    info!(utilities = ?started, "async utilities started");

    let router = keystoned::build_router(root.clone(), config.server.stream_buffer);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.server.host, config.server.port))?;

    info!(%addr, "HTTP server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    root.utilities().shutdown_all().await;
    info!("Keystone daemon stopped");
    Ok(())
}
