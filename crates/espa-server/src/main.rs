//! ESPA 4.4.4 paging-system daemon
//!
//! Serves every configured serial link and reports the page requests it
//! receives, either as log lines or as JSON lines on stdout.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use espa_core::config::{self, ServerConfig};
use espa_server::transport::list_ports;
use espa_server::{JsonLinesHandler, LoggingHandler, MultiLinkServer};

#[derive(Parser)]
#[command(name = "espa-server")]
#[command(about = "ESPA 4.4.4 paging-system server")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print notifications as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for --json
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if args.list_ports {
        for port in list_ports().context("Failed to enumerate serial ports")? {
            println!("{}", port);
        }
        return Ok(());
    }

    let config: ServerConfig = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        config::load_config(&default_path)
            .with_context(|| format!("Failed to load config from {:?}", default_path))?
    };
    config.validate().context("Invalid configuration")?;

    if config.links.is_empty() {
        bail!("No links configured");
    }

    tracing::info!("ESPA server starting with {} link(s)", config.links.len());

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let mut server = MultiLinkServer::from_config(&config);
    if args.json {
        let mut handler = JsonLinesHandler::new(std::io::stdout());
        server.run(&mut handler, shutdown).await;
    } else {
        server.run(&mut LoggingHandler, shutdown).await;
    }

    tracing::info!("ESPA server shutdown complete");
    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        shutdown.cancel();
    });
}
