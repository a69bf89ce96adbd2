//! pulse-gateway - ECG ingestion gateway
//!
//! Accepts ECG uploads in legacy and current formats, normalizes them and
//! forwards each record to the external event logger; serves typed event
//! summaries read back from that logger.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_common::config::{self, ConfigOverrides};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulse_gateway::{build_router, AppState};

/// Command-line arguments for pulse-gateway
#[derive(Parser, Debug)]
#[command(name = "pulse-gateway")]
#[command(about = "ECG ingestion gateway in front of the event logger")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to <config dir>/pulse/config.toml)
    #[arg(short, long, env = "PULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Base URL of the event logger service
    #[arg(long)]
    event_logger_url: Option<String>,

    /// Maximum concurrent forwarding calls per upload
    #[arg(long)]
    forward_concurrency: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            event_logger_url: self.event_logger_url.clone(),
            forward_concurrency: self.forward_concurrency,
            log_level: self.log_level.clone(),
            ..Default::default()
        }
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pulse_gateway={level},pulse_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // CLI > environment > TOML > defaults
    let overrides = args
        .overrides()
        .or(ConfigOverrides::from_env().context("Invalid environment configuration")?);
    let file = config::load_config_file(args.config.as_deref())
        .context("Failed to load configuration file")?;

    let config = config::build_gateway_config(overrides, file).context("Invalid configuration")?;
    init_tracing(&config.logging.level);

    info!(
        "Starting pulse-gateway v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    info!("Event logger: {}", config.event_logger_url);
    info!("Forward concurrency: {}", config.forward_concurrency);
    if config.coach.api_key.is_none() {
        info!("Coaching API key not set; /breath-check-in will return 503");
    }

    let bind_addr = config.bind_addr();
    let state = AppState::new(config).context("Failed to initialize application state")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
